//! Clause blocks for clausemark.
//!
//! A clause references an externally stored template:
//!
//! ````text
//! ```<clause src="loan/interest" clauseid="7" rate="4%25">
//! ```
//! ````
//!
//! [`ClausePlugin`] turns the fence into a `clause` block whose body is
//! parsed as a nested document. [`ClauseResolver`] fetches templates through
//! a [`TemplateLoader`](cm_templates::TemplateLoader), substitutes the
//! clause's bindings into `{{name}}` placeholders and replaces the clause's
//! children with the parsed result.

mod error;
mod plugin;
mod resolver;
mod rewrite;

pub use error::ClauseError;
pub use plugin::{CLAUSE, ClausePlugin, ERROR, RESOLVED, STATUS, TEMPLATE, UNRESOLVED};
pub use resolver::{ClauseFailure, ClauseResolver, ResolutionReport, ResolverOptions};
pub use rewrite::{UnboundPolicy, bindings, placeholders, rewrite};
