//! Plugin-extensible conversion between markdown and a structured document
//! tree.
//!
//! A [`Converter`] owns an ordered [`Registry`] of [`Plugin`]s and the
//! [`Schema`] composed from the base markdown rules plus each plugin's
//! [`SchemaFragment`]. Markdown is tokenized into [`MarkdownEvent`]s, built
//! into a [`Node`] tree by a [`Builder`], and written back by a
//! [`Serializer`].
//!
//! Plugins extend the markdown syntax in two ways:
//!
//! - Fenced custom blocks: a code fence whose info string is a registered tag
//!   with attributes (`` ``` <clause src="..." clauseid="1"> ``).
//! - Inline pseudo-tags: `<variable id="amount" value="100"/>` or the paired
//!   form `<variable id="amount">100</variable>`.
//!
//! Attribute values are percent-encoded in markdown and stored decoded in the
//! tree.

mod attrs;
mod builder;
mod converter;
mod error;
mod html;
mod node;
mod parser;
mod plugin;
mod registry;
mod schema;
mod serializer;

pub use attrs::{Attributes, decode_value, encode_value, is_internal_key};
pub use builder::Builder;
pub use converter::{ConvertOptions, Converter, DEFAULT_MAX_DEPTH};
pub use error::{ConvertError, LoadError};
pub use html::{HtmlContent, HtmlElement, parse_html};
pub use node::{DOCUMENT, Element, Node, ObjectKind, PARAGRAPH, RenderNode, TEXT, Text};
pub use parser::{MarkdownEvent, MarkdownParser};
pub use plugin::{Handled, Plugin, TagBinding, TagEvent};
pub use registry::Registry;
pub use schema::{
    BASE_TYPES, BLOCK_CONTAINERS, ChildRule, INLINE_CONTAINERS, NodeRule, Schema, SchemaFragment,
    compose,
};
pub use serializer::{Serializer, escape_inline, escape_text, fenced, prefix_lines};
