//! Clause template loading.
//!
//! This crate provides a [`TemplateLoader`] trait for fetching clause
//! templates by identifier, independent of where they are stored.
//!
//! - [`FsTemplateLoader`] reads templates from a directory
//! - [`CachingLoader`] memoizes another loader's successful loads
//! - [`MemoryTemplateLoader`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use cm_templates::{FsTemplateLoader, TemplateLoader};
//!
//! let loader = FsTemplateLoader::new("clauses");
//! let text = loader.load("interest-rate").await?;
//! ```

mod cache;
mod error;
mod fs;
#[cfg(any(test, feature = "mock"))]
mod mock;

use async_trait::async_trait;

pub use cache::CachingLoader;
pub use error::{TemplateError, TemplateErrorKind};
pub use fs::FsTemplateLoader;
#[cfg(any(test, feature = "mock"))]
pub use mock::MemoryTemplateLoader;

/// Source of clause template text.
///
/// Implementations must be safe to call concurrently; the clause resolver
/// issues one load per clause in parallel.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Fetch the markdown text of the template named `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateErrorKind::NotFound`] if no such template exists,
    /// or another kind if the backing store fails.
    async fn load(&self, id: &str) -> Result<String, TemplateError>;

    /// Short loader name for diagnostics.
    fn name(&self) -> &'static str {
        "Loader"
    }
}

#[async_trait]
impl<T: TemplateLoader + ?Sized> TemplateLoader for std::sync::Arc<T> {
    async fn load(&self, id: &str) -> Result<String, TemplateError> {
        (**self).load(id).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
