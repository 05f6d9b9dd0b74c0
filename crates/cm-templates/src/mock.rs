//! In-memory template loader for testing.
//!
//! Provides [`MemoryTemplateLoader`] for unit tests without filesystem access.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::{TemplateError, TemplateErrorKind, TemplateLoader};

/// In-memory loader.
///
/// Use the builder methods to configure templates, failures and latency.
///
/// # Example
///
/// ```ignore
/// use cm_templates::{MemoryTemplateLoader, TemplateLoader};
///
/// let loader = MemoryTemplateLoader::new()
///     .with_template("interest", "Interest is {{rate}}.");
///
/// let text = loader.load("interest").await?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryTemplateLoader {
    templates: RwLock<HashMap<String, String>>,
    failures: RwLock<HashMap<String, TemplateErrorKind>>,
    loads: RwLock<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MemoryTemplateLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_template(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Make loads of `id` fail with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_failure(self, id: impl Into<String>, kind: TemplateErrorKind) -> Self {
        self.failures.write().unwrap().insert(id.into(), kind);
        self
    }

    /// Sleep before answering each load.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add or replace a template after construction.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, id: impl Into<String>, text: impl Into<String>) {
        self.templates.write().unwrap().insert(id.into(), text.into());
    }

    /// Number of load calls made for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn load_count(&self, id: &str) -> usize {
        self.loads.read().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Total number of load calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn total_loads(&self) -> usize {
        self.loads.read().unwrap().values().sum()
    }
}

#[async_trait]
impl TemplateLoader for MemoryTemplateLoader {
    async fn load(&self, id: &str) -> Result<String, TemplateError> {
        *self.loads.write().unwrap().entry(id.to_owned()).or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(kind) = self.failures.read().unwrap().get(id).copied() {
            return Err(TemplateError::new(kind)
                .with_id(id)
                .with_loader(self.name()));
        }

        self.templates
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::not_found(id).with_loader(self.name()))
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_load_template() {
        let loader = MemoryTemplateLoader::new().with_template("a", "A");
        assert_eq!(loader.load("a").await.unwrap(), "A");
        assert_eq!(loader.load_count("a"), 1);
    }

    #[tokio::test]
    async fn test_missing_template() {
        let loader = MemoryTemplateLoader::new();
        let err = loader.load("a").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "[Memory] Template not found (template: a)");
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let loader = MemoryTemplateLoader::new()
            .with_template("a", "A")
            .with_failure("a", TemplateErrorKind::Unavailable);
        let err = loader.load("a").await.unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Unavailable);
        assert_eq!(loader.total_loads(), 1);
    }
}
