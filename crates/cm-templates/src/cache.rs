//! Memoizing template loader.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{TemplateError, TemplateLoader};

/// Wraps a loader and keeps every successfully loaded template in memory.
///
/// Failures are not cached, so a later load retries the inner loader.
#[derive(Debug)]
pub struct CachingLoader<L> {
    inner: L,
    entries: RwLock<HashMap<String, String>>,
}

impl<L: TemplateLoader> CachingLoader<L> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The wrapped loader.
    #[must_use]
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Drop all cached templates.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl<L: TemplateLoader> TemplateLoader for CachingLoader<L> {
    async fn load(&self, id: &str) -> Result<String, TemplateError> {
        if let Some(text) = self.entries.read().await.get(id) {
            tracing::debug!(id, "Template cache hit");
            return Ok(text.clone());
        }

        let text = self.inner.load(id).await?;
        self.entries
            .write()
            .await
            .insert(id.to_owned(), text.clone());
        Ok(text)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
