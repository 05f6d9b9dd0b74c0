//! Plugin registry.
//!
//! Resolves markdown tags, node types and HTML tags to the plugin that owns
//! them. Registration order is preserved.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::LoadError;
use crate::plugin::{Plugin, TagBinding};
use crate::schema::BASE_TYPES;

/// Name reported as the owner of base node types.
const BASE_OWNER: &str = "base";

/// Ordered collection of plugins with lookup tables.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
    by_tag: HashMap<String, (usize, usize)>,
    by_node_type: HashMap<String, usize>,
    by_html: HashMap<String, usize>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from plugins in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] raised by [`register`](Self::register).
    pub fn with_plugins(
        plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
    ) -> Result<Self, LoadError> {
        let mut registry = Self::new();
        for plugin in plugins {
            registry.register(plugin)?;
        }
        Ok(registry)
    }

    /// Register a plugin.
    ///
    /// Either all of the plugin's tags are registered or none are.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::DuplicateTag`] if a markdown tag is already
    /// registered, or [`LoadError::DuplicateNodeType`] if a node type is a
    /// base type or belongs to another plugin.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), LoadError> {
        let name = plugin.name().to_owned();
        let index = self.plugins.len();
        let mut claimed_tags = HashSet::new();
        let mut claimed_types = HashSet::new();

        for binding in plugin.tags() {
            if let Some(&(owner, _)) = self.by_tag.get(&binding.markdown) {
                return Err(LoadError::DuplicateTag {
                    tag: binding.markdown.clone(),
                    owner: self.plugins[owner].name().to_owned(),
                    plugin: name,
                });
            }
            if !claimed_tags.insert(binding.markdown.as_str()) {
                return Err(LoadError::DuplicateTag {
                    tag: binding.markdown.clone(),
                    owner: name.clone(),
                    plugin: name,
                });
            }

            if BASE_TYPES.contains(&binding.node_type.as_str()) {
                return Err(LoadError::DuplicateNodeType {
                    node_type: binding.node_type.clone(),
                    owner: BASE_OWNER.to_owned(),
                    plugin: name,
                });
            }
            if let Some(&owner) = self.by_node_type.get(&binding.node_type) {
                return Err(LoadError::DuplicateNodeType {
                    node_type: binding.node_type.clone(),
                    owner: self.plugins[owner].name().to_owned(),
                    plugin: name,
                });
            }
            claimed_types.insert(binding.node_type.as_str());
        }

        for (position, binding) in plugin.tags().iter().enumerate() {
            self.by_tag.insert(binding.markdown.clone(), (index, position));
            self.by_node_type.insert(binding.node_type.clone(), index);
            for html in &binding.html {
                self.by_html.entry(html.to_ascii_lowercase()).or_insert(index);
            }
        }

        tracing::debug!(
            plugin = %name,
            tags = plugin.tags().len(),
            node_types = claimed_types.len(),
            "Registered plugin"
        );
        self.plugins.push(plugin);
        Ok(())
    }

    /// Plugins in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin owning a markdown tag.
    #[must_use]
    pub fn plugin_for_tag(&self, tag: &str) -> Option<&Arc<dyn Plugin>> {
        self.by_tag.get(tag).map(|&(index, _)| &self.plugins[index])
    }

    /// Binding declared for a markdown tag.
    #[must_use]
    pub fn binding_for_tag(&self, tag: &str) -> Option<&TagBinding> {
        self.by_tag
            .get(tag)
            .and_then(|&(index, position)| self.plugins[index].tags().get(position))
    }

    /// Plugin owning a node type.
    #[must_use]
    pub fn plugin_for_node_type(&self, node_type: &str) -> Option<&Arc<dyn Plugin>> {
        self.by_node_type
            .get(node_type)
            .map(|&index| &self.plugins[index])
    }

    /// Plugin handling an HTML tag on import (case-insensitive).
    #[must_use]
    pub fn plugin_for_html_tag(&self, tag: &str) -> Option<&Arc<dyn Plugin>> {
        self.by_html
            .get(&tag.to_ascii_lowercase())
            .map(|&index| &self.plugins[index])
    }
}
