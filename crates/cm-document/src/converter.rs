//! Conversion facade.

use std::sync::Arc;

use crate::builder::Builder;
use crate::error::{ConvertError, LoadError};
use crate::html::HtmlImporter;
use crate::node::Node;
use crate::parser::{MarkdownEvent, MarkdownParser};
use crate::plugin::Plugin;
use crate::registry::Registry;
use crate::schema::{Schema, compose};
use crate::serializer::Serializer;

/// Default maximum nesting depth for embedded documents.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Conversion options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Maximum nesting depth of embedded documents (clause bodies).
    pub max_depth: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Markdown and HTML conversion with a fixed plugin set.
///
/// The registry and composed schema are immutable after construction and
/// shared behind `Arc`, so cloning a converter is cheap and clones can move
/// into concurrent tasks.
///
/// # Example
///
/// ```
/// use cm_document::Converter;
///
/// let converter = Converter::new(Vec::new()).unwrap();
/// let doc = converter.parse("# Terms\n\nThe *borrower* pays.").unwrap();
/// assert_eq!(
///     converter.serialize(&doc).unwrap(),
///     "# Terms\n\nThe *borrower* pays.\n"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Converter {
    registry: Arc<Registry>,
    schema: Arc<Schema>,
    options: ConvertOptions,
}

impl Converter {
    /// Register plugins in order and compose the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if plugins conflict.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Result<Self, LoadError> {
        Self::from_registry(Registry::with_plugins(plugins)?)
    }

    /// Compose the schema for an existing registry.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if schema fragments conflict.
    pub fn from_registry(registry: Registry) -> Result<Self, LoadError> {
        let schema = compose(&Schema::base(), &registry)?;
        Ok(Self {
            registry: Arc::new(registry),
            schema: Arc::new(schema),
            options: ConvertOptions::default(),
        })
    }

    /// Replace the conversion options.
    #[must_use]
    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// The plugin registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The composed schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Conversion options.
    #[must_use]
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Tokenize markdown without building a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Malformed`] for invalid tag attributes.
    pub fn events(&self, markdown: &str) -> Result<Vec<MarkdownEvent>, ConvertError> {
        MarkdownParser::new(&self.registry).parse(markdown)
    }

    /// Convert markdown into a document tree.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvertError`] for malformed input or schema violations.
    /// No partial tree is returned.
    pub fn parse(&self, markdown: &str) -> Result<Node, ConvertError> {
        self.parse_at_depth(markdown, 0)
    }

    /// Convert markdown embedded `depth` levels deep.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::RecursionLimitExceeded`] if `depth` exceeds
    /// the configured maximum, or any conversion error.
    pub fn parse_at_depth(&self, markdown: &str, depth: usize) -> Result<Node, ConvertError> {
        if depth > self.options.max_depth {
            return Err(ConvertError::RecursionLimitExceeded {
                depth,
                limit: self.options.max_depth,
            });
        }

        let events = self.events(markdown)?;
        let mut builder = Builder::new(self, depth);
        for event in events {
            builder.process(event)?;
        }
        builder.finish()
    }

    /// Convert embedded markdown and return its top-level nodes.
    ///
    /// # Errors
    ///
    /// See [`parse_at_depth`](Self::parse_at_depth).
    pub fn parse_fragment(&self, markdown: &str, depth: usize) -> Result<Vec<Node>, ConvertError> {
        match self.parse_at_depth(markdown, depth)? {
            Node::Document(root) => Ok(root.nodes),
            other => Err(ConvertError::Internal(format!(
                "builder produced a `{}` root",
                other.node_type()
            ))),
        }
    }

    /// Convert a document tree into markdown.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnknownNodeType`] for unhandled node types.
    pub fn serialize(&self, node: &Node) -> Result<String, ConvertError> {
        Serializer::new(&self.registry).serialize(node)
    }

    /// Check a tree against the composed schema.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConvertError::SchemaViolation`].
    pub fn validate(&self, node: &Node) -> Result<(), ConvertError> {
        self.schema.validate(node)
    }

    /// Convert HTML into a document tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Html`] for unreadable markup, or a schema
    /// violation if plugin output does not fit the schema.
    pub fn from_html(&self, html: &str) -> Result<Node, ConvertError> {
        HtmlImporter::new(&self.registry, &self.schema).import(html)
    }
}
