//! Plugin contract.
//!
//! A plugin contributes one or more node types together with their markdown
//! syntax, schema rules, and converters in both directions.

use crate::attrs::Attributes;
use crate::builder::Builder;
use crate::error::ConvertError;
use crate::html::HtmlElement;
use crate::node::{Element, Node, ObjectKind};
use crate::schema::SchemaFragment;
use crate::serializer::Serializer;

/// Association between a markdown tag and the node type it produces.
///
/// For block bindings the markdown tag is either the name used in a fenced
/// block's info string (`` ``` <clause ...> ``) or a block kind produced by
/// the markdown parser (`list`). For inline bindings it is the pseudo-tag
/// name (`<variable .../>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagBinding {
    /// Markdown tag name.
    pub markdown: String,
    /// Document node type produced for the tag.
    pub node_type: String,
    /// Object kind of the produced node.
    pub object: ObjectKind,
    /// HTML tag names handled by [`Plugin::from_html`].
    pub html: Vec<String>,
}

impl TagBinding {
    /// Bind a block-level markdown tag to a node type.
    #[must_use]
    pub fn block(markdown: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            node_type: node_type.into(),
            object: ObjectKind::Block,
            html: Vec::new(),
        }
    }

    /// Bind an inline pseudo-tag to a node type.
    #[must_use]
    pub fn inline(markdown: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            node_type: node_type.into(),
            object: ObjectKind::Inline,
            html: Vec::new(),
        }
    }

    /// Add an HTML tag name handled by the plugin on import.
    #[must_use]
    pub fn with_html(mut self, tag: impl Into<String>) -> Self {
        self.html.push(tag.into());
        self
    }
}

/// Tag occurrence handed to [`Plugin::from_markdown`].
#[derive(Clone, Copy, Debug)]
pub enum TagEvent<'a> {
    /// A block kind produced by the markdown parser (e.g. `list`).
    Block {
        /// Markdown tag.
        tag: &'a str,
        /// Parsed attributes.
        attrs: &'a Attributes,
    },
    /// A fenced custom block; `body` is the verbatim fence content.
    Fenced {
        /// Markdown tag.
        tag: &'a str,
        /// Parsed attributes.
        attrs: &'a Attributes,
        /// Raw text between the fences.
        body: &'a str,
    },
    /// An inline pseudo-tag.
    Inline {
        /// Markdown tag.
        tag: &'a str,
        /// Parsed, percent-decoded attributes.
        attrs: &'a Attributes,
        /// Whether the tag was written `<tag .../>`.
        self_closing: bool,
    },
}

impl<'a> TagEvent<'a> {
    /// Markdown tag name.
    #[must_use]
    pub fn tag(&self) -> &'a str {
        match self {
            Self::Block { tag, .. } | Self::Fenced { tag, .. } | Self::Inline { tag, .. } => tag,
        }
    }

    /// Tag attributes.
    #[must_use]
    pub fn attrs(&self) -> &'a Attributes {
        match self {
            Self::Block { attrs, .. } | Self::Fenced { attrs, .. } | Self::Inline { attrs, .. } => {
                attrs
            }
        }
    }
}

/// What a plugin did with a tag event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    /// The plugin opened a node that stays on the builder stack until the
    /// matching close event.
    Opened,
    /// The plugin produced the complete node; the matching close event is
    /// consumed without further action.
    Complete,
}

/// A self-contained contributor of node types.
///
/// Plugins are shared read-only across conversions and tasks, hence
/// `Send + Sync` and `&self` receivers.
pub trait Plugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Markdown tag declarations, in order.
    fn tags(&self) -> &[TagBinding];

    /// Add this plugin's rules to the schema being composed.
    ///
    /// Node types named in [`tags`](Self::tags) are defined automatically;
    /// use the fragment to declare where they may appear and what they
    /// contain.
    fn augment_schema(&self, fragment: &mut SchemaFragment);

    /// Build tree nodes for a tag through the builder capability.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvertError`] if the tag cannot be represented; the whole
    /// document conversion fails.
    fn from_markdown(
        &self,
        builder: &mut Builder<'_>,
        event: TagEvent<'_>,
    ) -> Result<Handled, ConvertError>;

    /// Serialize a node owned by this plugin.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvertError`] if a descendant cannot be serialized.
    fn to_markdown(
        &self,
        element: &Element,
        serializer: &Serializer<'_>,
    ) -> Result<String, ConvertError>;

    /// Convert an imported HTML element whose tag is listed in a binding's
    /// `html` names. `children` are the already converted child nodes.
    ///
    /// Returning `None` unwraps the element and keeps only its children.
    fn from_html(&self, _element: &HtmlElement, _children: Vec<Node>) -> Option<Node> {
        None
    }
}
