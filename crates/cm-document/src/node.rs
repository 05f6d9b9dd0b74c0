//! Document tree data structures.

use crate::attrs::Attributes;

/// Type name of the root node.
pub const DOCUMENT: &str = "document";
/// Type name of the base paragraph block.
pub const PARAGRAPH: &str = "paragraph";
/// Type name of text leaves.
pub const TEXT: &str = "text";

/// Object kind of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ObjectKind {
    /// The root.
    Document,
    /// Block-level element.
    Block,
    /// Inline element.
    Inline,
    /// Text leaf.
    Text,
}

impl ObjectKind {
    /// Lowercase name used in messages and render descriptions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Block => "block",
            Self::Inline => "inline",
            Self::Text => "text",
        }
    }
}

/// An element with a type, attributes and children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element {
    /// Node type (`paragraph`, `clause`, ...).
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub node_type: String,
    /// Plugin-defined attributes.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Attributes::is_empty"))]
    pub data: Attributes,
    /// Ordered children.
    #[cfg_attr(feature = "serde", serde(default))]
    pub nodes: Vec<Node>,
}

impl Element {
    /// Create an element without attributes or children.
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            data: Attributes::new(),
            nodes: Vec::new(),
        }
    }

    /// Set the attributes.
    #[must_use]
    pub fn with_data(mut self, data: Attributes) -> Self {
        self.data = data;
        self
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.nodes, &mut out);
        out
    }
}

/// Text leaf payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Text {
    /// The text content.
    pub text: String,
}

/// A node of the document tree, discriminated by object kind.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "object", rename_all = "lowercase"))]
pub enum Node {
    /// The root node; children are blocks.
    Document(Element),
    /// A block node.
    Block(Element),
    /// An inline node.
    Inline(Element),
    /// A text leaf.
    Text(Text),
}

impl Node {
    /// Create an empty document.
    #[must_use]
    pub fn document() -> Self {
        Self::Document(Element::new(DOCUMENT))
    }

    /// Create a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Text { text: text.into() })
    }

    /// Create a block node from an element.
    #[must_use]
    pub fn block(element: Element) -> Self {
        Self::Block(element)
    }

    /// Create an inline node from an element.
    #[must_use]
    pub fn inline(element: Element) -> Self {
        Self::Inline(element)
    }

    /// Wrap an element in the node variant for `object`.
    ///
    /// Returns `None` for [`ObjectKind::Text`], which carries no element.
    #[must_use]
    pub fn from_element(object: ObjectKind, element: Element) -> Option<Self> {
        match object {
            ObjectKind::Document => Some(Self::Document(element)),
            ObjectKind::Block => Some(Self::Block(element)),
            ObjectKind::Inline => Some(Self::Inline(element)),
            ObjectKind::Text => None,
        }
    }

    /// Object kind of this node.
    #[must_use]
    pub fn object(&self) -> ObjectKind {
        match self {
            Self::Document(_) => ObjectKind::Document,
            Self::Block(_) => ObjectKind::Block,
            Self::Inline(_) => ObjectKind::Inline,
            Self::Text(_) => ObjectKind::Text,
        }
    }

    /// Node type name (`text` for text leaves).
    #[must_use]
    pub fn node_type(&self) -> &str {
        match self {
            Self::Document(el) | Self::Block(el) | Self::Inline(el) => &el.node_type,
            Self::Text(_) => TEXT,
        }
    }

    /// The element, unless this is a text leaf.
    #[must_use]
    pub fn element(&self) -> Option<&Element> {
        match self {
            Self::Document(el) | Self::Block(el) | Self::Inline(el) => Some(el),
            Self::Text(_) => None,
        }
    }

    /// Mutable access to the element, unless this is a text leaf.
    pub fn element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Document(el) | Self::Block(el) | Self::Inline(el) => Some(el),
            Self::Text(_) => None,
        }
    }

    /// Children (empty for text leaves).
    #[must_use]
    pub fn children(&self) -> &[Node] {
        self.element().map_or(&[], |el| el.nodes.as_slice())
    }

    /// Text payload of a text leaf.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Concatenated text of this node and all descendants.
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text(t) => t.text.clone(),
            _ => {
                let mut out = String::new();
                collect_text(self.children(), &mut out);
                out
            }
        }
    }

    /// Describe this node for a renderer.
    #[must_use]
    pub fn describe(&self) -> RenderNode {
        match self {
            Self::Text(t) => RenderNode {
                object: ObjectKind::Text,
                node_type: TEXT.to_owned(),
                attrs: Attributes::new(),
                text: Some(t.text.clone()),
                children: Vec::new(),
            },
            Self::Document(el) | Self::Block(el) | Self::Inline(el) => RenderNode {
                object: self.object(),
                node_type: el.node_type.clone(),
                attrs: el.data.clone(),
                text: None,
                children: el.nodes.iter().map(Node::describe).collect(),
            },
        }
    }

    /// Visit this node and all descendants in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Render-oriented description of a node: `{type, attrs, children}`.
///
/// This is what the GUI layer consumes. It needs no knowledge of parsing or
/// schema rules.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderNode {
    /// Object kind.
    pub object: ObjectKind,
    /// Node type.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub node_type: String,
    /// Attributes.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Attributes::is_empty"))]
    pub attrs: Attributes,
    /// Text payload for text leaves.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub text: Option<String>,
    /// Child descriptions.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<RenderNode>,
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(&t.text),
            _ => collect_text(node.children(), out),
        }
    }
}
