//! Stack-based construction of document trees from markdown events.
//!
//! The builder keeps a stack of open frames rooted at the document. Base
//! events are handled directly; registered tags are dispatched to their
//! plugin, which manipulates the stack through the public capability methods
//! on [`Builder`].

use crate::converter::Converter;
use crate::error::ConvertError;
use crate::node::{DOCUMENT, Element, Node, ObjectKind, PARAGRAPH, TEXT};
use crate::parser::MarkdownEvent;
use crate::plugin::{Handled, TagEvent};
use crate::schema::ChildRule;

/// An open element on the builder stack.
#[derive(Debug)]
struct Frame {
    element: Element,
    object: ObjectKind,
    /// Markdown tag whose close event pops this frame.
    tag: Option<String>,
    /// Opened by the builder (auto-wrapping paragraph), not by the input.
    implicit: bool,
}

/// Tree builder handed to plugins during markdown conversion.
#[derive(Debug)]
pub struct Builder<'c> {
    converter: &'c Converter,
    stack: Vec<Frame>,
    /// Tags whose close event must be swallowed: plugins returned
    /// [`Handled::Complete`] for their open event.
    consumed: Vec<String>,
    depth: usize,
}

impl<'c> Builder<'c> {
    pub(crate) fn new(converter: &'c Converter, depth: usize) -> Self {
        Self {
            converter,
            stack: vec![Frame {
                element: Element::new(DOCUMENT),
                object: ObjectKind::Document,
                tag: None,
                implicit: false,
            }],
            consumed: Vec::new(),
            depth,
        }
    }

    /// Nesting depth of the document being built (0 for a top-level parse).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Node type of the innermost open element.
    #[must_use]
    pub fn current_parent_type(&self) -> &str {
        &self.top().element.node_type
    }

    /// Whether the innermost open element accepts a child of `node_type`.
    #[must_use]
    pub fn current_parent_accepts(&self, node_type: &str) -> bool {
        self.converter
            .schema()
            .accepts(self.current_parent_type(), node_type)
    }

    /// Open an implicit paragraph unless the current element already
    /// accepts text.
    ///
    /// Implicit paragraphs close automatically at the next block event, at
    /// the close of their parent, or at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::SchemaViolation`] if the current element
    /// accepts neither text nor a paragraph.
    pub fn ensure_inline_context(&mut self) -> Result<(), ConvertError> {
        if self.current_parent_accepts(TEXT) {
            return Ok(());
        }
        self.push(Node::block(Element::new(PARAGRAPH)), true)
    }

    /// Open an element; it receives subsequent children until closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::SchemaViolation`] if the node is not allowed
    /// in the current element, and [`ConvertError::Internal`] for a text
    /// or document node.
    pub fn open_node(&mut self, node: Node) -> Result<(), ConvertError> {
        self.push(node, false)
    }

    /// Close the innermost open element and attach it to its parent.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Internal`] if only the document is open.
    pub fn close_node(&mut self) -> Result<(), ConvertError> {
        if self.stack.len() < 2 {
            return Err(ConvertError::Internal(
                "attempt to close the document node".to_owned(),
            ));
        }
        let Some(frame) = self.stack.pop() else {
            return Err(ConvertError::Internal("builder stack is empty".to_owned()));
        };
        let node = Node::from_element(frame.object, frame.element)
            .ok_or_else(|| ConvertError::Internal("text frame on builder stack".to_owned()))?;
        self.top_mut().element.nodes.push(node);
        Ok(())
    }

    /// Append a complete node to the innermost open element.
    ///
    /// Adjacent text nodes are merged.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::SchemaViolation`] if the node is not allowed
    /// in the current element.
    pub fn append_child(&mut self, node: Node) -> Result<(), ConvertError> {
        self.check_placement(&node)?;
        let nodes = &mut self.top_mut().element.nodes;
        if let (Node::Text(new), Some(Node::Text(last))) = (&node, nodes.last_mut()) {
            last.text.push_str(&new.text);
            return Ok(());
        }
        nodes.push(node);
        Ok(())
    }

    /// Convert a nested markdown document one level deeper and return its
    /// top-level nodes.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::RecursionLimitExceeded`] once the configured
    /// depth is exceeded, or any error of the nested conversion.
    pub fn parse_nested(&self, markdown: &str) -> Result<Vec<Node>, ConvertError> {
        self.converter.parse_fragment(markdown, self.depth + 1)
    }

    pub(crate) fn process(&mut self, event: MarkdownEvent) -> Result<(), ConvertError> {
        let converter = self.converter;
        match event {
            MarkdownEvent::OpenBlock { kind, attrs } => {
                self.close_implicit()?;
                if let Some(plugin) = converter.registry().plugin_for_tag(&kind) {
                    let before = self.stack.len();
                    let handled = plugin.from_markdown(
                        self,
                        TagEvent::Block {
                            tag: &kind,
                            attrs: &attrs,
                        },
                    )?;
                    self.after_plugin(kind, handled, before)
                } else if converter.schema().object_of(&kind) == Some(ObjectKind::Block) {
                    self.open_node(Node::block(Element::new(&kind).with_data(attrs)))?;
                    self.top_mut().tag = Some(kind);
                    Ok(())
                } else {
                    Err(ConvertError::malformed(format!(
                        "no handler for block `{kind}`"
                    )))
                }
            }
            MarkdownEvent::CloseBlock { kind } => {
                self.close_implicit()?;
                self.close_tag(&kind)
            }
            MarkdownEvent::CustomBlock { tag, attrs, body } => {
                self.close_implicit()?;
                let plugin = converter
                    .registry()
                    .plugin_for_tag(&tag)
                    .ok_or_else(|| ConvertError::malformed(format!("unknown block `<{tag}>`")))?;
                let before = self.stack.len();
                let handled = plugin.from_markdown(
                    self,
                    TagEvent::Fenced {
                        tag: &tag,
                        attrs: &attrs,
                        body: &body,
                    },
                )?;
                if handled == Handled::Opened {
                    while self.stack.len() > before {
                        self.close_node()?;
                    }
                }
                Ok(())
            }
            MarkdownEvent::OpenInlineTag {
                tag,
                attrs,
                self_closing,
            } => {
                if let Some(plugin) = converter.registry().plugin_for_tag(&tag) {
                    let before = self.stack.len();
                    let handled = plugin.from_markdown(
                        self,
                        TagEvent::Inline {
                            tag: &tag,
                            attrs: &attrs,
                            self_closing,
                        },
                    )?;
                    self.after_plugin(tag, handled, before)
                } else if converter.schema().object_of(&tag) == Some(ObjectKind::Inline) {
                    if !self.current_parent_accepts(&tag) {
                        self.ensure_inline_context()?;
                    }
                    self.open_node(Node::inline(Element::new(&tag).with_data(attrs)))?;
                    self.top_mut().tag = Some(tag);
                    Ok(())
                } else {
                    Err(ConvertError::malformed(format!("no handler for `<{tag}>`")))
                }
            }
            MarkdownEvent::CloseInlineTag { tag } => self.close_tag(&tag),
            MarkdownEvent::Text(text) => {
                if !self.current_parent_accepts(TEXT) {
                    if text.trim().is_empty() {
                        return Ok(());
                    }
                    self.ensure_inline_context()?;
                }
                self.append_child(Node::text(text))
            }
        }
    }

    /// Close implicit frames and return the finished document.
    pub(crate) fn finish(mut self) -> Result<Node, ConvertError> {
        self.close_implicit()?;

        if let Some(tag) = self.consumed.pop() {
            return Err(ConvertError::Internal(format!(
                "close event for `{tag}` never arrived"
            )));
        }
        let open = &self.stack[1..];
        if let Some(tag) = open.iter().rev().find_map(|frame| frame.tag.as_deref()) {
            return Err(ConvertError::malformed(format!("unclosed `<{tag}>`")));
        }
        if let Some(frame) = open.first() {
            return Err(ConvertError::Internal(format!(
                "plugin left `{}` open",
                frame.element.node_type
            )));
        }

        let Some(root) = self.stack.pop() else {
            return Err(ConvertError::Internal("builder stack is empty".to_owned()));
        };
        Ok(Node::Document(root.element))
    }

    fn after_plugin(
        &mut self,
        tag: String,
        handled: Handled,
        before: usize,
    ) -> Result<(), ConvertError> {
        match handled {
            Handled::Opened => {
                if self.stack.len() <= before || self.top().implicit {
                    return Err(ConvertError::Internal(format!(
                        "plugin for `{tag}` reported an open node but opened none"
                    )));
                }
                self.top_mut().tag = Some(tag);
            }
            Handled::Complete => self.consumed.push(tag),
        }
        Ok(())
    }

    fn close_tag(&mut self, tag: &str) -> Result<(), ConvertError> {
        if self.consumed.last().is_some_and(|t| t == tag) {
            self.consumed.pop();
            return Ok(());
        }

        if self.stack.len() > 1 && self.top().tag.as_deref() == Some(tag) {
            return self.close_node();
        }

        let top = self.top();
        Err(ConvertError::malformed(match &top.tag {
            Some(open) if top.object == ObjectKind::Inline && self.closes_ancestor(tag) => {
                format!("unclosed `<{open}>`")
            }
            Some(open) => format!("`</{tag}>` does not match open `<{open}>`"),
            None => format!("unexpected `</{tag}>`"),
        }))
    }

    fn closes_ancestor(&self, tag: &str) -> bool {
        self.stack
            .iter()
            .rev()
            .skip(1)
            .any(|frame| frame.tag.as_deref() == Some(tag))
    }

    fn close_implicit(&mut self) -> Result<(), ConvertError> {
        while self.top().implicit {
            self.close_node()?;
        }
        Ok(())
    }

    fn push(&mut self, node: Node, implicit: bool) -> Result<(), ConvertError> {
        self.check_placement(&node)?;
        let object = node.object();
        let element = match node {
            Node::Block(el) | Node::Inline(el) => el,
            Node::Document(_) | Node::Text(_) => {
                return Err(ConvertError::Internal(format!(
                    "cannot open a {} node",
                    object.as_str()
                )));
            }
        };
        self.stack.push(Frame {
            element,
            object,
            tag: None,
            implicit,
        });
        Ok(())
    }

    fn check_placement(&self, node: &Node) -> Result<(), ConvertError> {
        let schema = self.converter.schema();
        let child = node.node_type();
        let siblings = &self.top().element.nodes;
        let placed = match schema.child_rule(self.current_parent_type(), child) {
            Some(ChildRule::Repeated) => true,
            Some(ChildRule::Single) => match (node, siblings.last()) {
                // Merges into the existing text node.
                (Node::Text(_), Some(Node::Text(_))) => true,
                _ => !siblings.iter().any(|sibling| sibling.node_type() == child),
            },
            None => false,
        };
        if schema.object_of(child) == Some(node.object()) && placed {
            Ok(())
        } else {
            Err(ConvertError::SchemaViolation {
                parent: self.current_parent_type().to_owned(),
                child: child.to_owned(),
            })
        }
    }

    fn top(&self) -> &Frame {
        // The document frame is only removed by `finish`.
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::attrs::Attributes;

    fn converter() -> Converter {
        Converter::new(Vec::new()).unwrap()
    }

    fn build(events: Vec<MarkdownEvent>) -> Result<Node, ConvertError> {
        let converter = converter();
        let mut builder = Builder::new(&converter, 0);
        for event in events {
            builder.process(event)?;
        }
        builder.finish()
    }

    fn paragraph(children: Vec<Node>) -> Node {
        Node::block(Element {
            node_type: PARAGRAPH.to_owned(),
            data: Attributes::new(),
            nodes: children,
        })
    }

    #[test]
    fn test_stray_text_is_wrapped_in_paragraph() {
        let doc = build(vec![MarkdownEvent::Text("loose".to_owned())]).unwrap();
        assert_eq!(doc.children(), &[paragraph(vec![Node::text("loose")])]);
    }

    #[test]
    fn test_whitespace_between_blocks_is_dropped() {
        let doc = build(vec![MarkdownEvent::Text("\n".to_owned())]).unwrap();
        assert!(doc.children().is_empty());
    }

    #[test]
    fn test_implicit_paragraph_closes_before_next_block() {
        let doc = build(vec![
            MarkdownEvent::Text("a".to_owned()),
            MarkdownEvent::OpenBlock {
                kind: "thematic_break".to_owned(),
                attrs: Attributes::new(),
            },
            MarkdownEvent::CloseBlock {
                kind: "thematic_break".to_owned(),
            },
        ])
        .unwrap();

        let types: Vec<_> = doc.children().iter().map(Node::node_type).collect();
        assert_eq!(types, vec![PARAGRAPH, "thematic_break"]);
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let converter = converter();
        let mut builder = Builder::new(&converter, 0);
        builder.ensure_inline_context().unwrap();
        builder.append_child(Node::text("a")).unwrap();
        builder.append_child(Node::text("b")).unwrap();
        let doc = builder.finish().unwrap();
        assert_eq!(doc.children(), &[paragraph(vec![Node::text("ab")])]);
    }

    #[test]
    fn test_mismatched_close_is_malformed() {
        let err = build(vec![
            MarkdownEvent::OpenBlock {
                kind: PARAGRAPH.to_owned(),
                attrs: Attributes::new(),
            },
            MarkdownEvent::OpenInlineTag {
                tag: "emphasis".to_owned(),
                attrs: Attributes::new(),
                self_closing: false,
            },
            MarkdownEvent::CloseBlock {
                kind: PARAGRAPH.to_owned(),
            },
        ])
        .unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { .. }));
    }

    #[test]
    fn test_unclosed_block_at_end_is_malformed() {
        let err = build(vec![MarkdownEvent::OpenBlock {
            kind: "block_quote".to_owned(),
            attrs: Attributes::new(),
        }])
        .unwrap_err();
        assert_eq!(err, ConvertError::malformed("unclosed `<block_quote>`"));
    }

    #[test]
    fn test_unclosed_inline_in_implicit_paragraph_is_malformed() {
        let err = build(vec![
            MarkdownEvent::OpenInlineTag {
                tag: "emphasis".to_owned(),
                attrs: Attributes::new(),
                self_closing: false,
            },
            MarkdownEvent::Text("100".to_owned()),
        ])
        .unwrap_err();
        assert_eq!(err, ConvertError::malformed("unclosed `<emphasis>`"));
    }

    #[test]
    fn test_block_close_inside_open_inline_names_the_inline() {
        let err = build(vec![
            MarkdownEvent::OpenBlock {
                kind: PARAGRAPH.to_owned(),
                attrs: Attributes::new(),
            },
            MarkdownEvent::OpenInlineTag {
                tag: "strong".to_owned(),
                attrs: Attributes::new(),
                self_closing: false,
            },
            MarkdownEvent::CloseBlock {
                kind: PARAGRAPH.to_owned(),
            },
        ])
        .unwrap_err();
        assert_eq!(err, ConvertError::malformed("unclosed `<strong>`"));
    }

    #[test]
    fn test_unknown_block_kind_is_malformed() {
        let err = build(vec![MarkdownEvent::OpenBlock {
            kind: "list".to_owned(),
            attrs: Attributes::new(),
        }])
        .unwrap_err();
        assert_eq!(err, ConvertError::malformed("no handler for block `list`"));
    }

    #[test]
    fn test_open_node_checks_schema() {
        let converter = converter();
        let mut builder = Builder::new(&converter, 0);
        let err = builder
            .open_node(Node::inline(Element::new("emphasis")))
            .unwrap_err();
        assert_eq!(
            err,
            ConvertError::SchemaViolation {
                parent: DOCUMENT.to_owned(),
                child: "emphasis".to_owned(),
            }
        );
    }

    #[test]
    fn test_close_document_is_internal_error() {
        let converter = converter();
        let mut builder = Builder::new(&converter, 0);
        assert!(matches!(
            builder.close_node(),
            Err(ConvertError::Internal(_))
        ));
    }

    #[test]
    fn test_parse_nested_respects_depth_limit() {
        let converter = converter();
        let builder = Builder::new(&converter, converter.options().max_depth);
        let err = builder.parse_nested("text").unwrap_err();
        assert!(matches!(err, ConvertError::RecursionLimitExceeded { .. }));
    }

    #[test]
    fn test_parse_nested_returns_blocks() {
        let converter = converter();
        let builder = Builder::new(&converter, 0);
        let nodes = builder.parse_nested("# Title\n\nBody").unwrap();
        let types: Vec<_> = nodes.iter().map(Node::node_type).collect();
        assert_eq!(types, vec!["heading", PARAGRAPH]);
    }
}
