//! The `clause` block.

use cm_document::{
    BLOCK_CONTAINERS, Builder, ConvertError, DOCUMENT, Element, Handled, HtmlElement, Node,
    Plugin, SchemaFragment, Serializer, TagBinding, TagEvent, fenced,
};

/// Clause node type and markdown tag.
pub const CLAUSE: &str = "clause";

/// Raw template text of a resolved clause.
pub const TEMPLATE: &str = "cm:template";
/// Resolution state: [`RESOLVED`] or [`UNRESOLVED`].
pub const STATUS: &str = "cm:status";
/// Why the clause is unresolved.
pub const ERROR: &str = "cm:error";

/// [`STATUS`] of a clause whose content came from its template.
pub const RESOLVED: &str = "resolved";
/// [`STATUS`] of a clause that could not be resolved.
pub const UNRESOLVED: &str = "unresolved";

/// Plugin for fenced `<clause ...>` blocks.
#[derive(Debug)]
pub struct ClausePlugin {
    tags: Vec<TagBinding>,
}

impl ClausePlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: vec![TagBinding::block(CLAUSE, CLAUSE).with_html(CLAUSE)],
        }
    }
}

impl Default for ClausePlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Mark a clause unresolved with a reason.
pub(crate) fn mark_unresolved(element: &mut Element, reason: &str) {
    element.data.insert(STATUS, UNRESOLVED);
    element.data.insert(ERROR, reason);
}

impl Plugin for ClausePlugin {
    fn name(&self) -> &str {
        CLAUSE
    }

    fn tags(&self) -> &[TagBinding] {
        &self.tags
    }

    fn augment_schema(&self, fragment: &mut SchemaFragment) {
        fragment
            .allow_in(BLOCK_CONTAINERS, CLAUSE)
            .accept_like(CLAUSE, DOCUMENT);
    }

    fn from_markdown(
        &self,
        builder: &mut Builder<'_>,
        event: TagEvent<'_>,
    ) -> Result<Handled, ConvertError> {
        let TagEvent::Fenced { attrs, body, .. } = event else {
            return Err(ConvertError::malformed(
                "`clause` must be written as a fenced block",
            ));
        };

        let mut element = Element::new(CLAUSE).with_data(attrs.clone());
        match builder.parse_nested(body) {
            Ok(nodes) => element.nodes = nodes,
            Err(err @ ConvertError::RecursionLimitExceeded { .. }) => {
                tracing::debug!(
                    src = attrs.get("src").unwrap_or_default(),
                    depth = builder.depth(),
                    "Clause body nested too deeply"
                );
                mark_unresolved(&mut element, &err.to_string());
            }
            Err(err) => return Err(err),
        }

        builder.append_child(Node::block(element))?;
        Ok(Handled::Complete)
    }

    fn to_markdown(
        &self,
        element: &Element,
        serializer: &Serializer<'_>,
    ) -> Result<String, ConvertError> {
        let info = format!("<{CLAUSE}{}>", element.data.to_syntax(&["src", "clauseid"]));
        let body = serializer.blocks(&element.nodes)?;
        Ok(fenced(&info, &body))
    }

    fn from_html(&self, element: &HtmlElement, children: Vec<Node>) -> Option<Node> {
        let mut clause = Element::new(CLAUSE).with_data(element.attrs.clone());
        clause.nodes = children;
        Some(Node::block(clause))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cm_document::{ConvertOptions, Converter, PARAGRAPH};
    use pretty_assertions::assert_eq;

    use super::*;

    fn converter() -> Converter {
        Converter::new(vec![Arc::new(ClausePlugin::new())]).unwrap()
    }

    #[test]
    fn test_clause_block_then_prose() {
        let doc = converter()
            .parse("```<clause src=\"T\" clauseid=\"1\">\nrewritten text\n```\n\nSome prose.\n")
            .unwrap();
        let children = doc.children();
        assert_eq!(children.len(), 2);

        let clause = children[0].element().unwrap();
        assert_eq!(clause.node_type, CLAUSE);
        assert_eq!(clause.data.get("src"), Some("T"));
        assert_eq!(clause.data.get("clauseid"), Some("1"));
        assert_eq!(clause.nodes[0].node_type(), PARAGRAPH);
        assert_eq!(clause.nodes[0].plain_text(), "rewritten text");

        assert_eq!(children[1].node_type(), PARAGRAPH);
        assert_eq!(children[1].plain_text(), "Some prose.");
    }

    #[test]
    fn test_clause_round_trip() {
        let converter = converter();
        let text = "```<clause src=\"T\" clauseid=\"1\" amount=\"100%20000\">\n# Title\n\nBody.\n```\n";
        let doc = converter.parse(text).unwrap();
        assert_eq!(converter.serialize(&doc).unwrap(), text);
    }

    #[test]
    fn test_empty_clause_round_trip() {
        let converter = converter();
        let text = "```<clause src=\"T\" clauseid=\"1\">\n```\n";
        let doc = converter.parse(text).unwrap();
        assert!(doc.children()[0].children().is_empty());
        assert_eq!(converter.serialize(&doc).unwrap(), text);
    }

    #[test]
    fn test_internal_attributes_are_not_serialized() {
        let converter = converter();
        let mut doc = converter
            .parse("```<clause src=\"T\" clauseid=\"1\">\nx\n```")
            .unwrap();
        let clause = doc.element_mut().unwrap().nodes[0].element_mut().unwrap();
        clause.data.insert(TEMPLATE, "x");
        clause.data.insert(STATUS, RESOLVED);
        assert_eq!(
            converter.serialize(&doc).unwrap(),
            "```<clause src=\"T\" clauseid=\"1\">\nx\n```\n"
        );
    }

    #[test]
    fn test_nested_fence_gets_longer_fence() {
        let converter = converter();
        let text = "````<clause src=\"outer\">\n```<clause src=\"inner\">\nDeep.\n```\n````\n";
        let doc = converter.parse(text).unwrap();
        let outer = doc.children()[0].element().unwrap();
        assert_eq!(outer.nodes[0].node_type(), CLAUSE);
        assert_eq!(outer.nodes[0].plain_text(), "Deep.");
        assert_eq!(converter.serialize(&doc).unwrap(), text);
    }

    #[test]
    fn test_depth_limit_marks_clause_unresolved() {
        let converter = converter().with_options(ConvertOptions { max_depth: 1 });
        let text = "````<clause src=\"outer\">\n```<clause src=\"inner\">\nDeep.\n```\n````\n\nAfter.\n";
        let doc = converter.parse(text).unwrap();

        let outer = doc.children()[0].element().unwrap();
        assert_eq!(outer.data.get(STATUS), None);
        let inner = outer.nodes[0].element().unwrap();
        assert_eq!(inner.data.get(STATUS), Some(UNRESOLVED));
        assert!(inner.data.get(ERROR).unwrap().contains("nesting depth"));
        assert!(inner.nodes.is_empty());
        assert_eq!(doc.children()[1].plain_text(), "After.");
    }

    #[test]
    fn test_inline_clause_is_plain_text() {
        let doc = converter().parse("See <clause src=\"T\"/> here.").unwrap();
        assert_eq!(doc.children()[0].node_type(), PARAGRAPH);
    }

    #[test]
    fn test_html_clause() {
        let converter = converter();
        let doc = converter
            .from_html(r#"<clause src="T" clauseid="2"><p>Body</p></clause>"#)
            .unwrap();
        assert_eq!(
            converter.serialize(&doc).unwrap(),
            "```<clause src=\"T\" clauseid=\"2\">\nBody\n```\n"
        );
    }
}
