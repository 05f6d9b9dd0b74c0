//! Bullet and ordered lists.
//!
//! The markdown parser reports lists as `list` / `list_item` blocks; this
//! plugin turns them into nodes and writes them back as `-` or `1.` items.

use cm_document::{
    BLOCK_CONTAINERS, Builder, ConvertError, DOCUMENT, Element, Handled, HtmlElement, Node,
    Plugin, SchemaFragment, Serializer, TagBinding, TagEvent,
};

/// List node type.
pub const LIST: &str = "list";
/// List item node type.
pub const LIST_ITEM: &str = "list_item";

/// Plugin for `list` and `list_item` blocks.
#[derive(Debug)]
pub struct ListPlugin {
    tags: Vec<TagBinding>,
}

impl ListPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: vec![
                TagBinding::block(LIST, LIST).with_html("ul").with_html("ol"),
                TagBinding::block(LIST_ITEM, LIST_ITEM).with_html("li"),
            ],
        }
    }

    fn render_list(element: &Element, serializer: &Serializer<'_>) -> Result<String, ConvertError> {
        let ordered = element.data.get("ordered") == Some("true");
        let start = element
            .data
            .get("start")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);

        let mut items = Vec::with_capacity(element.nodes.len());
        for (number, item) in (start..).zip(&element.nodes) {
            let marker = if ordered {
                format!("{number}. ")
            } else {
                "- ".to_owned()
            };
            let body = match item.element() {
                Some(el) if el.node_type == LIST_ITEM => Self::render_item(el, serializer)?,
                _ => serializer.node(item)?,
            };
            items.push(indent_item(&marker, &body));
        }
        Ok(items.join("\n"))
    }

    /// Item blocks; a nested list follows its lead paragraph directly.
    fn render_item(element: &Element, serializer: &Serializer<'_>) -> Result<String, ConvertError> {
        let mut out = String::new();
        for (i, child) in element.nodes.iter().enumerate() {
            if i > 0 {
                out.push_str(if child.node_type() == LIST { "\n" } else { "\n\n" });
            }
            out.push_str(&serializer.node(child)?);
        }
        Ok(out)
    }
}

impl Default for ListPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ListPlugin {
    fn name(&self) -> &str {
        LIST
    }

    fn tags(&self) -> &[TagBinding] {
        &self.tags
    }

    fn augment_schema(&self, fragment: &mut SchemaFragment) {
        fragment
            .allow_in(BLOCK_CONTAINERS, LIST)
            .allow(LIST, LIST_ITEM)
            .accept_like(LIST_ITEM, DOCUMENT);
    }

    fn from_markdown(
        &self,
        builder: &mut Builder<'_>,
        event: TagEvent<'_>,
    ) -> Result<Handled, ConvertError> {
        let TagEvent::Block { tag, attrs } = event else {
            return Err(ConvertError::malformed(format!(
                "`{}` is only valid as a list block",
                event.tag()
            )));
        };
        builder.open_node(Node::block(Element::new(tag).with_data(attrs.clone())))?;
        Ok(Handled::Opened)
    }

    fn to_markdown(
        &self,
        element: &Element,
        serializer: &Serializer<'_>,
    ) -> Result<String, ConvertError> {
        match element.node_type.as_str() {
            LIST => Self::render_list(element, serializer),
            LIST_ITEM => Self::render_item(element, serializer),
            other => Err(ConvertError::UnknownNodeType(other.to_owned())),
        }
    }

    fn from_html(&self, element: &HtmlElement, children: Vec<Node>) -> Option<Node> {
        match element.tag.as_str() {
            "ul" | "ol" => {
                let mut list = Element::new(LIST);
                list.data
                    .insert("ordered", (element.tag == "ol").to_string());
                if let Some(start) = element.attrs.get("start").filter(|s| *s != "1") {
                    list.data.insert("start", start);
                }
                list.nodes = children
                    .into_iter()
                    .filter(|child| child.node_type() == LIST_ITEM)
                    .collect();
                Some(Node::block(list))
            }
            "li" => {
                let mut item = Element::new(LIST_ITEM);
                item.nodes = children;
                Some(Node::block(item))
            }
            _ => None,
        }
    }
}

/// Prefix the first line with `marker` and indent continuation lines to
/// match.
fn indent_item(marker: &str, body: &str) -> String {
    if body.is_empty() {
        return marker.trim_end().to_owned();
    }
    let indent = " ".repeat(marker.len());
    let mut out = String::new();
    for (i, line) in body.lines().enumerate() {
        if i == 0 {
            out.push_str(marker);
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&indent);
                out.push_str(line);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cm_document::Converter;
    use pretty_assertions::assert_eq;

    use super::*;

    fn converter() -> Converter {
        Converter::new(vec![Arc::new(ListPlugin::new())]).unwrap()
    }

    fn round_trip(markdown: &str) -> String {
        let converter = converter();
        let doc = converter.parse(markdown).unwrap();
        converter.serialize(&doc).unwrap()
    }

    #[test]
    fn test_bullet_list_tree() {
        let doc = converter().parse("- one\n- two\n").unwrap();
        let list = &doc.children()[0];
        assert_eq!(list.node_type(), LIST);
        assert_eq!(list.children().len(), 2);
        let item = &list.children()[0];
        assert_eq!(item.node_type(), LIST_ITEM);
        assert_eq!(item.children()[0].node_type(), "paragraph");
        assert_eq!(item.plain_text(), "one");
    }

    #[test]
    fn test_bullet_list_round_trip() {
        assert_eq!(round_trip("- one\n- two\n"), "- one\n- two\n");
    }

    #[test]
    fn test_ordered_list_keeps_start() {
        assert_eq!(round_trip("3. three\n4. four\n"), "3. three\n4. four\n");
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(round_trip("- a\n  - b\n- c\n"), "- a\n  - b\n- c\n");
    }

    #[test]
    fn test_list_between_paragraphs() {
        assert_eq!(
            round_trip("Intro\n\n- a\n- b\n\nOutro\n"),
            "Intro\n\n- a\n- b\n\nOutro\n"
        );
    }

    #[test]
    fn test_list_in_block_quote() {
        assert_eq!(round_trip("> - a\n> - b\n"), "> - a\n> - b\n");
    }

    #[test]
    fn test_html_lists() {
        let converter = converter();
        let doc = converter
            .from_html("<ol start=\"2\"><li>first</li>\n<li><b>second</b></li></ol>")
            .unwrap();
        assert_eq!(
            converter.serialize(&doc).unwrap(),
            "2. first\n3. **second**\n"
        );
    }

    #[test]
    fn test_indent_item() {
        assert_eq!(indent_item("- ", "a\n\nb"), "- a\n\n  b");
        assert_eq!(indent_item("10. ", ""), "10.");
    }
}
