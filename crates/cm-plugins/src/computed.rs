//! Computed values: derived, read-only slots.
//!
//! Written as `<computed value="..."/>`. With [`ComputedPlugin::raw_value`]
//! the value is serialized as `{{value}}` instead, for consumers that
//! evaluate the expression themselves.

use cm_document::{
    Builder, ConvertError, Element, Handled, HtmlElement, INLINE_CONTAINERS, Node, Plugin,
    SchemaFragment, Serializer, TEXT, TagBinding, TagEvent,
};

/// Computed node type.
pub const COMPUTED: &str = "computed";

/// Plugin for `<computed>` pseudo-tags.
#[derive(Debug)]
pub struct ComputedPlugin {
    tags: Vec<TagBinding>,
    raw_value: bool,
}

impl ComputedPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: vec![TagBinding::inline(COMPUTED, COMPUTED).with_html(COMPUTED)],
            raw_value: false,
        }
    }

    /// Serialize values as `{{value}}` rather than as a pseudo-tag.
    ///
    /// The output no longer parses back into a computed node.
    #[must_use]
    pub fn raw_value(mut self, raw_value: bool) -> Self {
        self.raw_value = raw_value;
        self
    }
}

impl Default for ComputedPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ComputedPlugin {
    fn name(&self) -> &str {
        COMPUTED
    }

    fn tags(&self) -> &[TagBinding] {
        &self.tags
    }

    fn augment_schema(&self, fragment: &mut SchemaFragment) {
        fragment
            .allow_in(INLINE_CONTAINERS, COMPUTED)
            .allow_single(COMPUTED, TEXT);
    }

    fn from_markdown(
        &self,
        builder: &mut Builder<'_>,
        event: TagEvent<'_>,
    ) -> Result<Handled, ConvertError> {
        let TagEvent::Inline {
            attrs,
            self_closing,
            ..
        } = event
        else {
            return Err(ConvertError::malformed("`computed` is an inline tag"));
        };

        builder.ensure_inline_context()?;

        let mut data = attrs.clone();
        let value = data.remove("value");
        let mut element = Element::new(COMPUTED).with_data(data);

        if self_closing {
            element.nodes.push(Node::text(value.unwrap_or_default()));
            builder.append_child(Node::inline(element))?;
            Ok(Handled::Complete)
        } else {
            builder.open_node(Node::inline(element))?;
            Ok(Handled::Opened)
        }
    }

    fn to_markdown(
        &self,
        element: &Element,
        _serializer: &Serializer<'_>,
    ) -> Result<String, ConvertError> {
        let value = element.text();
        if self.raw_value {
            return Ok(format!("{{{{{value}}}}}"));
        }
        let attrs = element.data.clone().with("value", value);
        Ok(format!("<{COMPUTED}{}/>", attrs.to_syntax(&["value"])))
    }

    fn from_html(&self, element: &HtmlElement, _children: Vec<Node>) -> Option<Node> {
        let mut data = element.attrs.clone();
        let value = data
            .remove("value")
            .unwrap_or_else(|| element.text().trim().to_owned());
        Some(Node::inline(
            Element::new(COMPUTED)
                .with_data(data)
                .with_child(Node::text(value)),
        ))
    }
}
