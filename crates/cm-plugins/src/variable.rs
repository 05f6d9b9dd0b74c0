//! Variables: named fill-in-the-blank slots.
//!
//! ```text
//! <variable id="amount" value="100000"/>      resolved, value attribute
//! <variable id="amount">100000</variable>     resolved, paired form
//! <variable id="amount"/>                     unresolved
//! ```
//!
//! A resolved variable is an inline node with one text child holding the
//! value. An unresolved variable has no children and `state="unresolved"`.
//! Serialization always uses the self-closing form.

use cm_document::{
    Attributes, Builder, ConvertError, Element, Handled, HtmlElement, INLINE_CONTAINERS, Node,
    Plugin, SchemaFragment, Serializer, TEXT, TagBinding, TagEvent,
};

/// Variable node type.
pub const VARIABLE: &str = "variable";

/// Attribute marking a variable without a value.
pub const STATE: &str = "state";

/// [`STATE`] value of an unresolved variable.
pub const UNRESOLVED: &str = "unresolved";

/// Plugin for `<variable>` pseudo-tags.
#[derive(Debug)]
pub struct VariablePlugin {
    tags: Vec<TagBinding>,
}

impl VariablePlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: vec![TagBinding::inline(VARIABLE, VARIABLE).with_html(VARIABLE)],
        }
    }
}

impl Default for VariablePlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a variable node from its attributes.
///
/// The `value` attribute becomes the text child; without it the variable is
/// unresolved.
#[must_use]
pub fn variable_node(attrs: &Attributes) -> Node {
    let mut data = attrs.clone();
    let value = data.remove("value");
    let mut element = Element::new(VARIABLE);
    match value {
        Some(value) => {
            data.remove(STATE);
            element.nodes.push(Node::text(value));
        }
        None => data.insert(STATE, UNRESOLVED),
    }
    element.data = data;
    Node::inline(element)
}

/// An unresolved variable for a placeholder name.
#[must_use]
pub fn unresolved(id: &str) -> Node {
    variable_node(&Attributes::new().with("id", id))
}

/// Whether a node is an unresolved variable.
#[must_use]
pub fn is_unresolved(node: &Node) -> bool {
    node.element().is_some_and(|el| {
        el.node_type == VARIABLE && el.data.get(STATE) == Some(UNRESOLVED)
    })
}

impl Plugin for VariablePlugin {
    fn name(&self) -> &str {
        VARIABLE
    }

    fn tags(&self) -> &[TagBinding] {
        &self.tags
    }

    fn augment_schema(&self, fragment: &mut SchemaFragment) {
        fragment
            .allow_in(INLINE_CONTAINERS, VARIABLE)
            .allow_single(VARIABLE, TEXT);
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
            return Err(ConvertError::malformed("`variable` is an inline tag"));
        };
        if !attrs.contains("id") {
            return Err(ConvertError::malformed("`<variable>` requires an `id`"));
        }

        builder.ensure_inline_context()?;

        if self_closing {
            builder.append_child(variable_node(attrs))?;
            return Ok(Handled::Complete);
        }

        let mut data = attrs.clone();
        data.remove("value");
        data.remove(STATE);
        builder.open_node(Node::inline(Element::new(VARIABLE).with_data(data)))?;
        Ok(Handled::Opened)
    }

    fn to_markdown(
        &self,
        element: &Element,
        _serializer: &Serializer<'_>,
    ) -> Result<String, ConvertError> {
        let mut attrs = element.data.clone();
        attrs.remove(STATE);
        if element.data.get(STATE) != Some(UNRESOLVED) {
            attrs.insert("value", element.text());
        }
        Ok(format!("<{VARIABLE}{}/>", attrs.to_syntax(&["id", "value"])))
    }

    fn from_html(&self, element: &HtmlElement, _children: Vec<Node>) -> Option<Node> {
        let mut attrs = element.attrs.clone();
        if !attrs.contains("value") {
            let text = element.text();
            if !text.trim().is_empty() {
                attrs.insert("value", text.trim());
            }
        }
        Some(variable_node(&attrs))
    }
}
