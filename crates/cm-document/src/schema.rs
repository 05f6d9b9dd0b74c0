//! Schema composition and validation.
//!
//! The base schema defines the markdown core node types. Each plugin adds
//! definitions and permissions through a [`SchemaFragment`]; [`compose`]
//! folds the fragments into a new [`Schema`] without touching the base.

use std::collections::{BTreeMap, HashMap};

use crate::error::{ConvertError, LoadError};
use crate::node::{DOCUMENT, Node, ObjectKind, PARAGRAPH, TEXT};
use crate::registry::Registry;

const BASE_OWNER: &str = "base";

/// Node types defined by the base schema.
pub const BASE_TYPES: &[&str] = &[
    DOCUMENT,
    PARAGRAPH,
    TEXT,
    "heading",
    "block_quote",
    "code_block",
    "thematic_break",
    "html_block",
    "emphasis",
    "strong",
    "strikethrough",
    "code",
    "link",
    "image",
    "hard_break",
];

/// Base types whose children are blocks.
pub const BLOCK_CONTAINERS: &[&str] = &[DOCUMENT, "block_quote"];

/// Base types whose children are inline content.
pub const INLINE_CONTAINERS: &[&str] = &[
    PARAGRAPH,
    "heading",
    "emphasis",
    "strong",
    "strikethrough",
    "link",
];

const BASE_BLOCKS: &[&str] = &[
    PARAGRAPH,
    "heading",
    "block_quote",
    "code_block",
    "thematic_break",
    "html_block",
];

const BASE_INLINES: &[&str] = &[
    TEXT,
    "emphasis",
    "strong",
    "strikethrough",
    "code",
    "link",
    "image",
    "hard_break",
];

/// Definition of a node type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeRule {
    /// Object kind nodes of this type must have.
    pub object: ObjectKind,
    /// Plugin (or `base`) that defined the type.
    pub owner: String,
}

/// How a permitted child type may occur inside its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum ChildRule {
    /// Any number of times.
    #[default]
    Repeated,
    /// At most once.
    Single,
}

/// Composed set of structural rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Schema {
    nodes: BTreeMap<String, NodeRule>,
    children: BTreeMap<String, BTreeMap<String, ChildRule>>,
}

impl Schema {
    /// The base markdown schema.
    #[must_use]
    pub fn base() -> Self {
        let mut schema = Self::default();

        schema.define(DOCUMENT, ObjectKind::Document);
        schema.define(TEXT, ObjectKind::Text);
        for block in BASE_BLOCKS {
            schema.define(block, ObjectKind::Block);
        }
        for inline in &BASE_INLINES[1..] {
            schema.define(inline, ObjectKind::Inline);
        }

        for parent in BLOCK_CONTAINERS {
            for block in BASE_BLOCKS {
                schema.permit(parent, block);
            }
        }
        for parent in INLINE_CONTAINERS {
            for inline in BASE_INLINES {
                schema.permit(parent, inline);
            }
        }
        for leaf in ["code_block", "html_block", "code", "image"] {
            schema.permit(leaf, TEXT);
        }

        schema
    }

    fn define(&mut self, node_type: &str, object: ObjectKind) {
        self.nodes.insert(
            node_type.to_owned(),
            NodeRule {
                object,
                owner: BASE_OWNER.to_owned(),
            },
        );
    }

    fn permit(&mut self, parent: &str, child: &str) {
        self.children
            .entry(parent.to_owned())
            .or_default()
            .insert(child.to_owned(), ChildRule::Repeated);
    }

    /// Rule for a node type.
    #[must_use]
    pub fn rule(&self, node_type: &str) -> Option<&NodeRule> {
        self.nodes.get(node_type)
    }

    /// Object kind of a node type.
    #[must_use]
    pub fn object_of(&self, node_type: &str) -> Option<ObjectKind> {
        self.nodes.get(node_type).map(|rule| rule.object)
    }

    /// Whether `child` may appear directly inside `parent`.
    #[must_use]
    pub fn accepts(&self, parent: &str, child: &str) -> bool {
        self.child_rule(parent, child).is_some()
    }

    /// Rule for `child` directly inside `parent`, if permitted.
    #[must_use]
    pub fn child_rule(&self, parent: &str, child: &str) -> Option<ChildRule> {
        self.children
            .get(parent)
            .and_then(|allowed| allowed.get(child))
            .copied()
    }

    /// Child types permitted inside `parent`, sorted.
    pub fn children_of(&self, parent: &str) -> impl Iterator<Item = &str> {
        self.children
            .get(parent)
            .into_iter()
            .flat_map(|allowed| allowed.keys().map(String::as_str))
    }

    /// All defined node types, sorted.
    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Check a complete tree against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::SchemaViolation`] for the first misplaced
    /// node, or [`ConvertError::UnknownNodeType`] for a type with no rule.
    pub fn validate(&self, root: &Node) -> Result<(), ConvertError> {
        if root.object() != ObjectKind::Document {
            return Err(ConvertError::SchemaViolation {
                parent: String::new(),
                child: root.node_type().to_owned(),
            });
        }
        self.validate_children(root)
    }

    fn validate_children(&self, parent: &Node) -> Result<(), ConvertError> {
        let siblings = parent.children();
        for (index, child) in siblings.iter().enumerate() {
            let child_type = child.node_type();
            let object = self
                .object_of(child_type)
                .ok_or_else(|| ConvertError::UnknownNodeType(child_type.to_owned()))?;
            let repeated = || {
                siblings[..index]
                    .iter()
                    .any(|earlier| earlier.node_type() == child_type)
            };
            let placed = match self.child_rule(parent.node_type(), child_type) {
                Some(ChildRule::Repeated) => true,
                Some(ChildRule::Single) => !repeated(),
                None => false,
            };
            if object != child.object() || !placed {
                return Err(ConvertError::SchemaViolation {
                    parent: parent.node_type().to_owned(),
                    child: child_type.to_owned(),
                });
            }
            self.validate_children(child)?;
        }
        Ok(())
    }
}

/// Schema additions contributed by one plugin.
#[derive(Clone, Debug)]
pub struct SchemaFragment {
    plugin: String,
    definitions: Vec<(String, ObjectKind)>,
    permissions: Vec<(String, String, ChildRule)>,
    mirrors: Vec<(String, String)>,
}

impl SchemaFragment {
    /// Create an empty fragment for a plugin.
    #[must_use]
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            definitions: Vec::new(),
            permissions: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    /// Plugin the fragment belongs to.
    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Define a node type with its object kind.
    pub fn define(&mut self, node_type: impl Into<String>, object: ObjectKind) -> &mut Self {
        self.definitions.push((node_type.into(), object));
        self
    }

    /// Permit `child` directly inside `parent`, any number of times.
    pub fn allow(&mut self, parent: impl Into<String>, child: impl Into<String>) -> &mut Self {
        self.permit(parent.into(), child.into(), ChildRule::Repeated)
    }

    /// Permit at most one `child` directly inside `parent`.
    pub fn allow_single(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> &mut Self {
        self.permit(parent.into(), child.into(), ChildRule::Single)
    }

    fn permit(&mut self, parent: String, child: String, rule: ChildRule) -> &mut Self {
        self.permissions.push((parent, child, rule));
        self
    }

    /// Permit `child` inside each of `parents`.
    pub fn allow_in(&mut self, parents: &[&str], child: &str) -> &mut Self {
        for parent in parents {
            self.allow(*parent, child);
        }
        self
    }

    /// Let `node_type` accept every child `model` accepts in the final schema,
    /// including children other plugins add to `model`.
    pub fn accept_like(
        &mut self,
        node_type: impl Into<String>,
        model: impl Into<String>,
    ) -> &mut Self {
        self.mirrors.push((node_type.into(), model.into()));
        self
    }
}

/// Fold every registered plugin's fragment into a copy of `base`.
///
/// Definitions from all plugins are applied before any permission, so the
/// result does not depend on registration order. Re-declaring an identical
/// rule is accepted.
///
/// # Errors
///
/// Returns [`LoadError::SchemaConflict`] when a type is defined twice with
/// different object kinds, a `(parent, child)` permission is declared with
/// two different [`ChildRule`]s, or a permission breaks the object nesting
/// rules, and [`LoadError::UnknownParent`] / [`LoadError::UnknownChild`] when a
/// permission names an undefined type.
pub fn compose(base: &Schema, registry: &Registry) -> Result<Schema, LoadError> {
    let mut schema = base.clone();

    let fragments: Vec<SchemaFragment> = registry
        .plugins()
        .map(|plugin| {
            let mut fragment = SchemaFragment::new(plugin.name());
            for binding in plugin.tags() {
                fragment.define(binding.node_type.clone(), binding.object);
            }
            plugin.augment_schema(&mut fragment);
            fragment
        })
        .collect();

    for fragment in &fragments {
        for (node_type, object) in &fragment.definitions {
            match schema.nodes.get(node_type) {
                Some(existing) if existing.object != *object => {
                    return Err(LoadError::SchemaConflict {
                        subject: node_type.clone(),
                        first: existing.owner.clone(),
                        second: fragment.plugin.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    schema.nodes.insert(
                        node_type.clone(),
                        NodeRule {
                            object: *object,
                            owner: fragment.plugin.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut owners: HashMap<(String, String), String> = HashMap::new();
    for fragment in &fragments {
        for (parent, child, rule) in &fragment.permissions {
            let parent_rule = schema.nodes.get(parent).ok_or_else(|| LoadError::UnknownParent {
                parent: parent.clone(),
                plugin: fragment.plugin.clone(),
            })?;
            let child_rule = schema.nodes.get(child).ok_or_else(|| LoadError::UnknownChild {
                child: child.clone(),
                plugin: fragment.plugin.clone(),
            })?;
            if !may_nest(parent_rule.object, child_rule.object) {
                return Err(LoadError::SchemaConflict {
                    subject: format!("{parent} > {child}"),
                    first: parent_rule.owner.clone(),
                    second: fragment.plugin.clone(),
                });
            }
            let key = (parent.clone(), child.clone());
            match schema.child_rule(parent, child) {
                Some(existing) if existing != *rule => {
                    return Err(LoadError::SchemaConflict {
                        subject: format!("{parent} > {child}"),
                        first: owner_of(&owners, &key),
                        second: fragment.plugin.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    schema
                        .children
                        .entry(parent.clone())
                        .or_default()
                        .insert(child.clone(), *rule);
                    owners.insert(key, fragment.plugin.clone());
                }
            }
        }
        for (node_type, model) in &fragment.mirrors {
            for name in [node_type, model] {
                if !schema.nodes.contains_key(name) {
                    return Err(LoadError::UnknownParent {
                        parent: name.clone(),
                        plugin: fragment.plugin.clone(),
                    });
                }
            }
        }
    }

    apply_mirrors(&mut schema, &fragments, &mut owners)?;

    tracing::debug!(
        plugins = fragments.len(),
        node_types = schema.nodes.len(),
        "Composed schema"
    );
    Ok(schema)
}

/// Plugin that first declared a permission; base permissions have none.
fn owner_of(owners: &HashMap<(String, String), String>, key: &(String, String)) -> String {
    owners
        .get(key)
        .cloned()
        .unwrap_or_else(|| BASE_OWNER.to_owned())
}

/// Copy permissions along `accept_like` declarations until nothing changes.
fn apply_mirrors(
    schema: &mut Schema,
    fragments: &[SchemaFragment],
    owners: &mut HashMap<(String, String), String>,
) -> Result<(), LoadError> {
    let mirrors: Vec<(&str, &String, &String)> = fragments
        .iter()
        .flat_map(|f| f.mirrors.iter().map(|(t, m)| (f.plugin.as_str(), t, m)))
        .collect();
    loop {
        let mut changed = false;
        for &(plugin, node_type, model) in &mirrors {
            let inherited: Vec<(String, ChildRule)> = schema
                .children
                .get(model)
                .into_iter()
                .flatten()
                .map(|(child, rule)| (child.clone(), *rule))
                .collect();
            let target = schema.children.entry(node_type.clone()).or_default();
            for (child, rule) in inherited {
                let key = (node_type.clone(), child.clone());
                match target.get(&child) {
                    Some(existing) if *existing != rule => {
                        return Err(LoadError::SchemaConflict {
                            subject: format!("{node_type} > {child}"),
                            first: owner_of(owners, &key),
                            second: plugin.to_owned(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        target.insert(child, rule);
                        owners.insert(key, plugin.to_owned());
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

/// Object nesting rules every schema obeys.
fn may_nest(parent: ObjectKind, child: ObjectKind) -> bool {
    match parent {
        ObjectKind::Document => child == ObjectKind::Block,
        ObjectKind::Block => child != ObjectKind::Document,
        ObjectKind::Inline => matches!(child, ObjectKind::Inline | ObjectKind::Text),
        ObjectKind::Text => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::builder::Builder;
    use crate::node::Element;
    use crate::plugin::{Handled, Plugin, TagBinding, TagEvent};
    use crate::serializer::Serializer;

    type Augment = fn(&mut SchemaFragment);

    struct Fragmentary {
        name: &'static str,
        tags: Vec<TagBinding>,
        augment: Augment,
    }

    impl Plugin for Fragmentary {
        fn name(&self) -> &str {
            self.name
        }

        fn tags(&self) -> &[TagBinding] {
            &self.tags
        }

        fn augment_schema(&self, fragment: &mut SchemaFragment) {
            (self.augment)(fragment);
        }

        fn from_markdown(
            &self,
            _builder: &mut Builder<'_>,
            _event: TagEvent<'_>,
        ) -> Result<Handled, ConvertError> {
            Ok(Handled::Complete)
        }

        fn to_markdown(
            &self,
            _element: &Element,
            _serializer: &Serializer<'_>,
        ) -> Result<String, ConvertError> {
            Ok(String::new())
        }
    }

    fn plugin(name: &'static str, tags: Vec<TagBinding>, augment: Augment) -> Arc<dyn Plugin> {
        Arc::new(Fragmentary { name, tags, augment })
    }

    fn variable() -> Arc<dyn Plugin> {
        plugin("variable", vec![TagBinding::inline("variable", "variable")], |f| {
            f.allow_in(INLINE_CONTAINERS, "variable").allow("variable", TEXT);
        })
    }

    fn section() -> Arc<dyn Plugin> {
        plugin("section", vec![TagBinding::block("section", "section")], |f| {
            f.allow_in(BLOCK_CONTAINERS, "section")
                .accept_like("section", DOCUMENT);
        })
    }

    fn note() -> Arc<dyn Plugin> {
        plugin("note", vec![TagBinding::block("note", "note")], |f| {
            f.allow(DOCUMENT, "note").allow("note", PARAGRAPH);
        })
    }

    #[test]
    fn test_base_schema_shape() {
        let schema = Schema::base();
        assert!(schema.accepts(DOCUMENT, PARAGRAPH));
        assert!(schema.accepts(PARAGRAPH, TEXT));
        assert!(schema.accepts("emphasis", "strong"));
        assert!(!schema.accepts(DOCUMENT, TEXT));
        assert!(!schema.accepts("hard_break", TEXT));
        assert_eq!(schema.object_of("heading"), Some(ObjectKind::Block));
        assert_eq!(schema.object_of("link"), Some(ObjectKind::Inline));
    }

    #[test]
    fn test_compose_adds_plugin_rules() {
        let registry = Registry::with_plugins([variable()]).unwrap();
        let schema = compose(&Schema::base(), &registry).unwrap();

        assert_eq!(schema.object_of("variable"), Some(ObjectKind::Inline));
        assert!(schema.accepts(PARAGRAPH, "variable"));
        assert!(schema.accepts("link", "variable"));
        assert_eq!(schema.rule("variable").unwrap().owner, "variable");
    }

    #[test]
    fn test_compose_leaves_base_untouched() {
        let base = Schema::base();
        let registry = Registry::with_plugins([variable()]).unwrap();
        let _ = compose(&base, &registry).unwrap();
        assert_eq!(base, Schema::base());
        assert!(base.object_of("variable").is_none());
    }

    #[test]
    fn test_compose_is_idempotent() {
        let registry = Registry::with_plugins([variable(), section()]).unwrap();
        let once = compose(&Schema::base(), &registry).unwrap();
        let twice = compose(&Schema::base(), &registry).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_compose_is_order_independent() {
        let forward = Registry::with_plugins([variable(), section(), note()]).unwrap();
        let backward = Registry::with_plugins([note(), section(), variable()]).unwrap();
        let a = compose(&Schema::base(), &forward).unwrap();
        let b = compose(&Schema::base(), &backward).unwrap();
        assert_eq!(a.children, b.children);
        assert_eq!(
            a.node_types().collect::<Vec<_>>(),
            b.node_types().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_accept_like_sees_later_permissions() {
        let registry = Registry::with_plugins([section(), note()]).unwrap();
        let schema = compose(&Schema::base(), &registry).unwrap();

        assert!(schema.accepts("section", PARAGRAPH));
        assert!(schema.accepts("section", "note"));
        assert!(schema.accepts("section", "section"));
    }

    #[test]
    fn test_identical_redefinition_is_accepted() {
        let registry = Registry::with_plugins([
            variable(),
            plugin("extra", vec![], |f| {
                f.define("variable", ObjectKind::Inline)
                    .allow(PARAGRAPH, "variable");
            }),
        ])
        .unwrap();
        assert!(compose(&Schema::base(), &registry).is_ok());
    }

    #[test]
    fn test_conflicting_definition() {
        let registry = Registry::with_plugins([
            variable(),
            plugin("blocky", vec![], |f| {
                f.define("variable", ObjectKind::Block);
            }),
        ])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert_eq!(
            err,
            LoadError::SchemaConflict {
                subject: "variable".to_owned(),
                first: "variable".to_owned(),
                second: "blocky".to_owned(),
            }
        );
    }

    #[test]
    fn test_inline_directly_under_document_conflicts() {
        let registry = Registry::with_plugins([plugin(
            "computed",
            vec![TagBinding::inline("computed", "computed")],
            |f| {
                f.allow(DOCUMENT, "computed");
            },
        )])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert!(matches!(err, LoadError::SchemaConflict { ref subject, .. } if subject == "document > computed"));
    }

    #[test]
    fn test_same_permission_with_different_rule_conflicts() {
        let registry = Registry::with_plugins([
            variable(),
            plugin("single", vec![], |f| {
                f.allow_single("variable", TEXT);
            }),
        ])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert_eq!(
            err,
            LoadError::SchemaConflict {
                subject: "variable > text".to_owned(),
                first: "variable".to_owned(),
                second: "single".to_owned(),
            }
        );
    }

    #[test]
    fn test_rule_change_on_base_permission_names_base() {
        let registry = Registry::with_plugins([plugin("strict", vec![], |f| {
            f.allow_single(PARAGRAPH, "image");
        })])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert!(matches!(err, LoadError::SchemaConflict { ref first, .. } if first == "base"));
    }

    #[test]
    fn test_mirror_conflicts_with_own_rule() {
        let registry = Registry::with_plugins([plugin(
            "sealed",
            vec![TagBinding::block("sealed", "sealed")],
            |f| {
                f.allow(DOCUMENT, "sealed")
                    .allow_single("sealed", PARAGRAPH)
                    .accept_like("sealed", DOCUMENT);
            },
        )])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert!(matches!(err, LoadError::SchemaConflict { ref subject, .. } if subject == "sealed > paragraph"));
    }

    #[test]
    fn test_validate_enforces_single_rule() {
        let registry = Registry::with_plugins([plugin(
            "seal",
            vec![TagBinding::inline("seal", "seal")],
            |f| {
                f.allow(PARAGRAPH, "seal").allow_single("seal", TEXT);
            },
        )])
        .unwrap();
        let schema = compose(&Schema::base(), &registry).unwrap();
        assert_eq!(schema.child_rule("seal", TEXT), Some(ChildRule::Single));

        let seal = |texts: Vec<Node>| {
            Node::Document(Element::new(DOCUMENT).with_child(Node::block(
                Element::new(PARAGRAPH).with_child(Node::inline(Element {
                    node_type: "seal".to_owned(),
                    data: crate::attrs::Attributes::new(),
                    nodes: texts,
                })),
            )))
        };
        assert!(schema.validate(&seal(vec![Node::text("a")])).is_ok());
        let err = schema
            .validate(&seal(vec![Node::text("a"), Node::text("b")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConvertError::SchemaViolation {
                parent: "seal".to_owned(),
                child: TEXT.to_owned(),
            }
        );
    }

    #[test]
    fn test_unknown_parent() {
        let registry = Registry::with_plugins([plugin(
            "orphan",
            vec![TagBinding::inline("orphan", "orphan")],
            |f| {
                f.allow("table_cell", "orphan");
            },
        )])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnknownParent {
                parent: "table_cell".to_owned(),
                plugin: "orphan".to_owned(),
            }
        );
    }

    #[test]
    fn test_unknown_child() {
        let registry = Registry::with_plugins([plugin("ghost", vec![], |f| {
            f.allow(PARAGRAPH, "spectre");
        })])
        .unwrap();

        let err = compose(&Schema::base(), &registry).unwrap_err();
        assert!(matches!(err, LoadError::UnknownChild { ref child, .. } if child == "spectre"));
    }

    #[test]
    fn test_validate_rejects_misplaced_node() {
        let schema = Schema::base();
        let doc = Node::Document(Element::new(DOCUMENT).with_child(Node::text("loose")));
        let err = schema.validate(&doc).unwrap_err();
        assert_eq!(
            err,
            ConvertError::SchemaViolation {
                parent: DOCUMENT.to_owned(),
                child: TEXT.to_owned(),
            }
        );
    }

    #[test]
    fn test_validate_rejects_wrong_object_kind() {
        let schema = Schema::base();
        let doc = Node::Document(
            Element::new(DOCUMENT).with_child(Node::inline(Element::new(PARAGRAPH))),
        );
        assert!(matches!(
            schema.validate(&doc),
            Err(ConvertError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_well_formed_tree() {
        let schema = Schema::base();
        let doc = Node::Document(
            Element::new(DOCUMENT).with_child(Node::block(
                Element::new(PARAGRAPH)
                    .with_child(Node::text("a "))
                    .with_child(Node::inline(
                        Element::new("strong").with_child(Node::text("b")),
                    )),
            )),
        );
        assert!(schema.validate(&doc).is_ok());
    }
}
