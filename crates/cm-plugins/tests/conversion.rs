//! End-to-end conversion with the built-in plugin set.

use std::sync::Arc;

use cm_document::{
    ChildRule, ConvertError, Converter, LoadError, Node, Plugin, Registry, Schema, compose,
    decode_value, encode_value,
};
use cm_plugins::{
    BuiltinOptions, ComputedPlugin, VariablePlugin, builtin, default_plugins, is_unresolved,
};
use pretty_assertions::assert_eq;

fn converter() -> Converter {
    Converter::new(default_plugins()).unwrap()
}

fn round_trip(markdown: &str) -> String {
    let converter = converter();
    let doc = converter.parse(markdown).unwrap();
    converter.serialize(&doc).unwrap()
}

#[test]
fn test_plain_markdown_round_trips() {
    let cases = [
        "Hello world\n",
        "# Loan Agreement\n\nThe parties agree as follows.\n",
        "## Terms\n\n### Interest\n\nRate is *fixed* and **final**.\n",
        "> Quoted clause text.\n",
        "```rust\nlet x = 1;\n```\n",
        "Before\n\n---\n\nAfter\n",
        "See [the docs](https://example.com \"Docs\") and `code`.\n",
        "~~struck~~ text\n",
        "- first\n- second\n",
        "1. one\n2. two\n",
        "Line one\\\nline two\n",
        "![seal](seal.png)\n",
        "See [terms](<a b.md>) and [annex](<annex(1).md>).\n",
        "![seal](<seal image.png> \"Seal\")\n",
        "Use &amp;copy; literally.\n",
        "# Section \\#\n",
        "## Costs \\#\\#\n",
    ];
    for case in cases {
        assert_eq!(round_trip(case), case, "round trip of {case:?}");
    }
}

#[test]
fn test_round_trip_normalizes_markdown() {
    assert_eq!(round_trip("Title\n=====\n\ntext"), "# Title\n\ntext\n");
    assert_eq!(round_trip("* a\n* b"), "- a\n- b\n");
    assert_eq!(round_trip("_em_ __strong__"), "*em* **strong**\n");
    assert_eq!(round_trip("***"), "---\n");
}

#[test]
fn test_escaped_characters_survive() {
    let text = "Use \\*literal\\* stars and \\_underscores\\_.\n";
    let converter = converter();
    let doc = converter.parse(text).unwrap();
    assert_eq!(doc.plain_text(), "Use *literal* stars and _underscores_.");
    assert_eq!(converter.serialize(&doc).unwrap(), text);
}

#[test]
fn test_mixed_special_elements_round_trip() {
    let text = "The borrower pays <variable id=\"amount\" value=\"100%20000\"/> \
                plus <computed value=\"2.5%25\"/> interest.\n\n\
                - due <variable id=\"date\"/>\n";
    assert_eq!(round_trip(text), text);
}

#[test]
fn test_unresolved_variable_in_list() {
    let doc = converter().parse("- Rate: <variable id=\"rate\"/>\n").unwrap();
    let mut found = false;
    doc.walk(&mut |node| found |= is_unresolved(node));
    assert!(found);
}

#[test]
fn test_unmatched_variable_is_malformed() {
    let err = converter()
        .parse("Pay <variable id=\"amount\">100")
        .unwrap_err();
    assert!(matches!(err, ConvertError::Malformed { .. }));
}

#[test]
fn test_unclosed_variable_on_own_line_is_malformed() {
    let err = converter().parse("<variable id=\"a\">\n100\n").unwrap_err();
    assert_eq!(err, ConvertError::malformed("unclosed `<variable>`"));
}

#[test]
fn test_paragraph_led_by_variable_keeps_markdown() {
    let converter = converter();
    let text = "<variable id=\"a\" value=\"1\"/>\nis *due* on `day`.\n";
    let doc = converter.parse(text).unwrap();

    let mut types = Vec::new();
    doc.walk(&mut |node| types.push(node.node_type().to_owned()));
    assert_eq!(
        types,
        vec![
            "document", "paragraph", "variable", "text", "text", "emphasis", "text", "text",
            "code", "text", "text",
        ]
    );
    assert_eq!(doc.plain_text(), "1\nis due on day.");

    let markdown = converter.serialize(&doc).unwrap();
    assert_eq!(markdown, text);
    assert_eq!(converter.parse(&markdown).unwrap(), doc);
}

#[test]
fn test_schema_composition_is_idempotent() {
    let registry = Registry::with_plugins(default_plugins()).unwrap();
    let first = compose(&Schema::base(), &registry).unwrap();
    let second = compose(&Schema::base(), &registry).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_variable_value_is_a_single_text() {
    let converter = converter();
    let schema = converter.schema();
    assert_eq!(schema.child_rule("variable", "text"), Some(ChildRule::Single));
    assert_eq!(schema.child_rule("computed", "text"), Some(ChildRule::Single));

    let doc = converter
        .parse("<variable id=\"a\">one\ntwo</variable> due.\n")
        .unwrap();
    let variable = &doc.children()[0].children()[0];
    assert_eq!(variable.children().len(), 1);
    assert_eq!(variable.plain_text(), "one\ntwo");
}

#[test]
fn test_converted_trees_validate() {
    let converter = converter();
    let doc = converter
        .parse("# T\n\n- a <variable id=\"x\" value=\"1\"/>\n\n> <computed value=\"2\"/>\n")
        .unwrap();
    assert!(converter.validate(&doc).is_ok());
}

#[test]
fn test_duplicate_tag_across_plugins() {
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(VariablePlugin::new()),
        Arc::new(VariablePlugin::new()),
    ];
    let err = Converter::new(plugins).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateTag { ref tag, .. } if tag == "variable"));
}

#[test]
fn test_distinct_plugins_compose() {
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(VariablePlugin::new()),
        Arc::new(ComputedPlugin::new()),
    ];
    assert!(Converter::new(plugins).is_ok());
}

#[test]
fn test_builtin_by_name() {
    let options = BuiltinOptions {
        computed_raw_value: true,
    };
    let computed = builtin("computed", &options).unwrap();
    let converter = Converter::new(vec![computed]).unwrap();
    let doc = converter.parse("<computed value=\"x\"/>").unwrap();
    assert_eq!(converter.serialize(&doc).unwrap(), "{{x}}\n");
    assert!(builtin("clause", &options).is_none());
}

#[test]
fn test_attribute_codec_round_trip() {
    for value in ["", "100 000", "50%", "a\"b", "ap://loan@1.0#sha256", "€ ½"] {
        assert_eq!(decode_value(&encode_value(value)).unwrap(), value);
    }
}

#[test]
fn test_html_import_with_plugins() {
    let converter = converter();
    let doc = converter
        .from_html(
            "<h1>Loan</h1>\n<ul><li>Amount: <variable id=\"amount\" value=\"10\"/></li></ul>",
        )
        .unwrap();
    assert_eq!(
        converter.serialize(&doc).unwrap(),
        "# Loan\n\n- Amount: <variable id=\"amount\" value=\"10\"/>\n"
    );
}

#[test]
fn test_describe_for_renderer() {
    let doc = converter()
        .parse("Pay <variable id=\"amount\" value=\"5\"/>")
        .unwrap();
    let description = doc.describe();
    let variable = &description.children[0].children[1];
    assert_eq!(variable.node_type, "variable");
    assert_eq!(variable.attrs.get("id"), Some("amount"));
    assert!(matches!(doc, Node::Document(_)));
}
