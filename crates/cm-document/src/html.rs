//! HTML import.
//!
//! Reads HTML with `quick-xml` into a light element tree, then maps elements
//! onto document nodes. Plugin-registered HTML tags are handed to their
//! plugin; unknown tags are unwrapped so their content survives.

use std::io::BufRead;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use crate::attrs::Attributes;
use crate::error::ConvertError;
use crate::node::{DOCUMENT, Element, Node, ObjectKind, PARAGRAPH};
use crate::registry::Registry;
use crate::schema::Schema;

/// Void elements written without a closing slash.
static VOID_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|hr|img|wbr|input|meta|link|col|area|source)(\s[^<>]*?)?\s*/?>")
        .expect("invalid void element regex")
});

/// Named entities that are not predefined in XML.
static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z]+);").expect("invalid entity regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

/// An HTML element as read from the input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HtmlElement {
    /// Lowercased tag name.
    pub tag: String,
    /// Attributes with entities resolved.
    pub attrs: Attributes,
    /// Child content in document order.
    pub children: Vec<HtmlContent>,
}

impl HtmlElement {
    /// Concatenated text of all descendants, whitespace preserved.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                HtmlContent::Text(text) => out.push_str(text),
                HtmlContent::Element(el) => out.push_str(&el.text()),
            }
        }
        out
    }

    /// First child element with the given tag.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&HtmlElement> {
        self.children.iter().find_map(|child| match child {
            HtmlContent::Element(el) if el.tag == tag => Some(el),
            _ => None,
        })
    }
}

/// Content of an HTML element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HtmlContent {
    /// Nested element.
    Element(HtmlElement),
    /// Character data.
    Text(String),
}

/// Parse an HTML fragment into a root element tagged `root`.
///
/// # Errors
///
/// Returns [`ConvertError::Html`] if the markup cannot be read.
pub fn parse_html(html: &str) -> Result<HtmlElement, ConvertError> {
    let html = convert_named_entities(html);
    let html = VOID_ELEMENT.replace_all(&html, "<$1$2/>");
    let wrapped = format!("<root>{html}</root>");

    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(html_error)? {
            Event::Start(e) => {
                let mut root = start_element(&reader, &e);
                root.children = parse_children(&mut reader, &root.tag)?;
                return Ok(root);
            }
            Event::Eof => return Ok(HtmlElement::default()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_children<R: BufRead>(
    reader: &mut Reader<R>,
    parent_tag: &str,
) -> Result<Vec<HtmlContent>, ConvertError> {
    let mut buf = Vec::new();
    let mut children = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(html_error)? {
            Event::Start(e) => {
                let mut child = start_element(reader, &e);
                child.children = parse_children(reader, &child.tag)?;
                children.push(HtmlContent::Element(child));
            }
            Event::Empty(e) => {
                children.push(HtmlContent::Element(start_element(reader, &e)));
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e).map_err(html_error)?;
                push_text(&mut children, &text);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e).map_err(html_error)?;
                push_text(&mut children, &decode_entity(&entity));
            }
            Event::CData(e) => {
                push_text(&mut children, &String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                let end_tag = decode_name(reader, e.name().as_ref());
                if end_tag == parent_tag {
                    return Ok(children);
                }
                // Stray end tag
            }
            Event::Eof => return Ok(children),
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
}

fn start_element<R: BufRead>(reader: &Reader<R>, e: &BytesStart) -> HtmlElement {
    let mut attrs = Attributes::new();
    for attr in e.attributes().flatten() {
        let key = decode_name(reader, attr.key.as_ref());
        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).into_owned(),
            std::borrow::Cow::into_owned,
        );
        attrs.insert(key, value);
    }
    HtmlElement {
        tag: decode_name(reader, e.name().as_ref()),
        attrs,
        children: Vec::new(),
    }
}

fn decode_name<R: BufRead>(reader: &Reader<R>, name: &[u8]) -> String {
    reader
        .decoder()
        .decode(name)
        .map_or_else(
            |_| String::from_utf8_lossy(name).into_owned(),
            std::borrow::Cow::into_owned,
        )
        .to_ascii_lowercase()
}

fn push_text(children: &mut Vec<HtmlContent>, text: &str) {
    if let Some(HtmlContent::Text(last)) = children.last_mut() {
        last.push_str(text);
    } else {
        children.push(HtmlContent::Text(text.to_owned()));
    }
}

fn html_error(e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Html(e.to_string())
}

fn convert_named_entities(html: &str) -> String {
    NAMED_ENTITY
        .replace_all(html, |caps: &regex::Captures| {
            named_entity(&caps[1]).map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

/// Named entities common in contract documents. XML's own five are left for
/// the reader.
fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{00a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "hellip" => "\u{2026}",
        "sect" => "\u{00a7}",
        "para" => "\u{00b6}",
        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",
        "euro" => "\u{20ac}",
        "pound" => "\u{00a3}",
        "yen" => "\u{00a5}",
        "cent" => "\u{00a2}",
        "times" => "\u{00d7}",
        "deg" => "\u{00b0}",
        _ => return None,
    })
}

fn decode_entity(entity: &str) -> String {
    match entity {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{entity};"), |c| c.to_string())
        }
        _ => format!("&{entity};"),
    }
}

/// Maps parsed HTML onto document nodes.
pub(crate) struct HtmlImporter<'a> {
    registry: &'a Registry,
    schema: &'a Schema,
}

impl<'a> HtmlImporter<'a> {
    pub(crate) fn new(registry: &'a Registry, schema: &'a Schema) -> Self {
        Self { registry, schema }
    }

    /// Convert HTML into a validated document.
    pub(crate) fn import(&self, html: &str) -> Result<Node, ConvertError> {
        let root = parse_html(html)?;
        let nodes = self.convert_all(&root.children);
        let document = Node::Document(Element {
            node_type: DOCUMENT.to_owned(),
            data: Attributes::new(),
            nodes: self.normalize_blocks(nodes),
        });
        self.schema.validate(&document)?;
        Ok(document)
    }

    fn convert_all(&self, children: &[HtmlContent]) -> Vec<Node> {
        let mut nodes = Vec::new();
        for child in children {
            match child {
                HtmlContent::Text(text) => {
                    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
                    if !collapsed.is_empty() {
                        nodes.push(Node::text(collapsed));
                    }
                }
                HtmlContent::Element(el) => nodes.extend(self.convert_element(el)),
            }
        }
        nodes
    }

    fn convert_element(&self, el: &HtmlElement) -> Vec<Node> {
        if let Some(plugin) = self.registry.plugin_for_html_tag(&el.tag) {
            let children = self.convert_all(&el.children);
            return match plugin.from_html(el, children.clone()) {
                Some(node) => vec![node],
                None => children,
            };
        }

        let block = |node_type: &str, data: Attributes, nodes: Vec<Node>| {
            vec![Node::block(Element {
                node_type: node_type.to_owned(),
                data,
                nodes,
            })]
        };
        let inline = |node_type: &str, data: Attributes, nodes: Vec<Node>| {
            vec![Node::inline(Element {
                node_type: node_type.to_owned(),
                data,
                nodes,
            })]
        };

        match el.tag.as_str() {
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let mut children = self.convert_all(&el.children);
                if children.iter().any(|n| n.object() == ObjectKind::Block) {
                    return children;
                }
                trim_edges(&mut children);
                if el.tag == "p" {
                    block(PARAGRAPH, Attributes::new(), children)
                } else {
                    let level = el.tag[1..].to_owned();
                    block("heading", Attributes::new().with("level", level), children)
                }
            }
            "blockquote" => block("block_quote", Attributes::new(), self.convert_all(&el.children)),
            "pre" => {
                let mut data = Attributes::new();
                let language = el
                    .child("code")
                    .and_then(|code| code.attrs.get("class"))
                    .and_then(|class| {
                        class
                            .split_whitespace()
                            .find_map(|c| c.strip_prefix("language-"))
                    });
                if let Some(language) = language {
                    data.insert("language", language);
                }
                let mut text = el.text();
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                block("code_block", data, vec![Node::text(text)])
            }
            "hr" => block("thematic_break", Attributes::new(), Vec::new()),
            "em" | "i" => inline("emphasis", Attributes::new(), self.convert_all(&el.children)),
            "strong" | "b" => inline("strong", Attributes::new(), self.convert_all(&el.children)),
            "s" | "del" | "strike" => {
                inline("strikethrough", Attributes::new(), self.convert_all(&el.children))
            }
            "code" => inline("code", Attributes::new(), vec![Node::text(el.text())]),
            "a" => {
                let mut data = Attributes::new().with("href", el.attrs.get("href").unwrap_or(""));
                if let Some(title) = el.attrs.get("title") {
                    data.insert("title", title);
                }
                inline("link", data, self.convert_all(&el.children))
            }
            "img" => {
                let mut data = Attributes::new().with("src", el.attrs.get("src").unwrap_or(""));
                if let Some(title) = el.attrs.get("title") {
                    data.insert("title", title);
                }
                let alt = el
                    .attrs
                    .get("alt")
                    .filter(|alt| !alt.is_empty())
                    .map(|alt| vec![Node::text(alt)])
                    .unwrap_or_default();
                inline("image", data, alt)
            }
            "br" => inline("hard_break", Attributes::new(), Vec::new()),
            _ => self.convert_all(&el.children),
        }
    }

    /// Wrap runs of inline content in paragraphs and recurse into block
    /// containers.
    fn normalize_blocks(&self, nodes: Vec<Node>) -> Vec<Node> {
        let mut blocks = Vec::new();
        let mut run = Vec::new();

        for node in nodes {
            match node {
                Node::Inline(_) | Node::Text(_) => run.push(node),
                Node::Block(el) => {
                    flush_run(&mut run, &mut blocks);
                    blocks.push(Node::Block(self.normalize_block(el)));
                }
                Node::Document(el) => {
                    flush_run(&mut run, &mut blocks);
                    blocks.extend(self.normalize_blocks(el.nodes));
                }
            }
        }
        flush_run(&mut run, &mut blocks);

        blocks
    }

    fn normalize_block(&self, mut el: Element) -> Element {
        let children = std::mem::take(&mut el.nodes);
        el.nodes = if self.schema.accepts(&el.node_type, PARAGRAPH) {
            self.normalize_blocks(children)
        } else {
            children
                .into_iter()
                .map(|child| match child {
                    Node::Block(inner) => Node::Block(self.normalize_block(inner)),
                    other => other,
                })
                .collect()
        };
        el
    }
}

fn flush_run(run: &mut Vec<Node>, blocks: &mut Vec<Node>) {
    let mut nodes = std::mem::take(run);
    trim_edges(&mut nodes);
    if nodes.is_empty() {
        return;
    }
    blocks.push(Node::block(Element {
        node_type: PARAGRAPH.to_owned(),
        data: Attributes::new(),
        nodes,
    }));
}

/// Trim leading and trailing whitespace of an inline run, dropping text
/// nodes that become empty.
fn trim_edges(nodes: &mut Vec<Node>) {
    while let Some(Node::Text(first)) = nodes.first_mut() {
        let trimmed = first.text.trim_start();
        if trimmed.is_empty() {
            nodes.remove(0);
        } else {
            first.text = trimmed.to_owned();
            break;
        }
    }
    while let Some(Node::Text(last)) = nodes.last_mut() {
        let trimmed = last.text.trim_end();
        if trimmed.is_empty() {
            nodes.pop();
        } else {
            last.text = trimmed.to_owned();
            break;
        }
    }
}
