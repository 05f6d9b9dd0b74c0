//! Document tree to markdown.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConvertError;
use crate::node::{Element, Node};
use crate::registry::Registry;

/// An `&` that markdown would read as the start of a character reference.
static ENTITY_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("invalid entity regex")
});

/// Markdown serializer.
///
/// Dispatches plugin-owned node types to their plugin and renders the base
/// types itself. Plugins receive the serializer to render their children.
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'r> {
    registry: &'r Registry,
}

impl<'r> Serializer<'r> {
    /// Create a serializer for the registry's node types.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Serialize a document, or any single node.
    ///
    /// A document renders its blocks separated by blank lines and ends with a
    /// newline.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnknownNodeType`] for a node type no plugin or
    /// base rule handles.
    pub fn serialize(&self, node: &Node) -> Result<String, ConvertError> {
        match node {
            Node::Document(el) => {
                let body = self.blocks(&el.nodes)?;
                Ok(if body.is_empty() { body } else { body + "\n" })
            }
            _ => self.node(node),
        }
    }

    /// Serialize a sequence of blocks separated by blank lines.
    ///
    /// # Errors
    ///
    /// Propagates the first child error.
    pub fn blocks(&self, nodes: &[Node]) -> Result<String, ConvertError> {
        let rendered = nodes
            .iter()
            .map(|node| self.node(node))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join("\n\n"))
    }

    /// Serialize a sequence of inline nodes.
    ///
    /// # Errors
    ///
    /// Propagates the first child error.
    pub fn inlines(&self, nodes: &[Node]) -> Result<String, ConvertError> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.node(node)?);
        }
        Ok(out)
    }

    /// Serialize one node without document framing.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnknownNodeType`] for an unhandled node type.
    pub fn node(&self, node: &Node) -> Result<String, ConvertError> {
        let element = match node {
            Node::Text(text) => return Ok(escape_text(&text.text)),
            Node::Document(el) => return self.blocks(&el.nodes),
            Node::Block(el) | Node::Inline(el) => el,
        };

        if let Some(plugin) = self.registry.plugin_for_node_type(&element.node_type) {
            return plugin.to_markdown(element, self);
        }
        self.base(element)
    }

    fn base(&self, el: &Element) -> Result<String, ConvertError> {
        let out = match el.node_type.as_str() {
            "paragraph" => self.inlines(&el.nodes)?,
            "heading" => {
                let level = el
                    .data
                    .get("level")
                    .and_then(|l| l.parse::<usize>().ok())
                    .unwrap_or(1)
                    .clamp(1, 6);
                let mut content = self.inlines(&el.nodes)?;
                if matches!(el.nodes.last(), Some(Node::Text(_))) {
                    content = escape_closing_hashes(&content);
                }
                format!("{} {content}", "#".repeat(level))
            }
            "block_quote" => prefix_lines(&self.blocks(&el.nodes)?, "> ", ">"),
            "code_block" => fenced(el.data.get("language").unwrap_or(""), &el.text()),
            "thematic_break" => "---".to_owned(),
            "html_block" => el.text().trim_end_matches('\n').to_owned(),
            "emphasis" => format!("*{}*", self.inlines(&el.nodes)?),
            "strong" => format!("**{}**", self.inlines(&el.nodes)?),
            "strikethrough" => format!("~~{}~~", self.inlines(&el.nodes)?),
            "code" => code_span(&el.text()),
            "link" => format!(
                "[{}]({}{})",
                self.inlines(&el.nodes)?,
                destination(el.data.get("href").unwrap_or("")),
                title_suffix(el.data.get("title"))
            ),
            "image" => format!(
                "![{}]({}{})",
                escape_text(&el.text()),
                destination(el.data.get("src").unwrap_or("")),
                title_suffix(el.data.get("title"))
            ),
            "hard_break" => "\\\n".to_owned(),
            other => return Err(ConvertError::UnknownNodeType(other.to_owned())),
        };
        Ok(out)
    }
}

/// Escape markdown-significant characters in literal text.
///
/// Backslash, backtick, `*`, `_`, `[`, `]`, `<` and `~` are always escaped,
/// and an `&` that would start a character reference becomes `&amp;`. `#`,
/// `>`, `-`, `+` and ordered-list markers are escaped at the start of a line.
#[must_use]
pub fn escape_text(text: &str) -> String {
    escape(text, true)
}

/// Escape text that continues a line; line-start rules apply only after a
/// newline inside `text`.
#[must_use]
pub fn escape_inline(text: &str) -> String {
    escape(text, false)
}

fn escape(text: &str, mut line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '~' => {
                out.push('\\');
                out.push(c);
            }
            '&' if ENTITY_START.is_match(&text[i..]) => out.push_str("&amp;"),
            '#' | '>' | '-' | '+' | '=' if line_start => {
                out.push('\\');
                out.push(c);
            }
            '0'..='9' if line_start => {
                let digits_end = text[i..]
                    .find(|ch: char| !ch.is_ascii_digit())
                    .map_or(text.len(), |n| i + n);
                let marker = text[digits_end..].chars().next();
                out.push_str(&text[i..digits_end]);
                if matches!(marker, Some('.' | ')')) {
                    out.push('\\');
                }
                while chars.peek().is_some_and(|&(j, _)| j < digits_end) {
                    chars.next();
                }
                line_start = false;
                continue;
            }
            _ => out.push(c),
        }
        line_start = c == '\n';
    }

    out
}

/// Wrap `body` in a backtick fence long enough not to be closed by any
/// backtick run inside it.
#[must_use]
pub fn fenced(info: &str, body: &str) -> String {
    let fence = "`".repeat(longest_run(body, '`').max(2) + 1);
    let mut out = format!("{fence}{info}\n{body}");
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out
}

/// Prefix every line of `text`; empty lines get `empty` instead.
#[must_use]
pub fn prefix_lines(text: &str, prefix: &str, empty: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                empty.to_owned()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn code_span(code: &str) -> String {
    let ticks = "`".repeat(longest_run(code, '`') + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{ticks} {code} {ticks}")
    } else {
        format!("{ticks}{code}{ticks}")
    }
}

/// Escape a trailing `#` run that a heading would read as its closing
/// sequence.
fn escape_closing_hashes(content: &str) -> String {
    let head = content.trim_end_matches('#');
    let run = content.len() - head.len();
    if run == 0 || !(head.is_empty() || head.ends_with([' ', '\t'])) {
        return content.to_owned();
    }
    format!("{head}{}", "\\#".repeat(run))
}

/// Link or image destination, in `<...>` form when it contains whitespace,
/// parentheses or angle brackets.
fn destination(dest: &str) -> String {
    let bracketed =
        dest.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'));
    let mut out = String::with_capacity(dest.len() + 2);
    if bracketed {
        out.push('<');
    }
    for (i, c) in dest.char_indices() {
        match c {
            '\\' => out.push_str("\\\\"),
            '<' | '>' if bracketed => {
                out.push('\\');
                out.push(c);
            }
            '&' if ENTITY_START.is_match(&dest[i..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    if bracketed {
        out.push('>');
    }
    out
}

fn title_suffix(title: Option<&str>) -> String {
    let Some(title) = title.filter(|t| !t.is_empty()) else {
        return String::new();
    };
    let mut out = String::with_capacity(title.len() + 3);
    out.push_str(" \"");
    for (i, c) in title.char_indices() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '&' if ENTITY_START.is_match(&title[i..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
