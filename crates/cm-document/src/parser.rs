//! Markdown tokenizer producing the engine's event stream.
//!
//! Wraps `pulldown-cmark` and recognizes two extension syntaxes:
//!
//! - fenced blocks whose info string is a registered block tag,
//!   `` ``` <clause src="..."> ``, become [`MarkdownEvent::CustomBlock`]
//! - HTML-looking pseudo-tags with a registered inline tag name,
//!   `<variable id="x"/>`, become inline tag events
//!
//! Anything else that looks like HTML is passed through verbatim.

use std::collections::VecDeque;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::attrs::{Attributes, is_valid_name};
use crate::error::ConvertError;
use crate::node::{ObjectKind, PARAGRAPH};
use crate::registry::Registry;

/// Stands in for a pseudo-tag while an HTML block is re-read as markdown.
const TAG_MARK: char = '\u{E000}';

/// One token of parsed markdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkdownEvent {
    /// Start of a block (`paragraph`, `heading`, `list`, ...).
    OpenBlock {
        /// Block kind.
        kind: String,
        /// Kind-specific attributes (`level`, `language`, `ordered`, ...).
        attrs: Attributes,
    },
    /// End of a block.
    CloseBlock {
        /// Block kind.
        kind: String,
    },
    /// A fenced custom block with its raw body.
    CustomBlock {
        /// Registered block tag.
        tag: String,
        /// Attributes from the info string.
        attrs: Attributes,
        /// Verbatim fence content.
        body: String,
    },
    /// Start of an inline element or pseudo-tag.
    OpenInlineTag {
        /// Inline tag name.
        tag: String,
        /// Attributes.
        attrs: Attributes,
        /// Written as `<tag .../>`; a matching close event follows directly.
        self_closing: bool,
    },
    /// End of an inline element or pseudo-tag.
    CloseInlineTag {
        /// Inline tag name.
        tag: String,
    },
    /// Literal text.
    Text(String),
}

/// Markdown tokenizer bound to a registry.
#[derive(Debug)]
pub struct MarkdownParser<'r> {
    registry: &'r Registry,
}

impl<'r> MarkdownParser<'r> {
    /// Create a parser that recognizes the registry's tags.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Tokenize markdown into events.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Malformed`] when a registered tag carries an
    /// invalid attribute list.
    pub fn parse(&self, input: &str) -> Result<Vec<MarkdownEvent>, ConvertError> {
        Collector::new(self.registry).run(input)
    }
}

/// Fenced custom block being collected.
struct PendingFence {
    tag: String,
    attrs: Attributes,
    body: String,
}

struct Collector<'r> {
    registry: &'r Registry,
    events: Vec<MarkdownEvent>,
    fence: Option<PendingFence>,
    html_block: Option<String>,
    /// Inside a base code block.
    code_block: bool,
    /// Pseudo-tags replaced by [`TAG_MARK`], in input order.
    marks: VecDeque<String>,
}

impl<'r> Collector<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            events: Vec::new(),
            fence: None,
            html_block: None,
            code_block: false,
            marks: VecDeque::new(),
        }
    }

    fn run(mut self, input: &str) -> Result<Vec<MarkdownEvent>, ConvertError> {
        for event in Parser::new_ext(input, Options::ENABLE_STRIKETHROUGH) {
            self.event(event)?;
        }
        Ok(self.events)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ConvertError> {
        match event {
            Event::Start(tag) => self.start(tag)?,
            Event::End(tag) => self.end(tag)?,
            Event::Text(text) => {
                if self.fence.is_some() || self.code_block {
                    let text = self.unmask(&text);
                    if let Some(fence) = &mut self.fence {
                        fence.body.push_str(&text);
                    } else {
                        self.text(&text);
                    }
                } else {
                    self.marked_text(&text)?;
                }
            }
            Event::Code(code) => {
                let code = self.unmask(&code);
                self.open_inline("code", Attributes::new());
                self.text(&code);
                self.close_inline("code");
            }
            Event::Html(html) => match &mut self.html_block {
                Some(raw) => raw.push_str(&html),
                None => self.inline_html(&html)?,
            },
            Event::InlineHtml(html) => self.inline_html(&html)?,
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => {
                self.events.push(MarkdownEvent::OpenInlineTag {
                    tag: "hard_break".to_owned(),
                    attrs: Attributes::new(),
                    self_closing: true,
                });
                self.close_inline("hard_break");
            }
            Event::Rule => {
                self.open_block("thematic_break", Attributes::new());
                self.close_block("thematic_break");
            }
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " });
            }
            Event::FootnoteReference(label) => self.text(&format!("[^{label}]")),
            Event::InlineMath(math) => self.text(&format!("${math}$")),
            Event::DisplayMath(math) => self.text(&format!("$${math}$$")),
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<(), ConvertError> {
        match tag {
            Tag::Paragraph => self.open_block(PARAGRAPH, Attributes::new()),
            Tag::Heading { level, .. } => self.open_block(
                "heading",
                Attributes::new().with("level", heading_level(level).to_string()),
            ),
            Tag::BlockQuote(_) => self.open_block("block_quote", Attributes::new()),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                if let Some((tag, attrs)) = self.custom_fence(&info)? {
                    self.fence = Some(PendingFence {
                        tag,
                        attrs,
                        body: String::new(),
                    });
                } else {
                    let mut attrs = Attributes::new();
                    let info = info.trim();
                    if !info.is_empty() {
                        attrs.insert("language", info);
                    }
                    self.open_block("code_block", attrs);
                    self.code_block = true;
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => {
                self.open_block("code_block", Attributes::new());
                self.code_block = true;
            }
            Tag::HtmlBlock => self.html_block = Some(String::new()),
            Tag::List(start) => {
                let mut attrs = Attributes::new().with("ordered", start.is_some().to_string());
                if let Some(n) = start.filter(|&n| n != 1) {
                    attrs.insert("start", n.to_string());
                }
                self.open_block("list", attrs);
            }
            Tag::Item => self.open_block("list_item", Attributes::new()),
            Tag::Emphasis => self.open_inline("emphasis", Attributes::new()),
            Tag::Strong => self.open_inline("strong", Attributes::new()),
            Tag::Strikethrough => self.open_inline("strikethrough", Attributes::new()),
            Tag::Link {
                dest_url, title, ..
            } => self.open_inline("link", link_attrs("href", &dest_url, &title)),
            Tag::Image {
                dest_url, title, ..
            } => self.open_inline("image", link_attrs("src", &dest_url, &title)),
            other => {
                return Err(ConvertError::malformed(format!(
                    "unsupported markdown construct: {other:?}"
                )));
            }
        }
        Ok(())
    }

    fn end(&mut self, tag: TagEnd) -> Result<(), ConvertError> {
        match tag {
            TagEnd::Paragraph => self.close_block(PARAGRAPH),
            TagEnd::Heading(_) => self.close_block("heading"),
            TagEnd::BlockQuote(_) => self.close_block("block_quote"),
            TagEnd::CodeBlock => {
                if let Some(fence) = self.fence.take() {
                    self.events.push(MarkdownEvent::CustomBlock {
                        tag: fence.tag,
                        attrs: fence.attrs,
                        body: fence.body,
                    });
                } else {
                    self.code_block = false;
                    self.close_block("code_block");
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(raw) = self.html_block.take() {
                    self.flush_html_block(&raw)?;
                }
            }
            TagEnd::List(_) => self.close_block("list"),
            TagEnd::Item => self.close_block("list_item"),
            TagEnd::Emphasis => self.close_inline("emphasis"),
            TagEnd::Strong => self.close_inline("strong"),
            TagEnd::Strikethrough => self.close_inline("strikethrough"),
            TagEnd::Link => self.close_inline("link"),
            TagEnd::Image => self.close_inline("image"),
            other => {
                return Err(ConvertError::malformed(format!(
                    "unsupported markdown construct: {other:?}"
                )));
            }
        }
        Ok(())
    }

    /// Recognize `<tag attrs>` info strings naming a registered block tag.
    fn custom_fence(&self, info: &str) -> Result<Option<(String, Attributes)>, ConvertError> {
        let Some(PseudoTag::Open { name, attrs, .. }) = PseudoTag::parse(info.trim()) else {
            return Ok(None);
        };
        if !self.is_registered(name, ObjectKind::Block) {
            return Ok(None);
        }
        let attrs = Attributes::parse(attrs)?;
        Ok(Some((name.to_owned(), attrs)))
    }

    fn is_registered(&self, tag: &str, object: ObjectKind) -> bool {
        self.registry
            .binding_for_tag(tag)
            .is_some_and(|binding| binding.object == object)
    }

    /// Emit events for a single inline HTML fragment.
    fn inline_html(&mut self, html: &str) -> Result<(), ConvertError> {
        if !self.pseudo_tag(html)? {
            self.text(html);
        }
        Ok(())
    }

    /// Emit events for `html` if it is a registered inline pseudo-tag.
    fn pseudo_tag(&mut self, html: &str) -> Result<bool, ConvertError> {
        match PseudoTag::parse(html.trim()) {
            Some(PseudoTag::Open {
                name,
                attrs,
                self_closing,
            }) if self.is_registered(name, ObjectKind::Inline) => {
                self.events.push(MarkdownEvent::OpenInlineTag {
                    tag: name.to_owned(),
                    attrs: Attributes::parse(attrs)?,
                    self_closing,
                });
                if self_closing {
                    self.close_inline(name);
                }
                Ok(true)
            }
            Some(PseudoTag::Close { name }) if self.is_registered(name, ObjectKind::Inline) => {
                self.close_inline(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Emit text, expanding [`TAG_MARK`]s back into pseudo-tag events.
    fn marked_text(&mut self, text: &str) -> Result<(), ConvertError> {
        if self.marks.is_empty() {
            self.text(text);
            return Ok(());
        }
        let mut pieces = text.split(TAG_MARK);
        if let Some(first) = pieces.next() {
            self.text(first);
        }
        for piece in pieces {
            if let Some(tag) = self.marks.pop_front() {
                self.inline_html(&tag)?;
            }
            self.text(piece);
        }
        Ok(())
    }

    /// Restore masked pseudo-tags as literal text (code spans, raw HTML).
    fn unmask(&mut self, text: &str) -> String {
        if self.marks.is_empty() || !text.contains(TAG_MARK) {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if c == TAG_MARK {
                out.push_str(&self.marks.pop_front().unwrap_or_default());
            } else {
                out.push(c);
            }
        }
        out
    }

    fn is_pseudo_tag(&self, tag: &str) -> bool {
        match PseudoTag::parse(tag) {
            Some(PseudoTag::Open { name, .. } | PseudoTag::Close { name }) => {
                self.is_registered(name, ObjectKind::Inline)
            }
            None => false,
        }
    }

    /// An HTML block started by a registered pseudo-tag is re-read as
    /// markdown with its pseudo-tags masked; any other HTML block is kept
    /// verbatim as an `html_block`.
    fn flush_html_block(&mut self, raw: &str) -> Result<(), ConvertError> {
        let raw = raw.trim_end_matches('\n');
        let mut masked = String::with_capacity(raw.len());
        let mut marks = VecDeque::new();
        for segment in split_tags(raw) {
            match segment {
                Segment::Tag(tag) if self.is_pseudo_tag(tag) => {
                    masked.push(TAG_MARK);
                    marks.push_back(tag.to_owned());
                }
                Segment::Tag(text) | Segment::Text(text) => masked.push_str(text),
            }
        }

        if marks.is_empty() {
            let raw = self.unmask(raw);
            self.open_block("html_block", Attributes::new());
            self.text(&raw);
            self.close_block("html_block");
            return Ok(());
        }
        if raw.contains(TAG_MARK) {
            return Err(ConvertError::malformed(
                "U+E000 is reserved in lines starting with a pseudo-tag",
            ));
        }

        let mut inner = Collector::new(self.registry);
        inner.marks = marks;
        let events = inner.run(&masked)?;
        self.events.extend(events);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(MarkdownEvent::Text(last)) = self.events.last_mut() {
            last.push_str(text);
        } else {
            self.events.push(MarkdownEvent::Text(text.to_owned()));
        }
    }

    fn open_block(&mut self, kind: &str, attrs: Attributes) {
        self.events.push(MarkdownEvent::OpenBlock {
            kind: kind.to_owned(),
            attrs,
        });
    }

    fn close_block(&mut self, kind: &str) {
        self.events.push(MarkdownEvent::CloseBlock {
            kind: kind.to_owned(),
        });
    }

    fn open_inline(&mut self, tag: &str, attrs: Attributes) {
        self.events.push(MarkdownEvent::OpenInlineTag {
            tag: tag.to_owned(),
            attrs,
            self_closing: false,
        });
    }

    fn close_inline(&mut self, tag: &str) {
        self.events.push(MarkdownEvent::CloseInlineTag {
            tag: tag.to_owned(),
        });
    }
}

/// A single HTML-like tag.
#[derive(Debug, PartialEq, Eq)]
enum PseudoTag<'a> {
    Open {
        name: &'a str,
        attrs: &'a str,
        self_closing: bool,
    },
    Close {
        name: &'a str,
    },
}

impl<'a> PseudoTag<'a> {
    /// Parse `<name attrs>`, `<name attrs/>` or `</name>`.
    fn parse(input: &'a str) -> Option<Self> {
        let inner = input.strip_prefix('<')?.strip_suffix('>')?;

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim_end();
            return is_valid_name(name).then_some(Self::Close { name });
        }

        let (inner, self_closing) = match inner.strip_suffix('/') {
            Some(stripped) => (stripped, true),
            None => (inner, false),
        };
        let name_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
        let name = &inner[..name_end];
        is_valid_name(name).then_some(Self::Open {
            name,
            attrs: inner[name_end..].trim(),
            self_closing,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Tag(&'a str),
}

/// Split raw HTML into `<...>` tags and the text between them.
fn split_tags(raw: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        segments.push(Segment::Tag(&rest[open..=open + close]));
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    segments
}

fn link_attrs(target_key: &str, dest: &str, title: &str) -> Attributes {
    let mut attrs = Attributes::new().with(target_key, dest);
    if !title.is_empty() {
        attrs.insert("title", title);
    }
    attrs
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
