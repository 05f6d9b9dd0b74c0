//! Placeholder substitution in clause templates.

use std::sync::LazyLock;

use cm_document::{Attributes, escape_inline, escape_text, is_internal_key};
use cm_plugins::VARIABLE;
use regex::{Captures, Regex};

/// `{{name}}` with optional inner whitespace.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}").expect("valid regex")
});

/// Clause attributes that identify the clause rather than bind a value.
const REFERENCE_KEYS: &[&str] = &["src", "clauseid"];

/// What to do with a placeholder the clause does not bind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnboundPolicy {
    /// Replace with an unresolved `<variable id="name"/>`.
    #[default]
    Variable,
    /// Leave `{{name}}` in the text.
    Keep,
    /// Drop the placeholder.
    Remove,
}

impl UnboundPolicy {
    /// Policy name as written in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Keep => "keep",
            Self::Remove => "remove",
        }
    }
}

/// Where a placeholder sits in the template's markdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    /// First content on its line, after any block quote markers.
    LineStart,
    /// Inside running text.
    Inline,
    /// Inside a code span or a fenced code block; written verbatim.
    Code,
}

impl Context {
    /// Context of the byte offset `at` in `template`.
    ///
    /// Fences whose info string starts with `<` hold nested markdown (custom
    /// blocks), others hold code. Code spans are tracked within the line.
    fn at(template: &str, at: usize) -> Self {
        let before = &template[..at];
        let (lines, current) = match before.rfind('\n') {
            Some(end) => (&before[..end], &before[end + 1..]),
            None => ("", before),
        };

        let mut fences: Vec<(char, usize, bool)> = Vec::new();
        for line in lines.lines() {
            let Some((marker, len, info)) = fence_line(line) else {
                continue;
            };
            match fences.last() {
                Some(&(open, open_len, _))
                    if open == marker && len >= open_len && info.is_empty() =>
                {
                    fences.pop();
                }
                Some(&(_, _, true)) => {}
                _ => fences.push((marker, len, !info.starts_with('<'))),
            }
        }
        if fences.last().is_some_and(|&(_, _, code)| code) || in_code_span(current) {
            return Self::Code;
        }

        if current
            .trim_start_matches(|c: char| c == '>' || c == ' ' || c == '\t')
            .is_empty()
        {
            Self::LineStart
        } else {
            Self::Inline
        }
    }
}

/// Marker, length and trimmed info string of a fence line.
fn fence_line(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let rest = trimmed.trim_start_matches(marker);
    let len = trimmed.len() - rest.len();
    (len >= 3).then_some((marker, len, rest.trim()))
}

/// Whether `prefix` ends inside an open code span.
fn in_code_span(prefix: &str) -> bool {
    let mut open: Option<usize> = None;
    let mut chars = prefix.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if open.is_none() => {
                chars.next();
            }
            '`' => {
                let mut run = 1;
                while chars.next_if_eq(&'`').is_some() {
                    run += 1;
                }
                open = match open {
                    Some(len) if len == run => None,
                    None => Some(run),
                    other => other,
                };
            }
            _ => {}
        }
    }
    open.is_some()
}

/// Values a clause binds: its public attributes except `src` and `clauseid`.
#[must_use]
pub fn bindings(data: &Attributes) -> Attributes {
    data.iter()
        .filter(|(key, _)| !is_internal_key(key) && !REFERENCE_KEYS.contains(key))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Placeholder names in order of first appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Substitute bound placeholders with their literal value.
///
/// Values are escaped for the position they land in: line-start rules apply
/// only to placeholders that begin a line, and code spans and code fences
/// receive the value verbatim. Unbound placeholders inside code are kept.
///
/// # Example
///
/// ```
/// use cm_clause::{UnboundPolicy, rewrite};
/// use cm_document::Attributes;
///
/// let bindings = Attributes::new().with("amount", "100000");
/// assert_eq!(
///     rewrite("Pay the sum of {{amount}} dollars.", &bindings, UnboundPolicy::Keep),
///     "Pay the sum of 100000 dollars."
/// );
/// ```
#[must_use]
pub fn rewrite(template: &str, bindings: &Attributes, policy: UnboundPolicy) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let context = caps
                .get(0)
                .map_or(Context::Inline, |m| Context::at(template, m.start()));
            match (bindings.get(name), policy, context) {
                (Some(value), _, Context::Code) => value.to_owned(),
                (Some(value), _, Context::LineStart) => escape_text(value),
                (Some(value), _, Context::Inline) => escape_inline(value),
                (None, UnboundPolicy::Keep, _) | (None, UnboundPolicy::Variable, Context::Code) => {
                    caps[0].to_owned()
                }
                (None, UnboundPolicy::Variable, _) => format!("<{VARIABLE} id=\"{name}\"/>"),
                (None, UnboundPolicy::Remove, _) => String::new(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn amount() -> Attributes {
        Attributes::new().with("amount", "100000")
    }

    #[test]
    fn test_bound_placeholder() {
        assert_eq!(
            rewrite("Pay {{ amount }} now.", &amount(), UnboundPolicy::Variable),
            "Pay 100000 now."
        );
    }

    #[test]
    fn test_value_is_escaped() {
        let bindings = Attributes::new().with("party", "*ACME* [Ltd]");
        assert_eq!(
            rewrite("Seller: {{party}}", &bindings, UnboundPolicy::Keep),
            r"Seller: \*ACME\* \[Ltd\]"
        );
    }

    #[test]
    fn test_value_escaping_follows_position() {
        let bindings = Attributes::new().with("delta", "-5").with("mark", "# 1");
        assert_eq!(
            rewrite("Change of {{delta}} points.", &bindings, UnboundPolicy::Keep),
            "Change of -5 points."
        );
        assert_eq!(
            rewrite("{{delta}} points.\n> {{mark}}", &bindings, UnboundPolicy::Keep),
            "\\-5 points.\n> \\# 1"
        );
    }

    #[test]
    fn test_code_receives_value_verbatim() {
        let bindings = Attributes::new().with("expr", "a*b_c");
        let template = "Run `calc {{expr}}` then {{expr}}.\n\n```\n{{expr}} {{rate}}\n```\n";
        assert_eq!(
            rewrite(template, &bindings, UnboundPolicy::Variable),
            "Run `calc a*b_c` then a\\*b\\_c.\n\n```\na*b_c {{rate}}\n```\n"
        );
    }

    #[test]
    fn test_nested_clause_fence_body_is_markdown() {
        let bindings = Attributes::new().with("party", "*ACME*");
        let template = "```<clause src=\"inner\">\nSeller: {{party}}\n```\n";
        assert_eq!(
            rewrite(template, &bindings, UnboundPolicy::Keep),
            "```<clause src=\"inner\">\nSeller: \\*ACME\\*\n```\n"
        );
    }

    #[test]
    fn test_in_code_span() {
        assert!(in_code_span("run `x "));
        assert!(!in_code_span("run `x` "));
        assert!(in_code_span("``a ` b "));
        assert!(!in_code_span("\\`not code "));
    }

    #[test]
    fn test_unbound_policies() {
        let template = "Rate {{rate}} and {{amount}}.";
        assert_eq!(
            rewrite(template, &amount(), UnboundPolicy::Variable),
            "Rate <variable id=\"rate\"/> and 100000."
        );
        assert_eq!(
            rewrite(template, &amount(), UnboundPolicy::Keep),
            "Rate {{rate}} and 100000."
        );
        assert_eq!(
            rewrite(template, &amount(), UnboundPolicy::Remove),
            "Rate  and 100000."
        );
    }

    #[test]
    fn test_not_a_placeholder() {
        let template = "{{ 1x }} {{}} { {a} }";
        assert_eq!(rewrite(template, &amount(), UnboundPolicy::Remove), template);
    }

    #[test]
    fn test_bindings_skip_reference_and_internal_keys() {
        let data = Attributes::new()
            .with("src", "T")
            .with("clauseid", "1")
            .with("cm:status", "resolved")
            .with("amount", "5");
        let bound = bindings(&data);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound.get("amount"), Some("5"));
    }

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(
            placeholders("{{b}} {{a}} {{ b }}"),
            vec!["b".to_owned(), "a".to_owned()]
        );
    }
}
