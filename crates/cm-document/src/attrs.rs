//! Element attributes and the attribute value codec.
//!
//! Parses the `key="value"` syntax used by fenced custom blocks and inline
//! pseudo-tags, and renders it back.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::error::ConvertError;

/// Characters escaped in attribute values.
///
/// Mirrors the set left alone by JavaScript's `encodeURI`: URL punctuation such
/// as `:`, `/`, `?` and `&` stays readable, while quotes, angle brackets,
/// whitespace and `%` itself are encoded.
const ATTR_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Percent-encode an attribute value.
///
/// # Example
///
/// ```
/// use cm_document::{decode_value, encode_value};
///
/// let encoded = encode_value("100,000 \"USD\"");
/// assert_eq!(encoded, "100,000%20%22USD%22");
/// assert_eq!(decode_value(&encoded).unwrap(), "100,000 \"USD\"");
/// ```
#[must_use]
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, ATTR_ENCODE_SET).to_string()
}

/// Decode a percent-encoded attribute value.
///
/// # Errors
///
/// Returns [`ConvertError::Malformed`] if the decoded bytes are not UTF-8.
pub fn decode_value(value: &str) -> Result<String, ConvertError> {
    percent_decode_str(value)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConvertError::malformed(format!("invalid attribute encoding `{value}`: {e}")))
}

/// Attribute map carried by elements and tag events.
///
/// Keys are kept sorted so that serialization is deterministic. Keys that
/// contain `:` are reserved for engine bookkeeping (see [`is_internal_key`])
/// and are never written to markdown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Create an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key="value" key='value' key=value` list, percent-decoding values.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Malformed`] on an unterminated quote, a key
    /// without `=`, an invalid key, or an invalid value encoding.
    ///
    /// # Example
    ///
    /// ```
    /// use cm_document::Attributes;
    ///
    /// let attrs = Attributes::parse(r#"src="ap://loan@1.0" clauseid=123"#).unwrap();
    /// assert_eq!(attrs.get("src"), Some("ap://loan@1.0"));
    /// assert_eq!(attrs.get("clauseid"), Some("123"));
    /// ```
    pub fn parse(input: &str) -> Result<Self, ConvertError> {
        let mut attrs = Self::new();
        let mut remaining = input.trim();

        while !remaining.is_empty() {
            let (key, value, rest) = parse_key_value(remaining)?;
            attrs.insert(key, decode_value(value)?);
            remaining = rest.trim_start();
        }

        Ok(attrs)
    }

    /// Get an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over entries that are written to markdown.
    pub fn public(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !is_internal_key(k))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render public attributes as ` key="value"` pairs in the given key order,
    /// followed by any remaining public keys in sorted order.
    ///
    /// Values are percent-encoded. The result starts with a space unless empty.
    ///
    /// # Example
    ///
    /// ```
    /// use cm_document::Attributes;
    ///
    /// let attrs = Attributes::new()
    ///     .with("clauseid", "1")
    ///     .with("src", "T")
    ///     .with("cm:status", "resolved");
    /// assert_eq!(attrs.to_syntax(&["src"]), r#" src="T" clauseid="1""#);
    /// ```
    #[must_use]
    pub fn to_syntax(&self, leading: &[&str]) -> String {
        let mut out = String::new();
        for key in leading {
            if let Some(value) = self.get(key) {
                push_pair(&mut out, key, value);
            }
        }
        for (key, value) in self.public() {
            if !leading.contains(&key) {
                push_pair(&mut out, key, value);
            }
        }
        out
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether a key is reserved for engine bookkeeping.
#[must_use]
pub fn is_internal_key(key: &str) -> bool {
    key.contains(':')
}

/// Whether a name is valid for tags and attribute keys.
///
/// Valid names contain only alphanumeric characters, hyphens, and underscores.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn push_pair(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&encode_value(value));
    out.push('"');
}

/// Parse one `key=value` pair, returning `(key, raw_value, rest)`.
fn parse_key_value(s: &str) -> Result<(&str, &str, &str), ConvertError> {
    let eq_pos = s
        .find('=')
        .ok_or_else(|| ConvertError::malformed(format!("expected key=\"value\", found `{s}`")))?;
    let key = s[..eq_pos].trim();

    if !is_valid_name(key) {
        return Err(ConvertError::malformed(format!(
            "invalid attribute name `{key}`"
        )));
    }

    let after_eq = s[eq_pos + 1..].trim_start();

    for quote in ['"', '\''] {
        if let Some(stripped) = after_eq.strip_prefix(quote) {
            let end_quote = stripped.find(quote).ok_or_else(|| {
                ConvertError::malformed(format!("unterminated value for attribute `{key}`"))
            })?;
            return Ok((key, &stripped[..end_quote], &stripped[end_quote + 1..]));
        }
    }

    let end = after_eq
        .find(char::is_whitespace)
        .unwrap_or(after_eq.len());
    Ok((key, &after_eq[..end], &after_eq[end..]))
}
