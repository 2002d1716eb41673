//! Component B — header parser.
//!
//! Parses `Name: Value` blocks terminated by a blank line into a
//! case-insensitive multi-map, and decodes the handful of headers the rest
//! of the reader cares about (`Content-Type`, `Content-Transfer-Encoding`,
//! `Content-ID`).

use std::fmt;

use crate::error::Error;

/// Headers single-valued by this parser's rules; repeating one is an error
/// rather than a silent overwrite or concatenation.
const SINGLE_VALUE_HEADERS: &[&str] = &["content-id", "content-type", "content-transfer-encoding"];

/// A case-insensitive, order-preserving multi-map of header name to values.
///
/// Duplicate occurrences of a multi-value header are comma-joined in
/// insertion order, matching ordinary HTTP header-folding semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    // (lowercased name, original-case name, value) preserving insertion order.
    entries: Vec<(String, String, String)>,
}

impl HeaderMap {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name`, case-insensitively. If the header
    /// occurred more than once (and is not single-valued), the values are
    /// already comma-joined at insertion time; this returns that joined
    /// string.
    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(key, ..)| *key == lower)
            .map(|(_, _, value)| value.as_str())
    }

    /// True if a header with this name (case-insensitive) is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates headers in the order they were parsed, with their original
    /// casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(_, name, value)| (name.as_str(), value.as_str()))
    }

    /// Inserts or folds a header value, enforcing the single-value rule.
    fn insert(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let lower = name.to_ascii_lowercase();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|(key, ..)| *key == lower)
        {
            if SINGLE_VALUE_HEADERS.contains(&lower.as_str()) {
                return Err(Error::header(format!(
                    "duplicate single-value header: {name}"
                )));
            }
            existing.2.push_str(", ");
            existing.2.push_str(value);
        } else {
            self.entries.push((lower, name.to_string(), value.to_string()));
        }
        Ok(())
    }

    /// Parses a header block (no leading request/status line) from `text`,
    /// stopping at the first blank line or the end of input. `text` must
    /// already be split into CRLF/LF-terminated lines with terminators
    /// removed, in order.
    pub(crate) fn parse<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                Error::header(format!("header line missing ':': {line:?}"))
            })?;
            headers.insert(name.trim(), value.trim())?;
        }
        Ok(headers)
    }

    /// Builds a header map from a JSON `headers` object (`name -> string`),
    /// applying the same case-insensitive folding rules as the MIME header
    /// parser.
    pub(crate) fn from_json_object(
        obj: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in obj {
            let value = value.as_str().ok_or_else(|| {
                Error::header(format!("header {name:?} value must be a string"))
            })?;
            headers.insert(name, value)?;
        }
        Ok(headers)
    }

    /// The decoded `Content-Type`, split into (essence, parameters).
    pub fn content_type(&self) -> Option<ContentType<'_>> {
        self.get("content-type").map(ContentType::parse)
    }

    /// The `Content-ID` header value, if present.
    pub fn content_id(&self) -> Option<&str> {
        self.get("content-id")
    }

    /// Validates and returns `Content-Transfer-Encoding`; absent is fine
    /// (treated as `binary`), anything other than `binary`/`8bit` is an
    /// error.
    pub fn content_transfer_encoding(&self) -> Result<Option<&str>, Error> {
        match self.get("content-transfer-encoding") {
            None => Ok(None),
            Some(value) => {
                let lower = value.to_ascii_lowercase();
                if lower == "binary" || lower == "8bit" {
                    Ok(Some(value))
                } else {
                    Err(Error::header(format!(
                        "unsupported Content-Transfer-Encoding: {value}"
                    )))
                }
            }
        }
    }
}

/// A parsed `Content-Type` header: the media-type essence plus its
/// `name=value` parameters (e.g. `boundary=`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType<'a> {
    /// The essence, lowercased (e.g. `"multipart/mixed"`, `"application/http"`).
    pub essence: String,
    raw: &'a str,
}

impl<'a> ContentType<'a> {
    fn parse(raw: &'a str) -> Self {
        let essence = raw
            .split(';')
            .next()
            .unwrap_or(raw)
            .trim()
            .to_ascii_lowercase();
        Self { essence, raw }
    }

    /// Returns the `boundary=` parameter, with surrounding quotes stripped.
    pub fn boundary(&self) -> Option<String> {
        self.parameter("boundary")
    }

    /// Returns an arbitrary parameter value by name, quotes stripped.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.raw.split(';').skip(1).find_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            if key.trim().eq_ignore_ascii_case(name) {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
    }

    /// True if the essence is `multipart/mixed`.
    pub fn is_multipart_mixed(&self) -> bool {
        self.essence == "multipart/mixed"
    }

    /// True if the essence is `application/http`.
    pub fn is_application_http(&self) -> bool {
        self.essence == "application/http"
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, name, value) in &self.entries {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}
