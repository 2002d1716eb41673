//! Component F — Content-ID / URL resolver.
//!
//! Tracks the absolute URI each completed request in scope registered under
//! its `Content-ID`, and rewrites `$id/segment` references in later
//! requests. Publication is deliberately one `advance()` behind the request
//! that declared the id — see [`ContentIdResolver::publish`] — so a request
//! can never reference itself.

use crate::error::Error;

/// Insertion-ordered map from `Content-ID` to the absolute URI it resolved
/// to, scoped to whatever the caller considers "current" (a MIME changeset,
/// or the whole batch for JSON).
#[derive(Debug, Default)]
pub(crate) struct ContentIdResolver {
    entries: Vec<(String, String)>,
}

impl ContentIdResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `id -> uri`. Publication happens strictly between
    /// `advance()` calls (see [`crate::reader`]), never while the owning
    /// request is still the "current" one.
    pub(crate) fn register(&mut self, id: impl Into<String>, uri: impl Into<String>) {
        self.entries.push((id.into(), uri.into()));
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == id)
    }

    fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, v)| v.as_str())
    }

    /// Clears the map (MIME: at `ChangesetEnd`; never called for JSON,
    /// whose resolver scope is the whole batch).
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }

    /// Resolves `$id` / `$id/segment...` references in `uri`. Unknown ids
    /// fail with `UnresolvedContentId` only when `enforce` is set (i.e.
    /// inside a changeset); outside a changeset, an unresolved `$id` passes
    /// through untouched so the caller can resolve it later.
    pub(crate) fn resolve(&self, uri: &str, enforce: bool) -> Result<String, Error> {
        let Some(rest) = uri.strip_prefix('$') else {
            return Ok(uri.to_string());
        };

        let (id, remainder) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        if id.is_empty() || !id.chars().all(is_content_id_char) {
            return Ok(uri.to_string());
        }

        match self.get(id) {
            Some(resolved) => Ok(format!("{resolved}{remainder}")),
            None if enforce => Err(Error::UnresolvedContentId(id.to_string())),
            None => Ok(uri.to_string()),
        }
    }
}

fn is_content_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_id_with_segment() {
        let mut r = ContentIdResolver::new();
        r.register("1", "/Customers(1)");
        assert_eq!(
            r.resolve("$1/Orders", true).unwrap(),
            "/Customers(1)/Orders"
        );
    }

    #[test]
    fn unresolved_id_fails_when_enforced() {
        let r = ContentIdResolver::new();
        assert!(r.resolve("$99/Orders", true).is_err());
    }

    #[test]
    fn unresolved_id_passes_through_when_not_enforced() {
        let r = ContentIdResolver::new();
        assert_eq!(r.resolve("$99/Orders", false).unwrap(), "$99/Orders");
    }

    #[test]
    fn non_id_dollar_segment_passes_through_unenforced() {
        let r = ContentIdResolver::new();
        assert_eq!(r.resolve("$metadata", false).unwrap(), "$metadata");
    }

    #[test]
    fn reset_clears_scope() {
        let mut r = ContentIdResolver::new();
        r.register("1", "/Customers(1)");
        r.reset();
        assert!(!r.contains("1"));
    }
}
