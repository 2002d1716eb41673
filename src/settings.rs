//! Reader configuration.

/// Configuration for a [`crate::reader::BatchReader`] /
/// [`crate::reader::AsyncBatchReader`].
///
/// This is the entire configuration surface of the crate — there is no
/// environment-variable or config-file layer; an embedding application owns
/// that, same as [`BatchReaderSettings`] is the only knob the rest of this
/// crate's logic ever consults.
#[derive(Debug, Clone)]
pub struct BatchReaderSettings {
    /// Maximum number of top-level parts (standalone operations plus
    /// changesets, or top-level JSON array elements) a single batch may
    /// contain before `advance()` fails with [`crate::error::Error::QuotaExceeded`].
    pub max_parts_per_batch: u32,

    /// Maximum number of operations a single changeset / atomicity group may
    /// contain before `advance()` fails with [`crate::error::Error::QuotaExceeded`].
    pub max_operations_per_changeset: u32,

    /// Base URI used to resolve relative request/response URIs for callers
    /// that want absolute URIs out of [`crate::message::OperationRequestMessage::uri`].
    /// When `None`, relative URIs are returned exactly as they appear on the
    /// wire.
    pub base_uri: Option<url::Url>,

    /// Whether a `Content-ID` declared at the HTTP-header level (inside the
    /// `application/http` part body, rather than as a MIME part header) is
    /// accepted. Observed upstream behavior defaults this to `true`.
    pub allow_legacy_content_id_in_http_headers: bool,
}

impl Default for BatchReaderSettings {
    fn default() -> Self {
        Self {
            max_parts_per_batch: 1000,
            max_operations_per_changeset: 1000,
            base_uri: None,
            allow_legacy_content_id_in_http_headers: true,
        }
    }
}

impl BatchReaderSettings {
    /// Creates settings with the conventional defaults (1000/1000, no base
    /// URI, legacy Content-ID headers allowed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of top-level parts per batch.
    pub fn max_parts_per_batch(mut self, max: u32) -> Self {
        self.max_parts_per_batch = max;
        self
    }

    /// Sets the maximum number of operations per changeset.
    pub fn max_operations_per_changeset(mut self, max: u32) -> Self {
        self.max_operations_per_changeset = max;
        self
    }

    /// Sets the base URI used to resolve relative request/response URIs.
    pub fn base_uri(mut self, base: url::Url) -> Self {
        self.base_uri = Some(base);
        self
    }

    /// Disables the legacy HTTP-header-level `Content-ID`.
    pub fn disallow_legacy_content_id_in_http_headers(mut self) -> Self {
        self.allow_legacy_content_id_in_http_headers = false;
        self
    }
}
