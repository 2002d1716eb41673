//! Error taxonomy for the batch reader.
//!
//! The protocol calls for a single error sum type: every failure the reader
//! can produce, from a torn MIME boundary to a forward `dependsOn`
//! reference, is a variant of [`Error`]. Once raised, an error is terminal —
//! the façade moves to [`crate::reader::ReaderState::Exception`] and every
//! subsequent call fails with [`Error::InvalidReaderState`].

/// Everything that can go wrong while reading a batch message.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    // -- framing (Component A) --------------------------------------------
    /// Missing boundary, truncated headers, or a line terminator the framer
    /// refuses to tolerate (a bare CR not followed by LF, for instance).
    #[error("malformed batch framing: {0}")]
    MalformedFraming(String),

    // -- HTTP message framing inside MIME parts (Component C) -------------
    /// A request or status line did not use the literal `HTTP/1.1` token.
    #[error("expected HTTP/1.1, found {found:?}")]
    InvalidHttpVersion {
        /// The version token actually present, if one could be isolated.
        found: Option<String>,
    },

    /// A request line was not `METHOD SP URI SP HTTP/1.1`.
    #[error("invalid request line: {0:?}")]
    InvalidRequestLine(String),

    /// A status line was not `HTTP/1.1 SP <code> SP <reason>`.
    #[error("invalid response line: {0:?}")]
    InvalidResponseLine(String),

    /// The request method was not one of GET, POST, PUT, PATCH, DELETE, MERGE.
    #[error("invalid HTTP method: {0:?}")]
    InvalidHttpMethod(String),

    /// A GET or HEAD request appeared inside a changeset.
    #[error("query method {method} not allowed inside a changeset")]
    QueryMethodInChangeset {
        /// The offending method.
        method: String,
    },

    /// A changeset request did not carry a `Content-ID` header.
    #[error("request inside changeset is missing Content-ID")]
    MissingContentId,

    /// Two requests within the same resolver scope declared the same
    /// `Content-ID`.
    #[error("duplicate Content-ID: {0}")]
    DuplicateContentId(String),

    /// A `multipart/mixed` part appeared inside a changeset (changesets
    /// cannot nest).
    #[error("nested changeset is not allowed")]
    NestedChangesetNotAllowed,

    // -- JSON batch (Component D) ------------------------------------------
    /// The top-level JSON object's first property was neither `requests`
    /// nor `responses`.
    #[error("expected top-level `requests` or `responses` property, found {0:?}")]
    UnexpectedTopLevelProperty(String),

    /// A JSON request object was missing `id`, `method`, or `url`.
    #[error("JSON request is missing required property `{0}`")]
    MissingRequiredProperty(&'static str),

    // -- dependsOn / atomicity group (Component E) -------------------------
    /// `dependsOn` named the request's own id.
    #[error("request {0:?} cannot depend on itself")]
    SelfReference(String),

    /// `dependsOn` named the request's own atomicity group.
    #[error("request {0:?} cannot depend on its own atomicity group {1:?}")]
    SelfGroupReference(String, String),

    /// `dependsOn` named a request that belongs to a group; the dependency
    /// must name the group instead.
    #[error("dependsOn entry {entry:?} must reference group {group:?} instead of request {request:?}")]
    MustReferenceGroup {
        /// The offending `dependsOn` entry.
        entry: String,
        /// The request it actually named.
        request: String,
        /// The group it should have named.
        group: String,
    },

    /// `dependsOn` named a request or group id not yet seen.
    #[error("dependsOn entry {0:?} is a forward reference")]
    ForwardReferenceNotAllowed(String),

    // -- Content-ID / URL resolver (Component F) ---------------------------
    /// A `$id/...` reference in a request URI named an id not registered in
    /// the resolver's current scope.
    #[error("unresolved Content-ID reference: {0:?}")]
    UnresolvedContentId(String),

    // -- façade (Component G) ------------------------------------------------
    /// A public call was made in a state that does not permit it (e.g.
    /// `create_operation_request()` while not in `Operation` state, or any
    /// call after `Exception`/`Completed`).
    #[error("reader is not in a valid state for this call")]
    InvalidReaderState,

    /// `batch_size` or `changeset_size` exceeded its configured maximum.
    #[error("quota exceeded: {what} ({actual} > {max})")]
    QuotaExceeded {
        /// Which quota was exceeded (`"parts per batch"` or `"operations
        /// per changeset"`).
        what: &'static str,
        /// The value that tripped the quota.
        actual: u32,
        /// The configured maximum.
        max: u32,
    },

    /// A body sub-stream was read after the reader had advanced past it, or
    /// after the reader itself was dropped.
    #[error("body stream aborted: reader has advanced past this operation")]
    StreamAborted,

    // -- low-level collaborators, not part of the core taxonomy but surfaced as-is --
    /// The underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON tokenizer rejected the input outright (this is distinct
    /// from `UnexpectedTopLevelProperty`/`MissingRequiredProperty`, which
    /// are *structurally* valid JSON that fails OData batch rules).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for the header/framing-level violations the header parser raises.
    pub(crate) fn header(message: impl Into<String>) -> Self {
        Error::MalformedFraming(message.into())
    }
}
