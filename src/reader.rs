//! Component G — the batch reader façade.
//!
//! Ties components A–F together behind one caller-driven state machine.
//! [`BatchReader`] drives it over a blocking [`ByteSource`]; [`AsyncBatchReader`]
//! drives the identical decisions over an [`AsyncByteSource`]. The two types
//! do not share a common driver object — see the design note on
//! [`crate::message`] for why duplicating the thin I/O-fetching lines (while
//! sharing the pure decision logic in the free functions below) is preferred
//! here over a trait-object driver.

use crate::atomicity::AtomicGroupTracker;
use crate::error::Error;
use crate::framing::FrameBuffer;
use crate::headers::HeaderMap;
use crate::json::{self, JsonBatch, JsonRequestItem, JsonResponseItem};
use crate::message::{
    BodySourceHolder, HttpMethod, OperationRequestMessage, OperationResponseMessage,
};
use crate::mime::{parse_request_line, parse_status_line};
use crate::resolver::ContentIdResolver;
use crate::settings::BatchReaderSettings;
use crate::source::{AsyncByteSource, ByteSource};

/// The reader's current position in the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Initial,
    ChangesetStart,
    Operation,
    ChangesetEnd,
    Completed,
    Exception,
}

/// Sub-state of the operation currently exposed by the reader, tracked
/// alongside the borrow-checker enforcement described in [`crate::message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperationSubState {
    None,
    MessageCreated,
    StreamRequested,
    StreamDisposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Request,
    Response,
}

/// Everything needed to build the operation message once the caller asks
/// for it; assembled during `advance()`, consumed by `create_operation_*`.
struct PendingMimePart {
    headers: HeaderMap,
    request_line: Option<(HttpMethod, String)>,
    status: Option<u16>,
    content_id: Option<String>,
}

struct MimeFormat {
    outer_boundary: String,
    inner_boundary: Option<String>,
    pending: Option<PendingMimePart>,
}

struct PendingJsonItem {
    index: usize,
}

struct JsonFormat {
    requests: Vec<JsonRequestItem>,
    responses: Vec<JsonResponseItem>,
    is_request_payload: bool,
    cursor: usize,
    tracker: AtomicGroupTracker,
    pending: Option<PendingJsonItem>,
}

impl JsonFormat {
    fn len(&self) -> usize {
        if self.is_request_payload {
            self.requests.len()
        } else {
            self.responses.len()
        }
    }

    fn group_of(&self, index: usize) -> Option<String> {
        if self.is_request_payload {
            self.requests[index].atomicity_group.clone()
        } else {
            None
        }
    }

    fn id_of(&self, index: usize) -> String {
        if self.is_request_payload {
            self.requests[index].id.clone()
        } else {
            self.responses[index]
                .id
                .clone()
                .unwrap_or_else(|| format!("#{index}"))
        }
    }
}

enum Format {
    Mime(MimeFormat),
    Json(JsonFormat),
}

fn split_content_type(content_type: &str) -> (String, Option<String>) {
    let mut parts = content_type.split(';');
    let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let boundary = parts.find_map(|p| {
        let (k, v) = p.trim().split_once('=')?;
        if k.trim().eq_ignore_ascii_case("boundary") {
            Some(v.trim().trim_matches('"').to_string())
        } else {
            None
        }
    });
    (essence, boundary)
}

fn read_header_lines_sync(
    buffer: &mut FrameBuffer,
    source: &mut dyn ByteSource,
) -> Result<Vec<String>, Error> {
    let mut lines = Vec::new();
    loop {
        match buffer.drive_sync(source, |f| f.read_line())? {
            None => {
                return Err(Error::MalformedFraming(
                    "unexpected end of input while reading headers".to_string(),
                ));
            }
            Some(l) if l.is_empty() => break,
            Some(l) => lines.push(l),
        }
    }
    Ok(lines)
}

async fn read_header_lines_async(
    buffer: &mut FrameBuffer,
    source: &mut dyn AsyncByteSource,
) -> Result<Vec<String>, Error> {
    let mut lines = Vec::new();
    loop {
        match buffer.drive_async(source, |f| f.read_line()).await? {
            None => {
                return Err(Error::MalformedFraming(
                    "unexpected end of input while reading headers".to_string(),
                ));
            }
            Some(l) if l.is_empty() => break,
            Some(l) => lines.push(l),
        }
    }
    Ok(lines)
}

fn resolve_content_id(headers: &HeaderMap, body_headers: &HeaderMap, allow_legacy: bool) -> Option<String> {
    if headers.content_id().is_none() && !allow_legacy && body_headers.content_id().is_some() {
        log::warn!(
            "Content-ID present at HTTP-header level but AllowLegacyContentIdInHttpHeaders is \
             disabled; treating this part as if it had no Content-ID"
        );
    }
    headers
        .content_id()
        .or_else(|| if allow_legacy { body_headers.content_id() } else { None })
        .map(str::to_string)
}

/// Re-bases a relative request URI against `BaseUri`, when configured. An
/// already-absolute URI (or a `$id` reference left unresolved outside a
/// changeset) passes through unchanged. This is a plain string join, not a
/// URI-template or query-option parse — those remain out of scope.
fn apply_base_uri(uri: String, base: Option<&url::Url>) -> String {
    let Some(base) = base else { return uri };
    if url::Url::parse(&uri).is_ok() {
        return uri;
    }
    match base.join(&uri) {
        Ok(joined) => joined.to_string(),
        Err(_) => uri,
    }
}

/// A streaming reader over a `multipart/mixed` or JSON OData batch payload,
/// driven by a blocking [`ByteSource`].
pub struct BatchReader<S> {
    source: S,
    buffer: FrameBuffer,
    settings: BatchReaderSettings,
    state: ReaderState,
    sub_state: OperationSubState,
    kind: MessageKind,
    resolver: ContentIdResolver,
    batch_size: u32,
    changeset_size: u32,
    pending_content_id: Option<(String, String)>,
    format: Format,
}

impl<S: ByteSource> BatchReader<S> {
    /// Opens a reader over a request batch. `content_type` is the payload's
    /// declared `Content-Type` (`multipart/mixed; boundary=...` or
    /// `application/json`), carried outside the body the same way an HTTP
    /// `Content-Type` header is.
    pub fn open_request(source: S, content_type: &str, settings: BatchReaderSettings) -> Result<Self, Error> {
        Self::open(source, content_type, settings, MessageKind::Request)
    }

    /// Opens a reader over a response batch.
    pub fn open_response(source: S, content_type: &str, settings: BatchReaderSettings) -> Result<Self, Error> {
        Self::open(source, content_type, settings, MessageKind::Response)
    }

    fn open(
        mut source: S,
        content_type: &str,
        settings: BatchReaderSettings,
        kind: MessageKind,
    ) -> Result<Self, Error> {
        let (essence, boundary) = split_content_type(content_type);
        let format = if essence == "multipart/mixed" {
            let outer_boundary = boundary.ok_or_else(|| {
                Error::header("multipart/mixed batch Content-Type is missing boundary=")
            })?;
            Format::Mime(MimeFormat {
                outer_boundary,
                inner_boundary: None,
                pending: None,
            })
        } else if essence == "application/json" {
            let mut bytes = Vec::new();
            loop {
                let n = source.read_more(&mut bytes)?;
                if n == 0 {
                    break;
                }
            }
            let batch = json::parse_document(&bytes)?;
            let format = match (kind, batch) {
                (MessageKind::Request, JsonBatch::Requests(requests)) => JsonFormat {
                    requests,
                    responses: Vec::new(),
                    is_request_payload: true,
                    cursor: 0,
                    tracker: AtomicGroupTracker::new(),
                    pending: None,
                },
                (MessageKind::Response, JsonBatch::Responses(responses)) => JsonFormat {
                    requests: Vec::new(),
                    responses,
                    is_request_payload: false,
                    cursor: 0,
                    tracker: AtomicGroupTracker::new(),
                    pending: None,
                },
                _ => {
                    return Err(Error::UnexpectedTopLevelProperty(
                        "JSON batch array kind does not match reader kind".to_string(),
                    ));
                }
            };
            Format::Json(format)
        } else {
            return Err(Error::header(format!(
                "unsupported batch Content-Type: {essence}"
            )));
        };

        Ok(Self {
            source,
            buffer: FrameBuffer::new(),
            settings,
            state: ReaderState::Initial,
            sub_state: OperationSubState::None,
            kind,
            resolver: ContentIdResolver::new(),
            batch_size: 0,
            changeset_size: 0,
            pending_content_id: None,
            format,
        })
    }

    /// The reader's current state. Never mutates.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Advances the state machine by one step. Returns `false` once
    /// [`ReaderState::Completed`] is reached (including every subsequent
    /// no-op call).
    pub fn advance(&mut self) -> Result<bool, Error> {
        if self.state == ReaderState::Exception {
            return Err(Error::InvalidReaderState);
        }
        if self.state == ReaderState::Completed {
            return Ok(false);
        }
        if self.sub_state == OperationSubState::StreamRequested {
            self.state = ReaderState::Exception;
            return Err(Error::InvalidReaderState);
        }
        if self.state == ReaderState::Operation && self.sub_state == OperationSubState::None {
            self.state = ReaderState::Exception;
            return Err(Error::InvalidReaderState);
        }

        let from = self.state;
        let is_mime = matches!(self.format, Format::Mime(_));
        let result = if is_mime { self.advance_mime() } else { self.advance_json() };
        if result.is_err() {
            self.state = ReaderState::Exception;
        }
        log::trace!("advance: {from:?} -> {:?}", self.state);
        result
    }

    fn advance_mime(&mut self) -> Result<bool, Error> {
        match self.state {
            ReaderState::Initial => {
                let outer = mime_mut(&mut self.format).outer_boundary.clone();
                let m = self.buffer.drive_sync(&mut self.source, |f| f.skip_to_boundary(&outer, None))?;
                if m.is_end {
                    self.state = ReaderState::Completed;
                    return Ok(false);
                }
                self.read_mime_part_sync(false)?;
                Ok(true)
            }
            ReaderState::ChangesetStart => {
                let (outer, inner) = {
                    let mime = mime_mut(&mut self.format);
                    (
                        mime.outer_boundary.clone(),
                        mime.inner_boundary.clone().expect("changeset boundary set"),
                    )
                };
                let m = self
                    .buffer
                    .drive_sync(&mut self.source, |f| f.skip_to_boundary(&inner, Some(&outer)))?;
                if m.is_end || m.is_parent {
                    self.state = ReaderState::ChangesetEnd;
                    return Ok(true);
                }
                self.read_mime_part_sync(true)?;
                Ok(true)
            }
            ReaderState::Operation => {
                if let Some((id, uri)) = self.pending_content_id.take() {
                    log::debug!("publishing Content-ID {id:?} -> {uri:?}");
                    self.resolver.register(id, uri);
                }
                let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
                let (boundary, parent) = {
                    let mime = mime_mut(&mut self.format);
                    if in_changeset {
                        (mime.inner_boundary.clone().unwrap(), Some(mime.outer_boundary.clone()))
                    } else {
                        (mime.outer_boundary.clone(), None)
                    }
                };
                let m = self.buffer.drive_sync(&mut self.source, |f| {
                    f.skip_to_boundary(&boundary, parent.as_deref())
                })?;
                log::trace!("scanned boundary {boundary:?}: {m:?}");
                if m.is_end || m.is_parent {
                    self.state = if in_changeset {
                        ReaderState::ChangesetEnd
                    } else {
                        ReaderState::Completed
                    };
                    return Ok(self.state != ReaderState::Completed);
                }
                self.read_mime_part_sync(in_changeset)?;
                Ok(true)
            }
            ReaderState::ChangesetEnd => {
                log::debug!("changeset closed, resetting Content-ID resolver scope");
                self.resolver.reset();
                self.changeset_size = 0;
                mime_mut(&mut self.format).inner_boundary = None;
                let outer = mime_mut(&mut self.format).outer_boundary.clone();
                let m = self.buffer.drive_sync(&mut self.source, |f| f.skip_to_boundary(&outer, None))?;
                if m.is_end {
                    self.state = ReaderState::Completed;
                    return Ok(false);
                }
                self.read_mime_part_sync(false)?;
                Ok(true)
            }
            ReaderState::Completed | ReaderState::Exception => unreachable!(),
        }
    }

    /// Parses one MIME part's headers (and, if it is an `application/http`
    /// part, the embedded HTTP request/status line and headers), advancing
    /// `state`/`batch_size`/`changeset_size` accordingly.
    fn read_mime_part_sync(&mut self, in_changeset: bool) -> Result<(), Error> {
        let lines = read_header_lines_sync(&mut self.buffer, &mut self.source)?;
        let part_headers = HeaderMap::parse(lines.iter().map(String::as_str))?;
        part_headers.content_transfer_encoding()?;

        if let Some(ct) = part_headers.content_type() {
            if ct.is_multipart_mixed() {
                if in_changeset {
                    return Err(Error::NestedChangesetNotAllowed);
                }
                let inner_boundary = ct
                    .boundary()
                    .ok_or_else(|| Error::header("nested multipart/mixed is missing boundary="))?;
                log::debug!("changeset opened with boundary {inner_boundary:?}");
                mime_mut(&mut self.format).inner_boundary = Some(inner_boundary);
                self.bump_batch_size()?;
                self.state = ReaderState::ChangesetStart;
                return Ok(());
            }
        }

        let first_line = self
            .buffer
            .drive_sync(&mut self.source, |f| f.read_line())?
            .ok_or_else(|| Error::MalformedFraming("missing HTTP request/status line".to_string()))?;
        let body_header_lines = read_header_lines_sync(&mut self.buffer, &mut self.source)?;
        let body_headers = HeaderMap::parse(body_header_lines.iter().map(String::as_str))?;

        let (request_line, status) = match self.kind {
            MessageKind::Request => {
                let (method, uri) = parse_request_line(&first_line)?;
                (Some((method, uri)), None)
            }
            MessageKind::Response => (None, Some(parse_status_line(&first_line)?)),
        };
        let content_id = resolve_content_id(
            &part_headers,
            &body_headers,
            self.settings.allow_legacy_content_id_in_http_headers,
        );

        mime_mut(&mut self.format).pending = Some(PendingMimePart {
            headers: body_headers,
            request_line,
            status,
            content_id,
        });

        if in_changeset {
            self.changeset_size += 1;
            if self.changeset_size > self.settings.max_operations_per_changeset {
                return Err(Error::QuotaExceeded {
                    what: "operations per changeset",
                    actual: self.changeset_size,
                    max: self.settings.max_operations_per_changeset,
                });
            }
        } else {
            self.bump_batch_size()?;
        }
        self.sub_state = OperationSubState::None;
        self.state = ReaderState::Operation;
        Ok(())
    }

    fn bump_batch_size(&mut self) -> Result<(), Error> {
        self.batch_size += 1;
        if self.batch_size > self.settings.max_parts_per_batch {
            return Err(Error::QuotaExceeded {
                what: "parts per batch",
                actual: self.batch_size,
                max: self.settings.max_parts_per_batch,
            });
        }
        Ok(())
    }

    fn advance_json(&mut self) -> Result<bool, Error> {
        if let Some((id, uri)) = self.pending_content_id.take() {
            log::debug!("publishing Content-ID {id:?} -> {uri:?}");
            self.resolver.register(id, uri);
        }
        let len = json_ref(&self.format).len();
        let cursor = json_ref(&self.format).cursor;

        if cursor >= len {
            let was_in_group = json_ref(&self.format).tracker.active_group().is_some();
            if was_in_group && self.state != ReaderState::ChangesetEnd {
                self.state = ReaderState::ChangesetEnd;
                self.changeset_size = 0;
                log::debug!("atomicity group closed at end of array");
                json_mut(&mut self.format).tracker.close();
                return Ok(true);
            }
            self.state = ReaderState::Completed;
            return Ok(false);
        }

        let next_group = json_ref(&self.format).group_of(cursor);
        let is_end = json_ref(&self.format).tracker.is_end(next_group.as_deref());
        if is_end && self.state != ReaderState::ChangesetEnd {
            self.state = ReaderState::ChangesetEnd;
            self.changeset_size = 0;
            return Ok(true);
        }

        let opens_group = json_ref(&self.format).tracker.is_new_group(next_group.as_deref());
        if opens_group && self.state != ReaderState::ChangesetStart {
            log::debug!("atomicity group {:?} opened", next_group.as_deref());
            self.state = ReaderState::ChangesetStart;
            self.changeset_size = 0;
            return Ok(true);
        }

        let id = json_ref(&self.format).id_of(cursor);
        json_mut(&mut self.format).tracker.add(&id, next_group.as_deref());

        if next_group.is_some() {
            self.changeset_size += 1;
            if self.changeset_size > self.settings.max_operations_per_changeset {
                return Err(Error::QuotaExceeded {
                    what: "operations per changeset",
                    actual: self.changeset_size,
                    max: self.settings.max_operations_per_changeset,
                });
            }
        }

        json_mut(&mut self.format).pending = Some(PendingJsonItem { index: cursor });
        json_mut(&mut self.format).cursor += 1;
        self.bump_batch_size()?;
        self.sub_state = OperationSubState::None;
        self.state = ReaderState::Operation;
        Ok(true)
    }

    /// Builds the request message for the current `Operation` state.
    /// Requires the reader was opened with `open_request` and the MIME/JSON
    /// `dependsOn`/changeset validation rules described in the module docs.
    pub fn create_operation_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        if self.state != ReaderState::Operation || self.kind != MessageKind::Request {
            return Err(Error::InvalidReaderState);
        }
        if self.sub_state != OperationSubState::None {
            return Err(Error::InvalidReaderState);
        }

        if matches!(self.format, Format::Mime(_)) {
            self.create_mime_request()
        } else {
            self.create_json_request()
        }
    }

    fn create_mime_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
        let pending = mime_mut(&mut self.format)
            .pending
            .take()
            .ok_or(Error::InvalidReaderState)?;
        let (method, uri) = pending.request_line.ok_or(Error::InvalidReaderState)?;

        if in_changeset && method.is_query_method() {
            return Err(Error::QueryMethodInChangeset {
                method: method.as_str().to_string(),
            });
        }
        let content_id = if in_changeset {
            let id = pending.content_id.ok_or(Error::MissingContentId)?;
            if self.resolver.contains(&id) {
                return Err(Error::DuplicateContentId(id));
            }
            Some(id)
        } else {
            pending.content_id
        };

        let resolved_uri = apply_base_uri(self.resolver.resolve(&uri, in_changeset)?, self.settings.base_uri.as_ref());
        if let Some(id) = &content_id {
            self.pending_content_id = Some((id.clone(), resolved_uri.clone()));
        }

        self.sub_state = OperationSubState::MessageCreated;
        let boundary = if in_changeset {
            mime_mut(&mut self.format).inner_boundary.clone().unwrap()
        } else {
            mime_mut(&mut self.format).outer_boundary.clone()
        };
        let body = BodySourceHolder::Mime {
            buffer: &mut self.buffer,
            source: &mut self.source,
            boundary,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationRequestMessage {
            method,
            uri: resolved_uri,
            headers: pending.headers,
            content_id,
            depends_on: Vec::new(),
            body,
        })
    }

    fn create_json_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        let json = json_mut(&mut self.format);
        let pending = json.pending.take().ok_or(Error::InvalidReaderState)?;
        let item = json.requests[pending.index].clone();

        let flattened = json
            .tracker
            .flatten(&item.id, item.atomicity_group.as_deref(), &item.depends_on)?;

        let resolved_uri = apply_base_uri(
            self.resolver.resolve(&item.url, item.atomicity_group.is_some())?,
            self.settings.base_uri.as_ref(),
        );
        self.pending_content_id = Some((item.id.clone(), resolved_uri.clone()));

        self.sub_state = OperationSubState::MessageCreated;
        let body = BodySourceHolder::Json {
            bytes: item.body,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationRequestMessage {
            method: item.method,
            uri: resolved_uri,
            headers: item.headers,
            content_id: Some(item.id),
            depends_on: flattened,
            body,
        })
    }

    /// Builds the response message for the current `Operation` state.
    pub fn create_operation_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        if self.state != ReaderState::Operation || self.kind != MessageKind::Response {
            return Err(Error::InvalidReaderState);
        }
        if self.sub_state != OperationSubState::None {
            return Err(Error::InvalidReaderState);
        }
        if matches!(self.format, Format::Mime(_)) {
            self.create_mime_response()
        } else {
            self.create_json_response()
        }
    }

    fn create_mime_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
        let pending = mime_mut(&mut self.format)
            .pending
            .take()
            .ok_or(Error::InvalidReaderState)?;
        let status = pending.status.ok_or(Error::InvalidReaderState)?;

        self.sub_state = OperationSubState::MessageCreated;
        let boundary = if in_changeset {
            mime_mut(&mut self.format).inner_boundary.clone().unwrap()
        } else {
            mime_mut(&mut self.format).outer_boundary.clone()
        };
        let body = BodySourceHolder::Mime {
            buffer: &mut self.buffer,
            source: &mut self.source,
            boundary,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationResponseMessage {
            status,
            headers: pending.headers,
            content_id: pending.content_id,
            body,
        })
    }

    fn create_json_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        let json = json_mut(&mut self.format);
        let pending = json.pending.take().ok_or(Error::InvalidReaderState)?;
        let item = json.responses[pending.index].clone();

        self.sub_state = OperationSubState::MessageCreated;
        let body = BodySourceHolder::Json {
            bytes: item.body,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationResponseMessage {
            status: item.status,
            headers: item.headers,
            content_id: item.id,
            body,
        })
    }
}

fn mime_mut(format: &mut Format) -> &mut MimeFormat {
    match format {
        Format::Mime(m) => m,
        Format::Json(_) => unreachable!("mime accessor called on a JSON-format reader"),
    }
}

fn json_mut(format: &mut Format) -> &mut JsonFormat {
    match format {
        Format::Json(j) => j,
        Format::Mime(_) => unreachable!("json accessor called on a MIME-format reader"),
    }
}

fn json_ref(format: &Format) -> &JsonFormat {
    match format {
        Format::Json(j) => j,
        Format::Mime(_) => unreachable!("json accessor called on a MIME-format reader"),
    }
}

/// Async counterpart to [`BatchReader`], driven over an [`AsyncByteSource`].
pub struct AsyncBatchReader<S> {
    source: S,
    buffer: FrameBuffer,
    settings: BatchReaderSettings,
    state: ReaderState,
    sub_state: OperationSubState,
    kind: MessageKind,
    resolver: ContentIdResolver,
    batch_size: u32,
    changeset_size: u32,
    pending_content_id: Option<(String, String)>,
    format: Format,
}

impl<S: AsyncByteSource> AsyncBatchReader<S> {
    /// Async counterpart to [`BatchReader::open_request`].
    pub async fn open_request(
        source: S,
        content_type: &str,
        settings: BatchReaderSettings,
    ) -> Result<Self, Error> {
        Self::open(source, content_type, settings, MessageKind::Request).await
    }

    /// Async counterpart to [`BatchReader::open_response`].
    pub async fn open_response(
        source: S,
        content_type: &str,
        settings: BatchReaderSettings,
    ) -> Result<Self, Error> {
        Self::open(source, content_type, settings, MessageKind::Response).await
    }

    async fn open(
        mut source: S,
        content_type: &str,
        settings: BatchReaderSettings,
        kind: MessageKind,
    ) -> Result<Self, Error> {
        let (essence, boundary) = split_content_type(content_type);
        let format = if essence == "multipart/mixed" {
            let outer_boundary = boundary.ok_or_else(|| {
                Error::header("multipart/mixed batch Content-Type is missing boundary=")
            })?;
            Format::Mime(MimeFormat {
                outer_boundary,
                inner_boundary: None,
                pending: None,
            })
        } else if essence == "application/json" {
            let mut bytes = Vec::new();
            loop {
                let n = source.read_more(&mut bytes).await?;
                if n == 0 {
                    break;
                }
            }
            let batch = json::parse_document(&bytes)?;
            let format = match (kind, batch) {
                (MessageKind::Request, JsonBatch::Requests(requests)) => JsonFormat {
                    requests,
                    responses: Vec::new(),
                    is_request_payload: true,
                    cursor: 0,
                    tracker: AtomicGroupTracker::new(),
                    pending: None,
                },
                (MessageKind::Response, JsonBatch::Responses(responses)) => JsonFormat {
                    requests: Vec::new(),
                    responses,
                    is_request_payload: false,
                    cursor: 0,
                    tracker: AtomicGroupTracker::new(),
                    pending: None,
                },
                _ => {
                    return Err(Error::UnexpectedTopLevelProperty(
                        "JSON batch array kind does not match reader kind".to_string(),
                    ));
                }
            };
            Format::Json(format)
        } else {
            return Err(Error::header(format!(
                "unsupported batch Content-Type: {essence}"
            )));
        };

        Ok(Self {
            source,
            buffer: FrameBuffer::new(),
            settings,
            state: ReaderState::Initial,
            sub_state: OperationSubState::None,
            kind,
            resolver: ContentIdResolver::new(),
            batch_size: 0,
            changeset_size: 0,
            pending_content_id: None,
            format,
        })
    }

    /// The reader's current state. Never mutates.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Async counterpart to [`BatchReader::advance`].
    pub async fn advance(&mut self) -> Result<bool, Error> {
        if self.state == ReaderState::Exception {
            return Err(Error::InvalidReaderState);
        }
        if self.state == ReaderState::Completed {
            return Ok(false);
        }
        if self.sub_state == OperationSubState::StreamRequested {
            self.state = ReaderState::Exception;
            return Err(Error::InvalidReaderState);
        }
        if self.state == ReaderState::Operation && self.sub_state == OperationSubState::None {
            self.state = ReaderState::Exception;
            return Err(Error::InvalidReaderState);
        }

        let from = self.state;
        let is_mime = matches!(self.format, Format::Mime(_));
        let result = if is_mime { self.advance_mime().await } else { self.advance_json().await };
        if result.is_err() {
            self.state = ReaderState::Exception;
        }
        log::trace!("advance: {from:?} -> {:?}", self.state);
        result
    }

    async fn advance_mime(&mut self) -> Result<bool, Error> {
        match self.state {
            ReaderState::Initial => {
                let outer = mime_mut(&mut self.format).outer_boundary.clone();
                let m = self
                    .buffer
                    .drive_async(&mut self.source, |f| f.skip_to_boundary(&outer, None))
                    .await?;
                if m.is_end {
                    self.state = ReaderState::Completed;
                    return Ok(false);
                }
                self.read_mime_part_async(false).await?;
                Ok(true)
            }
            ReaderState::ChangesetStart => {
                let (outer, inner) = {
                    let mime = mime_mut(&mut self.format);
                    (
                        mime.outer_boundary.clone(),
                        mime.inner_boundary.clone().expect("changeset boundary set"),
                    )
                };
                let m = self
                    .buffer
                    .drive_async(&mut self.source, |f| f.skip_to_boundary(&inner, Some(&outer)))
                    .await?;
                if m.is_end || m.is_parent {
                    self.state = ReaderState::ChangesetEnd;
                    return Ok(true);
                }
                self.read_mime_part_async(true).await?;
                Ok(true)
            }
            ReaderState::Operation => {
                if let Some((id, uri)) = self.pending_content_id.take() {
                    log::debug!("publishing Content-ID {id:?} -> {uri:?}");
                    self.resolver.register(id, uri);
                }
                let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
                let (boundary, parent) = {
                    let mime = mime_mut(&mut self.format);
                    if in_changeset {
                        (mime.inner_boundary.clone().unwrap(), Some(mime.outer_boundary.clone()))
                    } else {
                        (mime.outer_boundary.clone(), None)
                    }
                };
                let m = self
                    .buffer
                    .drive_async(&mut self.source, |f| f.skip_to_boundary(&boundary, parent.as_deref()))
                    .await?;
                log::trace!("scanned boundary {boundary:?}: {m:?}");
                if m.is_end || m.is_parent {
                    self.state = if in_changeset {
                        ReaderState::ChangesetEnd
                    } else {
                        ReaderState::Completed
                    };
                    return Ok(self.state != ReaderState::Completed);
                }
                self.read_mime_part_async(in_changeset).await?;
                Ok(true)
            }
            ReaderState::ChangesetEnd => {
                log::debug!("changeset closed, resetting Content-ID resolver scope");
                self.resolver.reset();
                self.changeset_size = 0;
                mime_mut(&mut self.format).inner_boundary = None;
                let outer = mime_mut(&mut self.format).outer_boundary.clone();
                let m = self
                    .buffer
                    .drive_async(&mut self.source, |f| f.skip_to_boundary(&outer, None))
                    .await?;
                if m.is_end {
                    self.state = ReaderState::Completed;
                    return Ok(false);
                }
                self.read_mime_part_async(false).await?;
                Ok(true)
            }
            ReaderState::Completed | ReaderState::Exception => unreachable!(),
        }
    }

    async fn read_mime_part_async(&mut self, in_changeset: bool) -> Result<(), Error> {
        let lines = read_header_lines_async(&mut self.buffer, &mut self.source).await?;
        let part_headers = HeaderMap::parse(lines.iter().map(String::as_str))?;
        part_headers.content_transfer_encoding()?;

        if let Some(ct) = part_headers.content_type() {
            if ct.is_multipart_mixed() {
                if in_changeset {
                    return Err(Error::NestedChangesetNotAllowed);
                }
                let inner_boundary = ct
                    .boundary()
                    .ok_or_else(|| Error::header("nested multipart/mixed is missing boundary="))?;
                log::debug!("changeset opened with boundary {inner_boundary:?}");
                mime_mut(&mut self.format).inner_boundary = Some(inner_boundary);
                self.bump_batch_size()?;
                self.state = ReaderState::ChangesetStart;
                return Ok(());
            }
        }

        let first_line = self
            .buffer
            .drive_async(&mut self.source, |f| f.read_line())
            .await?
            .ok_or_else(|| Error::MalformedFraming("missing HTTP request/status line".to_string()))?;
        let body_header_lines = read_header_lines_async(&mut self.buffer, &mut self.source).await?;
        let body_headers = HeaderMap::parse(body_header_lines.iter().map(String::as_str))?;

        let (request_line, status) = match self.kind {
            MessageKind::Request => {
                let (method, uri) = parse_request_line(&first_line)?;
                (Some((method, uri)), None)
            }
            MessageKind::Response => (None, Some(parse_status_line(&first_line)?)),
        };
        let content_id = resolve_content_id(
            &part_headers,
            &body_headers,
            self.settings.allow_legacy_content_id_in_http_headers,
        );

        mime_mut(&mut self.format).pending = Some(PendingMimePart {
            headers: body_headers,
            request_line,
            status,
            content_id,
        });

        if in_changeset {
            self.changeset_size += 1;
            if self.changeset_size > self.settings.max_operations_per_changeset {
                return Err(Error::QuotaExceeded {
                    what: "operations per changeset",
                    actual: self.changeset_size,
                    max: self.settings.max_operations_per_changeset,
                });
            }
        } else {
            self.bump_batch_size()?;
        }
        self.sub_state = OperationSubState::None;
        self.state = ReaderState::Operation;
        Ok(())
    }

    fn bump_batch_size(&mut self) -> Result<(), Error> {
        self.batch_size += 1;
        if self.batch_size > self.settings.max_parts_per_batch {
            return Err(Error::QuotaExceeded {
                what: "parts per batch",
                actual: self.batch_size,
                max: self.settings.max_parts_per_batch,
            });
        }
        Ok(())
    }

    async fn advance_json(&mut self) -> Result<bool, Error> {
        if let Some((id, uri)) = self.pending_content_id.take() {
            log::debug!("publishing Content-ID {id:?} -> {uri:?}");
            self.resolver.register(id, uri);
        }
        let len = json_ref(&self.format).len();
        let cursor = json_ref(&self.format).cursor;

        if cursor >= len {
            let was_in_group = json_ref(&self.format).tracker.active_group().is_some();
            if was_in_group && self.state != ReaderState::ChangesetEnd {
                self.state = ReaderState::ChangesetEnd;
                self.changeset_size = 0;
                log::debug!("atomicity group closed at end of array");
                json_mut(&mut self.format).tracker.close();
                return Ok(true);
            }
            self.state = ReaderState::Completed;
            return Ok(false);
        }

        let next_group = json_ref(&self.format).group_of(cursor);
        let is_end = json_ref(&self.format).tracker.is_end(next_group.as_deref());
        if is_end && self.state != ReaderState::ChangesetEnd {
            self.state = ReaderState::ChangesetEnd;
            self.changeset_size = 0;
            return Ok(true);
        }

        let opens_group = json_ref(&self.format).tracker.is_new_group(next_group.as_deref());
        if opens_group && self.state != ReaderState::ChangesetStart {
            log::debug!("atomicity group {:?} opened", next_group.as_deref());
            self.state = ReaderState::ChangesetStart;
            self.changeset_size = 0;
            return Ok(true);
        }

        let id = json_ref(&self.format).id_of(cursor);
        json_mut(&mut self.format).tracker.add(&id, next_group.as_deref());

        if next_group.is_some() {
            self.changeset_size += 1;
            if self.changeset_size > self.settings.max_operations_per_changeset {
                return Err(Error::QuotaExceeded {
                    what: "operations per changeset",
                    actual: self.changeset_size,
                    max: self.settings.max_operations_per_changeset,
                });
            }
        }

        json_mut(&mut self.format).pending = Some(PendingJsonItem { index: cursor });
        json_mut(&mut self.format).cursor += 1;
        self.bump_batch_size()?;
        self.sub_state = OperationSubState::None;
        self.state = ReaderState::Operation;
        Ok(true)
    }

    /// Async counterpart to [`BatchReader::create_operation_request`].
    pub fn create_operation_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        if self.state != ReaderState::Operation || self.kind != MessageKind::Request {
            return Err(Error::InvalidReaderState);
        }
        if self.sub_state != OperationSubState::None {
            return Err(Error::InvalidReaderState);
        }
        if matches!(self.format, Format::Mime(_)) {
            self.create_mime_request()
        } else {
            self.create_json_request()
        }
    }

    fn create_mime_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
        let pending = mime_mut(&mut self.format)
            .pending
            .take()
            .ok_or(Error::InvalidReaderState)?;
        let (method, uri) = pending.request_line.ok_or(Error::InvalidReaderState)?;

        if in_changeset && method.is_query_method() {
            return Err(Error::QueryMethodInChangeset {
                method: method.as_str().to_string(),
            });
        }
        let content_id = if in_changeset {
            let id = pending.content_id.ok_or(Error::MissingContentId)?;
            if self.resolver.contains(&id) {
                return Err(Error::DuplicateContentId(id));
            }
            Some(id)
        } else {
            pending.content_id
        };

        let resolved_uri = apply_base_uri(self.resolver.resolve(&uri, in_changeset)?, self.settings.base_uri.as_ref());
        if let Some(id) = &content_id {
            self.pending_content_id = Some((id.clone(), resolved_uri.clone()));
        }

        self.sub_state = OperationSubState::MessageCreated;
        let boundary = if in_changeset {
            mime_mut(&mut self.format).inner_boundary.clone().unwrap()
        } else {
            mime_mut(&mut self.format).outer_boundary.clone()
        };
        let body = BodySourceHolder::Mime {
            buffer: &mut self.buffer,
            source: &mut self.source,
            boundary,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationRequestMessage {
            method,
            uri: resolved_uri,
            headers: pending.headers,
            content_id,
            depends_on: Vec::new(),
            body,
        })
    }

    fn create_json_request(&mut self) -> Result<OperationRequestMessage<'_, S>, Error> {
        let json = json_mut(&mut self.format);
        let pending = json.pending.take().ok_or(Error::InvalidReaderState)?;
        let item = json.requests[pending.index].clone();

        let flattened = json
            .tracker
            .flatten(&item.id, item.atomicity_group.as_deref(), &item.depends_on)?;

        let resolved_uri = apply_base_uri(
            self.resolver.resolve(&item.url, item.atomicity_group.is_some())?,
            self.settings.base_uri.as_ref(),
        );
        self.pending_content_id = Some((item.id.clone(), resolved_uri.clone()));

        self.sub_state = OperationSubState::MessageCreated;
        let body = BodySourceHolder::Json {
            bytes: item.body,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationRequestMessage {
            method: item.method,
            uri: resolved_uri,
            headers: item.headers,
            content_id: Some(item.id),
            depends_on: flattened,
            body,
        })
    }

    /// Async counterpart to [`BatchReader::create_operation_response`].
    pub fn create_operation_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        if self.state != ReaderState::Operation || self.kind != MessageKind::Response {
            return Err(Error::InvalidReaderState);
        }
        if self.sub_state != OperationSubState::None {
            return Err(Error::InvalidReaderState);
        }
        if matches!(self.format, Format::Mime(_)) {
            self.create_mime_response()
        } else {
            self.create_json_response()
        }
    }

    fn create_mime_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        let in_changeset = mime_mut(&mut self.format).inner_boundary.is_some();
        let pending = mime_mut(&mut self.format)
            .pending
            .take()
            .ok_or(Error::InvalidReaderState)?;
        let status = pending.status.ok_or(Error::InvalidReaderState)?;

        self.sub_state = OperationSubState::MessageCreated;
        let boundary = if in_changeset {
            mime_mut(&mut self.format).inner_boundary.clone().unwrap()
        } else {
            mime_mut(&mut self.format).outer_boundary.clone()
        };
        let body = BodySourceHolder::Mime {
            buffer: &mut self.buffer,
            source: &mut self.source,
            boundary,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationResponseMessage {
            status,
            headers: pending.headers,
            content_id: pending.content_id,
            body,
        })
    }

    fn create_json_response(&mut self) -> Result<OperationResponseMessage<'_, S>, Error> {
        let json = json_mut(&mut self.format);
        let pending = json.pending.take().ok_or(Error::InvalidReaderState)?;
        let item = json.responses[pending.index].clone();

        self.sub_state = OperationSubState::MessageCreated;
        let body = BodySourceHolder::Json {
            bytes: item.body,
            sub_state: &mut self.sub_state,
        };
        Ok(OperationResponseMessage {
            status: item.status,
            headers: item.headers,
            content_id: item.id,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn settings() -> BatchReaderSettings {
        BatchReaderSettings::new()
    }

    #[test]
    fn empty_mime_batch_completes_immediately() {
        let body = b"--batch_1--\r\n".to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "multipart/mixed; boundary=batch_1", settings())
                .unwrap();
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Completed);
    }

    #[test]
    fn single_standalone_operation() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "GET /Customers HTTP/1.1\r\n",
            "\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "multipart/mixed; boundary=batch_1", settings())
                .unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Operation);
        let msg = reader.create_operation_request().unwrap();
        assert_eq!(msg.method(), HttpMethod::Get);
        assert_eq!(msg.uri(), "/Customers");
        drop(msg);
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Completed);
    }

    #[test]
    fn changeset_cross_reference() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
            "\r\n",
            "--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 1\r\n",
            "\r\n",
            "POST /Customers HTTP/1.1\r\n",
            "\r\n",
            "{\"Name\":\"A\"}",
            "\r\n--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 2\r\n",
            "\r\n",
            "POST $1/Orders HTTP/1.1\r\n",
            "\r\n",
            "\r\n--changeset_1--\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "multipart/mixed; boundary=batch_1", settings())
                .unwrap();

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::ChangesetStart);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Operation);
        {
            let msg = reader.create_operation_request().unwrap();
            assert_eq!(msg.content_id(), Some("1"));
            assert_eq!(msg.uri(), "/Customers");
            let mut stream = msg.open_body();
            assert_eq!(stream.read_to_end().unwrap(), b"{\"Name\":\"A\"}");
        }

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Operation);
        {
            let msg = reader.create_operation_request().unwrap();
            assert_eq!(msg.uri(), "/Customers/Orders");
        }

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::ChangesetEnd);
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Completed);
    }

    #[test]
    fn get_inside_changeset_rejected() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
            "\r\n",
            "--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 1\r\n",
            "\r\n",
            "GET /Customers HTTP/1.1\r\n",
            "\r\n",
            "\r\n--changeset_1--\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "multipart/mixed; boundary=batch_1", settings())
                .unwrap();
        reader.advance().unwrap();
        reader.advance().unwrap();
        let err = reader.create_operation_request().unwrap_err();
        assert!(matches!(err, Error::QueryMethodInChangeset { .. }));
    }

    #[test]
    fn json_group_and_depends_on() {
        let body = br#"{"requests":[
            {"id":"r1","method":"POST","url":"/A","atomicityGroup":"g1"},
            {"id":"r2","method":"POST","url":"/B","atomicityGroup":"g1","dependsOn":["r1"]},
            {"id":"r3","method":"GET","url":"/C","dependsOn":["g1"]}
        ]}"#
        .to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "application/json", settings()).unwrap();

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::ChangesetStart);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Operation);
        let msg = reader.create_operation_request().unwrap();
        assert_eq!(msg.content_id(), Some("r1"));
        drop(msg);

        assert!(reader.advance().unwrap());
        let msg = reader.create_operation_request().unwrap();
        assert_eq!(msg.depends_on(), &["r1".to_string()]);
        drop(msg);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::ChangesetEnd);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Operation);
        let msg = reader.create_operation_request().unwrap();
        assert_eq!(msg.depends_on(), &["r1".to_string(), "r2".to_string()]);
        drop(msg);

        assert!(!reader.advance().unwrap());
        assert_eq!(reader.state(), ReaderState::Completed);
    }

    #[test]
    fn json_self_group_reference_rejected() {
        let body =
            br#"{"requests":[{"id":"r1","method":"POST","url":"/A","atomicityGroup":"g1","dependsOn":["g1"]}]}"#
                .to_vec();
        let mut reader =
            BatchReader::open_request(Cursor::new(body), "application/json", settings()).unwrap();
        reader.advance().unwrap();
        reader.advance().unwrap();
        let err = reader.create_operation_request().unwrap_err();
        assert!(matches!(err, Error::SelfGroupReference(_, _)));
    }

    #[test]
    fn quota_exceeded_on_third_changeset_operation() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
            "\r\n",
            "--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 1\r\n",
            "\r\n",
            "POST /A HTTP/1.1\r\n",
            "\r\n",
            "\r\n--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 2\r\n",
            "\r\n",
            "POST /B HTTP/1.1\r\n",
            "\r\n",
            "\r\n--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 3\r\n",
            "\r\n",
            "POST /C HTTP/1.1\r\n",
            "\r\n",
            "\r\n--changeset_1--\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let mut reader = BatchReader::open_request(
            Cursor::new(body),
            "multipart/mixed; boundary=batch_1",
            BatchReaderSettings::new().max_operations_per_changeset(2),
        )
        .unwrap();
        reader.advance().unwrap();
        reader.advance().unwrap();
        reader.create_operation_request().unwrap();
        reader.advance().unwrap();
        reader.create_operation_request().unwrap();
        let err = reader.advance().unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
    }

    #[test]
    fn base_uri_rebases_relative_request_uri() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "GET /Customers HTTP/1.1\r\n",
            "\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let base = url::Url::parse("https://service.example.com/odata/").unwrap();
        let mut reader = BatchReader::open_request(
            Cursor::new(body),
            "multipart/mixed; boundary=batch_1",
            BatchReaderSettings::new().base_uri(base),
        )
        .unwrap();
        reader.advance().unwrap();
        let msg = reader.create_operation_request().unwrap();
        assert_eq!(msg.uri(), "https://service.example.com/Customers");
    }

    #[test]
    fn legacy_content_id_disallowed_is_ignored() {
        let body = concat!(
            "--batch_1\r\n",
            "Content-Type: multipart/mixed; boundary=changeset_1\r\n",
            "\r\n",
            "--changeset_1\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "POST /A HTTP/1.1\r\n",
            "Content-ID: 1\r\n",
            "\r\n",
            "\r\n--changeset_1--\r\n",
            "--batch_1--\r\n",
        )
        .as_bytes()
        .to_vec();
        let mut reader = BatchReader::open_request(
            Cursor::new(body),
            "multipart/mixed; boundary=batch_1",
            BatchReaderSettings::new().disallow_legacy_content_id_in_http_headers(),
        )
        .unwrap();
        reader.advance().unwrap();
        reader.advance().unwrap();
        let err = reader.create_operation_request().unwrap_err();
        assert!(matches!(err, Error::MissingContentId));
    }
}
