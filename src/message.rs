//! Per-operation request/response messages and their bounded body streams.
//!
//! A message borrows the reader it came from for as long as its body stream
//! might still be read. This is deliberate: the borrow checker is the
//! enforcement mechanism for "only one live body stream at a time" and "no
//! `advance()` while a stream is open" — the façade's `advance()` takes
//! `&mut self`, so it simply cannot be called while a message borrowed from
//! it is still alive. [`crate::reader::OperationSubState`] is kept as a
//! runtime backstop for the cases the type system can't see through (e.g. a
//! caller forgetting to call `open_body()` at all before the next
//! `advance()`).

use std::io::Read;

use crate::error::Error;
use crate::framing::FrameBuffer;
use crate::headers::HeaderMap;
use crate::reader::OperationSubState;
use crate::source::{AsyncByteSource, ByteSource};

/// HTTP methods recognized inside an OData batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Merge,
}

impl HttpMethod {
    pub(crate) fn parse(token: &str) -> Result<Self, Error> {
        match token {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "MERGE" => Ok(Self::Merge),
            other => Err(Error::InvalidHttpMethod(other.to_string())),
        }
    }

    /// True for the query methods that are forbidden inside a changeset.
    pub fn is_query_method(&self) -> bool {
        matches!(self, Self::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
        }
    }
}

/// Where a message's body bytes come from.
pub(crate) enum BodySource<'a, Src> {
    /// Bytes live on the wire, bounded by the next MIME boundary.
    Mime {
        buffer: &'a mut FrameBuffer,
        source: &'a mut Src,
        boundary: String,
    },
    /// Bytes were already buffered in memory (JSON `body` snapshot).
    Json { bytes: Vec<u8>, pos: usize },
    /// No body (absent `body` property, or an empty MIME part).
    Empty,
}

/// A bounded view over one operation's body, borrowed from the reader for
/// as long as it is alive.
pub struct BodyStream<'a, Src> {
    pub(crate) inner: BodySource<'a, Src>,
    pub(crate) sub_state: &'a mut OperationSubState,
    pub(crate) done: bool,
}

impl<'a, Src: ByteSource> BodyStream<'a, Src> {
    /// Reads the next chunk of the body, up to `max_len` bytes. An empty
    /// result means the body is fully consumed.
    pub fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        if self.done {
            return Ok(Vec::new());
        }
        *self.sub_state = OperationSubState::StreamRequested;
        let chunk = match &mut self.inner {
            BodySource::Mime {
                buffer,
                source,
                boundary,
            } => {
                let mut out = Vec::new();
                let n = buffer.drive_sync(*source, |f| f.bounded_read(boundary, max_len, &mut out))?;
                if n == 0 {
                    self.done = true;
                }
                out
            }
            BodySource::Json { bytes, pos } => {
                let end = (*pos + max_len).min(bytes.len());
                let chunk = bytes[*pos..end].to_vec();
                *pos = end;
                if *pos >= bytes.len() {
                    self.done = true;
                }
                chunk
            }
            BodySource::Empty => {
                self.done = true;
                Vec::new()
            }
        };
        if self.done {
            *self.sub_state = OperationSubState::StreamDisposed;
        }
        Ok(chunk)
    }

    /// Reads the entire body into a single `Vec<u8>`.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut all = Vec::new();
        loop {
            let chunk = self.read_chunk(64 * 1024)?;
            if chunk.is_empty() {
                break;
            }
            all.extend_from_slice(&chunk);
        }
        Ok(all)
    }
}

impl<'a, Src: ByteSource> Read for BodyStream<'a, Src> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let chunk = self
            .read_chunk(buf.len())
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

/// Async counterpart to [`BodyStream`]. Exposes the same chunked pull API;
/// it does not implement `tokio::io::AsyncRead` directly, since this crate
/// only needs a bounded byte-chunk pull, not a general async-IO adapter.
pub struct AsyncBodyStream<'a, Src> {
    pub(crate) inner: BodySource<'a, Src>,
    pub(crate) sub_state: &'a mut OperationSubState,
    pub(crate) done: bool,
}

impl<'a, Src: AsyncByteSource> AsyncBodyStream<'a, Src> {
    /// Async counterpart to [`BodyStream::read_chunk`].
    pub async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        if self.done {
            return Ok(Vec::new());
        }
        *self.sub_state = OperationSubState::StreamRequested;
        let chunk = match &mut self.inner {
            BodySource::Mime {
                buffer,
                source,
                boundary,
            } => {
                let mut out = Vec::new();
                let n = buffer
                    .drive_async(*source, |f| f.bounded_read(boundary, max_len, &mut out))
                    .await?;
                if n == 0 {
                    self.done = true;
                }
                out
            }
            BodySource::Json { bytes, pos } => {
                let end = (*pos + max_len).min(bytes.len());
                let chunk = bytes[*pos..end].to_vec();
                *pos = end;
                if *pos >= bytes.len() {
                    self.done = true;
                }
                chunk
            }
            BodySource::Empty => {
                self.done = true;
                Vec::new()
            }
        };
        if self.done {
            *self.sub_state = OperationSubState::StreamDisposed;
        }
        Ok(chunk)
    }

    /// Async counterpart to [`BodyStream::read_to_end`].
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut all = Vec::new();
        loop {
            let chunk = self.read_chunk(64 * 1024).await?;
            if chunk.is_empty() {
                break;
            }
            all.extend_from_slice(&chunk);
        }
        Ok(all)
    }
}

/// A single sub-request inside a batch.
pub struct OperationRequestMessage<'a, Src> {
    pub(crate) method: HttpMethod,
    pub(crate) uri: String,
    pub(crate) headers: HeaderMap,
    pub(crate) content_id: Option<String>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) body: BodySourceHolder<'a, Src>,
}

/// Holds the borrowed pieces needed to open a body stream; kept distinct
/// from `BodyStream` itself so a message can be inspected (method/uri/
/// headers) without forcing body access.
pub(crate) enum BodySourceHolder<'a, Src> {
    Mime {
        buffer: &'a mut FrameBuffer,
        source: &'a mut Src,
        boundary: String,
        sub_state: &'a mut OperationSubState,
    },
    Json {
        bytes: Vec<u8>,
        sub_state: &'a mut OperationSubState,
    },
    Empty {
        sub_state: &'a mut OperationSubState,
    },
}

impl<'a, Src> OperationRequestMessage<'a, Src> {
    /// The HTTP method, already validated against the recognized set.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The request URI, resolved against `BaseUri`/Content-ID references
    /// per the owning reader's rules.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The request's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// This request's own `Content-ID`, if it declared one.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Flattened prior-request ids this request depends on (JSON batches
    /// only; always empty for MIME batches, which have no `dependsOn`).
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
}

impl<'a, Src: ByteSource> OperationRequestMessage<'a, Src> {
    /// Opens the bounded body stream. Can be called at most once; calling
    /// it again after the first stream is dropped returns a fresh empty
    /// read (the underlying bytes were already consumed).
    pub fn open_body(self) -> BodyStream<'a, Src> {
        into_body_stream(self.body)
    }
}

impl<'a, Src: AsyncByteSource> OperationRequestMessage<'a, Src> {
    /// Async counterpart to [`Self::open_body`].
    pub fn open_body_async(self) -> AsyncBodyStream<'a, Src> {
        into_async_body_stream(self.body)
    }
}

/// A single sub-response inside a batch.
pub struct OperationResponseMessage<'a, Src> {
    pub(crate) status: u16,
    pub(crate) headers: HeaderMap,
    pub(crate) content_id: Option<String>,
    pub(crate) body: BodySourceHolder<'a, Src>,
}

impl<'a, Src> OperationResponseMessage<'a, Src> {
    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `Content-ID`, present or synthesized (see crate docs on JSON
    /// response id synthesis); never registered in the URL resolver.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }
}

impl<'a, Src: ByteSource> OperationResponseMessage<'a, Src> {
    /// Opens the bounded body stream, as for [`OperationRequestMessage::open_body`].
    pub fn open_body(self) -> BodyStream<'a, Src> {
        into_body_stream(self.body)
    }
}

impl<'a, Src: AsyncByteSource> OperationResponseMessage<'a, Src> {
    /// Async counterpart to [`Self::open_body`].
    pub fn open_body_async(self) -> AsyncBodyStream<'a, Src> {
        into_async_body_stream(self.body)
    }
}

fn into_body_stream<Src>(holder: BodySourceHolder<'_, Src>) -> BodyStream<'_, Src> {
    match holder {
        BodySourceHolder::Mime {
            buffer,
            source,
            boundary,
            sub_state,
        } => BodyStream {
            inner: BodySource::Mime {
                buffer,
                source,
                boundary,
            },
            sub_state,
            done: false,
        },
        BodySourceHolder::Json { bytes, sub_state } => BodyStream {
            inner: BodySource::Json { bytes, pos: 0 },
            sub_state,
            done: false,
        },
        BodySourceHolder::Empty { sub_state } => BodyStream {
            inner: BodySource::Empty,
            sub_state,
            done: true,
        },
    }
}

fn into_async_body_stream<Src>(holder: BodySourceHolder<'_, Src>) -> AsyncBodyStream<'_, Src> {
    match holder {
        BodySourceHolder::Mime {
            buffer,
            source,
            boundary,
            sub_state,
        } => AsyncBodyStream {
            inner: BodySource::Mime {
                buffer,
                source,
                boundary,
            },
            sub_state,
            done: false,
        },
        BodySourceHolder::Json { bytes, sub_state } => AsyncBodyStream {
            inner: BodySource::Json { bytes, pos: 0 },
            sub_state,
            done: false,
        },
        BodySourceHolder::Empty { sub_state } => AsyncBodyStream {
            inner: BodySource::Empty,
            sub_state,
            done: true,
        },
    }
}
