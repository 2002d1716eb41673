//! Streaming reader for OData v4 `$batch` messages.
//!
//! This crate decomposes a composite OData batch payload — either classical
//! MIME `multipart/mixed` batching or the newer JSON batch format — into its
//! constituent sub-requests or sub-responses. The reader is pull-driven: the
//! caller repeatedly calls [`reader::BatchReader::advance`] (or its async
//! counterpart, [`reader::AsyncBatchReader::advance`]) and inspects
//! [`reader::ReaderState`] to decide what to do next. No speculative parsing
//! happens beyond what the current state requires, which is what lets a
//! caller bound memory use even over a batch with large embedded payloads.
//!
//! ```text
//! Initial -> ChangesetStart? -> Operation* -> ChangesetEnd? -> ... -> Completed
//! ```
//!
//! Both MIME changesets and JSON `atomicityGroup`s are surfaced through the
//! same `ChangesetStart`/`ChangesetEnd` pair, so application code written
//! against this event stream does not need to know which wire format it is
//! reading.
//!
//! This crate is the *core* of a batch reader: it does not know about the
//! Entity Data Model, OData query options, entity payload serialization, or
//! any particular HTTP client. It consumes a byte stream (or, for JSON
//! batches, a slice) and a settings object, and produces
//! [`message::OperationRequestMessage`] / [`message::OperationResponseMessage`]
//! values with headers and a bounded body stream.
//!
//! # Example
//!
//! ```no_run
//! use odata_batch::{BatchReader, BatchReaderSettings, ReaderState};
//! use std::io::Cursor;
//!
//! # fn run(body: Vec<u8>) -> Result<(), odata_batch::Error> {
//! let mut reader = BatchReader::open_request(
//!     Cursor::new(body),
//!     "multipart/mixed; boundary=batch_1",
//!     BatchReaderSettings::new(),
//! )?;
//!
//! while reader.advance()? {
//!     if reader.state() == ReaderState::Operation {
//!         let msg = reader.create_operation_request()?;
//!         let uri = msg.uri().to_string();
//!         let mut body = msg.open_body();
//!         let bytes = body.read_to_end()?;
//!         println!("{uri}: {} body bytes", bytes.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod atomicity;
pub mod error;
mod framing;
pub mod headers;
mod json;
pub mod message;
mod mime;
pub mod reader;
mod resolver;
pub mod settings;
pub mod source;

pub use error::Error;
pub use message::{HttpMethod, OperationRequestMessage, OperationResponseMessage};
pub use reader::{AsyncBatchReader, BatchReader, ReaderState};
pub use settings::BatchReaderSettings;
pub use source::{AsyncByteSource, ByteSource};
