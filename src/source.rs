//! Byte-source abstractions.
//!
//! The reader's internal scanning logic (see [`crate::framing`]) is pure —
//! it only ever inspects bytes already sitting in a buffer. These two traits
//! are the only place I/O actually happens, which is what lets
//! [`crate::reader::BatchReader`] (blocking) and
//! [`crate::reader::AsyncBatchReader`] (tokio) share one state machine: the
//! async variant never awaits anything except a call through
//! [`AsyncByteSource`].

use async_trait::async_trait;
use std::io::Read;

/// A blocking source of bytes, e.g. a file, a `TcpStream`, or an in-memory
/// buffer.
///
/// Any `std::io::Read` implementor gets this for free via the blanket impl
/// below.
pub trait ByteSource {
    /// Reads at least one more byte into `buf`, appending to it. Returns the
    /// number of bytes appended; `0` means end of stream.
    fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize>;
}

impl<R: Read> ByteSource for R {
    fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        let mut chunk = [0u8; 8192];
        let n = self.read(&mut chunk)?;
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

/// An async source of bytes, e.g. a `tokio::net::TcpStream` or an HTTP
/// response body bridged onto `AsyncRead`.
#[async_trait]
pub trait AsyncByteSource: Send {
    /// Async counterpart to [`ByteSource::read_more`].
    async fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize>;
}

#[async_trait]
impl<R> AsyncByteSource for R
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    async fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        use tokio::io::AsyncReadExt;
        let mut chunk = [0u8; 8192];
        let n = self.read(&mut chunk).await?;
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}
