//! Component A — byte-stream framing.
//!
//! Everything here is pure: it inspects bytes already sitting in
//! [`FrameBuffer`] and never performs I/O itself. [`FrameBuffer::drive_sync`]
//! and [`FrameBuffer::drive_async`] are the only two places a fill loop
//! exists; both call the exact same scanning functions, which is what keeps
//! the blocking and async readers' observable behavior identical.

use crate::error::Error;
use crate::source::{AsyncByteSource, ByteSource};

/// Result of one non-blocking attempt to make progress against whatever is
/// currently in the buffer.
pub(crate) enum Step<T> {
    /// Enough data was present to produce a result.
    Ready(T),
    /// Not enough data yet; the caller should fill the buffer and retry.
    NeedMore,
}

/// Outcome of [`FrameBuffer::skip_to_boundary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundaryMatch {
    /// True if the boundary line was the *end* boundary (`--boundary--`).
    pub is_end: bool,
    /// True if the boundary matched an enclosing (not current) scope,
    /// signaling an implicit close of the current changeset.
    pub is_parent: bool,
}

/// A growable byte buffer with a read cursor, fed by a [`ByteSource`] or
/// [`AsyncByteSource`].
pub(crate) struct FrameBuffer {
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl FrameBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::with_capacity(8192),
            pos: 0,
            eof: false,
        }
    }

    /// Drops already-consumed bytes from the front of the buffer so it does
    /// not grow without bound across a long-running batch.
    fn reclaim(&mut self) {
        if self.pos > 0 && self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos > 64 * 1024 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Runs `step` against the buffer, filling from `source` (blocking)
    /// whenever it reports [`Step::NeedMore`], until it is `Ready` or the
    /// source is exhausted with no progress possible.
    pub(crate) fn drive_sync<T>(
        &mut self,
        source: &mut dyn ByteSource,
        mut step: impl FnMut(&mut Self) -> Step<T>,
    ) -> Result<T, Error> {
        loop {
            match step(self) {
                Step::Ready(v) => {
                    self.reclaim();
                    return Ok(v);
                }
                Step::NeedMore => {
                    if self.eof {
                        return Err(Error::MalformedFraming(
                            "unexpected end of input".to_string(),
                        ));
                    }
                    let n = source.read_more(&mut self.buf)?;
                    if n == 0 {
                        self.eof = true;
                    }
                }
            }
        }
    }

    /// Async counterpart to [`Self::drive_sync`].
    pub(crate) async fn drive_async<T>(
        &mut self,
        source: &mut dyn AsyncByteSource,
        mut step: impl FnMut(&mut Self) -> Step<T>,
    ) -> Result<T, Error> {
        loop {
            match step(self) {
                Step::Ready(v) => {
                    self.reclaim();
                    return Ok(v);
                }
                Step::NeedMore => {
                    if self.eof {
                        return Err(Error::MalformedFraming(
                            "unexpected end of input".to_string(),
                        ));
                    }
                    let n = source.read_more(&mut self.buf).await?;
                    if n == 0 {
                        self.eof = true;
                    }
                }
            }
        }
    }

    /// Consumes and returns the next line (terminator stripped). `None`
    /// only at true end of stream with no trailing partial line.
    pub(crate) fn read_line(&mut self) -> Step<Option<String>> {
        match find_line_end(self.remaining(), self.eof) {
            None => {
                if self.eof {
                    Step::Ready(None)
                } else {
                    Step::NeedMore
                }
            }
            Some((content_len, total_len)) => {
                let start = self.pos;
                let line =
                    String::from_utf8_lossy(&self.buf[start..start + content_len]).into_owned();
                self.pos += total_len;
                Step::Ready(Some(line))
            }
        }
    }

    /// Skips any preamble and advances to the next boundary line for
    /// `boundary` (without the leading `--`). `parent_boundary`, if given,
    /// is also checked so a missing nested end-boundary can be detected as
    /// an implicit close.
    pub(crate) fn skip_to_boundary(
        &mut self,
        boundary: &str,
        parent_boundary: Option<&str>,
    ) -> Step<BoundaryMatch> {
        loop {
            match find_line_end(self.remaining(), self.eof) {
                None => {
                    return if self.eof {
                        // Ran out of input without ever seeing the boundary.
                        Step::Ready(BoundaryMatch {
                            is_end: true,
                            is_parent: false,
                        })
                    } else {
                        Step::NeedMore
                    };
                }
                Some((content_len, total_len)) => {
                    let start = self.pos;
                    let line = String::from_utf8_lossy(&self.buf[start..start + content_len])
                        .into_owned();
                    self.pos += total_len;

                    if let Some(is_end) = match_boundary(&line, boundary) {
                        return Step::Ready(BoundaryMatch {
                            is_end,
                            is_parent: false,
                        });
                    }
                    if let Some(parent) = parent_boundary {
                        if let Some(is_end) = match_boundary(&line, parent) {
                            // Rewind: the parent boundary line belongs to the
                            // enclosing scope, not to us; let it be re-read
                            // there.
                            self.pos = start;
                            return Step::Ready(BoundaryMatch {
                                is_end,
                                is_parent: true,
                            });
                        }
                    }
                    // Otherwise: preamble/epilogue content, discard and continue.
                }
            }
        }
    }

    /// Reads up to `limit` bytes of the current part's body into `dst`,
    /// stopping at (and not consuming) the next `--boundary` line. The
    /// single CRLF immediately preceding the boundary is not included in
    /// the body. Returns the number of bytes appended; `0` means the body
    /// is fully consumed.
    pub(crate) fn bounded_read(
        &mut self,
        boundary: &str,
        limit: usize,
        dst: &mut Vec<u8>,
    ) -> Step<usize> {
        let marker = format!("\r\n--{boundary}");
        let marker = marker.as_bytes();
        let hay = self.remaining();

        if let Some(idx) = find_subslice(hay, marker) {
            let take = idx.min(limit);
            dst.extend_from_slice(&hay[..take]);
            self.pos += take;
            return Step::Ready(take);
        }

        // No full match yet. We can safely emit everything except a
        // trailing window that could be a partial prefix of the marker.
        let safe_len = hay.len().saturating_sub(marker.len() - 1);
        if safe_len > 0 {
            let take = safe_len.min(limit);
            dst.extend_from_slice(&hay[..take]);
            self.pos += take;
            return Step::Ready(take);
        }

        if self.eof {
            // Tolerate a body that runs straight into EOF without a
            // trailing boundary (defensive; normally a framing error, but
            // emitting what remains is friendlier to a caller who only
            // wants the bytes).
            if !hay.is_empty() {
                let take = hay.len().min(limit);
                dst.extend_from_slice(&hay[..take]);
                self.pos += take;
                return Step::Ready(take);
            }
            return Step::Ready(0);
        }

        Step::NeedMore
    }
}

/// Finds the end of the first line in `hay`. Returns `(content_len,
/// total_len)` where `total_len` includes the terminator. A bare LF is
/// tolerated as a terminator but CRLF is preferred when present.
fn find_line_end(hay: &[u8], eof: bool) -> Option<(usize, usize)> {
    for i in 0..hay.len() {
        if hay[i] == b'\n' {
            if i > 0 && hay[i - 1] == b'\r' {
                return Some((i - 1, i + 1));
            }
            return Some((i, i + 1));
        }
    }
    if eof && !hay.is_empty() {
        // Truncated final line with no terminator: treat the remainder as
        // a complete line so trailing preambles/epilogues without a final
        // newline don't hang.
        return Some((hay.len(), hay.len()));
    }
    None
}

/// Checks whether `line` is a boundary line for `boundary`
/// (`--boundary` or `--boundary--`). Returns `Some(is_end)` on a match.
fn match_boundary(line: &str, boundary: &str) -> Option<bool> {
    let prefix = format!("--{boundary}");
    let rest = line.strip_prefix(&prefix)?;
    match rest {
        "" => Some(false),
        "--" => Some(true),
        _ => None,
    }
}

/// Naive substring search; batch boundaries and bodies are small enough in
/// practice that this need not be more than correct.
fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cursor<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> ByteSource for Cursor<'a> {
        fn read_more(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
            let chunk = &self.data[self.pos..];
            let take = chunk.len().min(4096);
            buf.extend_from_slice(&chunk[..take]);
            self.pos += take;
            Ok(take)
        }
    }

    #[test]
    fn reads_lines_across_crlf_and_lf() {
        let mut fb = FrameBuffer::new();
        let mut src = Cursor {
            data: b"a\r\nb\nc",
            pos: 0,
        };
        assert_eq!(
            fb.drive_sync(&mut src, |f| f.read_line()).unwrap(),
            Some("a".to_string())
        );
        assert_eq!(
            fb.drive_sync(&mut src, |f| f.read_line()).unwrap(),
            Some("b".to_string())
        );
        assert_eq!(
            fb.drive_sync(&mut src, |f| f.read_line()).unwrap(),
            Some("c".to_string())
        );
    }

    #[test]
    fn skip_to_boundary_discards_preamble() {
        let mut fb = FrameBuffer::new();
        let mut src = Cursor {
            data: b"preamble junk\r\n--b\r\n",
            pos: 0,
        };
        let m = fb
            .drive_sync(&mut src, |f| f.skip_to_boundary("b", None))
            .unwrap();
        assert!(!m.is_end);
        assert!(!m.is_parent);
    }

    #[test]
    fn skip_to_boundary_detects_end() {
        let mut fb = FrameBuffer::new();
        let mut src = Cursor {
            data: b"--b--\r\n",
            pos: 0,
        };
        let m = fb
            .drive_sync(&mut src, |f| f.skip_to_boundary("b", None))
            .unwrap();
        assert!(m.is_end);
    }

    #[test]
    fn bounded_read_stops_before_boundary() {
        let mut fb = FrameBuffer::new();
        let mut src = Cursor {
            data: b"hello world\r\n--b\r\n",
            pos: 0,
        };
        let mut out = Vec::new();
        loop {
            let n = fb
                .drive_sync(&mut src, |f| f.bounded_read("b", 1024, &mut out))
                .unwrap();
            if n == 0 {
                break;
            }
        }
        assert_eq!(out, b"hello world");
    }
}
