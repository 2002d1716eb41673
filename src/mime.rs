//! Component C support — parsing helpers for the per-part HTTP framing
//! inside a MIME `application/http` part.
//!
//! The state machine itself lives in [`crate::reader`] (see the design note
//! in that module on why there is no separate `MimeDriver` type); this
//! module holds the pure, I/O-free line-parsing rules so the sync and
//! async `advance()` implementations can share them verbatim.

use crate::error::Error;
use crate::message::HttpMethod;

/// Parses a request line: `METHOD SP URI SP HTTP/1.1`. URIs may themselves
/// contain spaces, so the line is split on its first and last space tokens
/// rather than naively on whitespace.
pub(crate) fn parse_request_line(line: &str) -> Result<(HttpMethod, String), Error> {
    let first_space = line
        .find(' ')
        .ok_or_else(|| Error::InvalidRequestLine(line.to_string()))?;
    let method_token = &line[..first_space];
    let rest = &line[first_space + 1..];
    let last_space = rest
        .rfind(' ')
        .ok_or_else(|| Error::InvalidRequestLine(line.to_string()))?;
    let uri = &rest[..last_space];
    let version = &rest[last_space + 1..];

    if version != "HTTP/1.1" {
        return Err(Error::InvalidHttpVersion {
            found: Some(version.to_string()),
        });
    }
    if uri.is_empty() {
        return Err(Error::InvalidRequestLine(line.to_string()));
    }

    let method = HttpMethod::parse(&method_token.to_ascii_uppercase())?;
    Ok((method, uri.to_string()))
}

/// Parses a status line: `HTTP/1.1 SP <code> SP <reason>`.
pub(crate) fn parse_status_line(line: &str) -> Result<u16, Error> {
    let (version, rest) = line
        .split_once(' ')
        .ok_or_else(|| Error::InvalidResponseLine(line.to_string()))?;
    if version != "HTTP/1.1" {
        return Err(Error::InvalidHttpVersion {
            found: Some(version.to_string()),
        });
    }
    let (code, _reason) = rest.split_once(' ').unwrap_or((rest, ""));
    code.trim()
        .parse::<u16>()
        .map_err(|_| Error::InvalidResponseLine(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_with_spaces_in_uri() {
        let (method, uri) = parse_request_line("GET /Products('a b') HTTP/1.1").unwrap();
        assert_eq!(method, HttpMethod::Get);
        assert_eq!(uri, "/Products('a b')");
    }

    #[test]
    fn rejects_non_http_1_1_request() {
        assert!(parse_request_line("GET / HTTP/1.0").is_err());
    }

    #[test]
    fn parses_status_line() {
        let status = parse_status_line("HTTP/1.1 201 Created").unwrap();
        assert_eq!(status, 201);
    }

    #[test]
    fn rejects_bad_status_line() {
        assert!(parse_status_line("HTTP/1.1").is_err());
    }
}
