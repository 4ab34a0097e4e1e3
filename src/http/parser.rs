//! Incremental HTTP/1.1 request parser.
//!
//! The parser runs over whatever bytes a connection has accumulated so far. It never blocks and
//! never assumes the buffer holds a whole request: on anything short of a complete request it
//! reports [`Status::Partial`] rather than failing, so the caller can read more bytes and retry.
//! On success it reports exactly how many bytes the request consumed, so pipelined requests can
//! be peeled off one at a time.

use thiserror::Error;

use super::headers::RequestHeaders;
use super::method::Method;
use super::request::Request;

/// Header section size ceiling: bytes up to and including the terminating `CRLFCRLF`.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;
/// Declared body size ceiling.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Request target length ceiling.
pub const MAX_URI_BYTES: usize = 2048;

/// Failure modes of [`parse`]. Each maps to a 400 response at the connection layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The request line did not split into exactly method, target, version on spaces.
    #[error("malformed request line")]
    MalformedRequestLine,
    /// The request target exceeded [`MAX_URI_BYTES`].
    #[error("request target too long")]
    UriTooLong,
    /// The request line's version was not the literal `HTTP/1.1`.
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    /// A header line had no `:` separator.
    #[error("malformed header line")]
    MalformedHeaderLine,
    /// The header section exceeded [`MAX_HEADER_BYTES`].
    #[error("header section too large")]
    HeaderTooLarge,
    /// The declared `Content-Length` exceeded [`MAX_BODY_BYTES`].
    #[error("request body too large")]
    BodyTooLarge,
}

/// Result of a parse attempt over a byte window.
#[derive(Debug)]
pub enum Status {
    /// The buffer does not yet hold a complete request; the caller should read more bytes.
    Partial,
    /// A complete request was parsed. `consumed` bytes should be drained from the caller's
    /// buffer before the next call.
    Complete {
        /// The parsed request.
        request: Request,
        /// The number of leading bytes of the input this request consumed.
        consumed: usize,
    },
}

/// Parses a single HTTP/1.1 request from the front of `buf`.
///
/// See [`Status`] and [`ParseError`] for the three possible outcomes. Calling `parse` again on
/// the same bytes, or on the same bytes with more appended, is always safe: a `Partial` result
/// never consumes anything, and a `Complete` result is deterministic given the same prefix.
pub fn parse(buf: &[u8]) -> Result<Status, ParseError> {
    let Some(header_end) = find_subslice(buf, b"\r\n\r\n") else {
        if buf.len() > MAX_HEADER_BYTES {
            return Err(ParseError::HeaderTooLarge);
        }
        return Ok(Status::Partial);
    };
    if header_end + 4 > MAX_HEADER_BYTES {
        return Err(ParseError::HeaderTooLarge);
    }

    let request_line_end = match find_crlf(buf, 0) {
        Some(end) => end,
        None => return Ok(Status::Partial),
    };
    let (method, uri, version) = parse_request_line(&buf[..request_line_end])?;

    let mut headers = RequestHeaders::new();
    let mut cursor = request_line_end + 2;
    let mut last_header: Option<String> = None;
    while cursor < header_end {
        let line_end = match find_crlf(buf, cursor) {
            Some(end) if end <= header_end => end,
            _ => return Ok(Status::Partial),
        };
        let line = &buf[cursor..line_end];
        cursor = line_end + 2;

        if line.is_empty() {
            break;
        }

        if line[0] == b' ' || line[0] == b'\t' {
            if let Some(ref name) = last_header {
                let continuation = trim_ascii(line);
                headers.append(name, &String::from_utf8_lossy(continuation));
            }
            continue;
        }

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return Err(ParseError::MalformedHeaderLine);
        };
        let name = String::from_utf8_lossy(trim_ascii(&line[..colon])).to_ascii_lowercase();
        let value = String::from_utf8_lossy(trim_ascii(&line[colon + 1..])).to_string();
        headers.set(&name, value);
        last_header = Some(name);
    }

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES {
        return Err(ParseError::BodyTooLarge);
    }

    let body_offset = header_end + 4;
    let consumed = body_offset + content_length;
    if buf.len() < consumed {
        return Ok(Status::Partial);
    }

    let request = Request {
        method,
        uri,
        version,
        headers,
        body: buf[body_offset..consumed].to_vec(),
    };

    Ok(Status::Complete { request, consumed })
}

fn parse_request_line(line: &[u8]) -> Result<(Method, String, &'static str), ParseError> {
    let first_space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or(ParseError::MalformedRequestLine)?;
    let second_space = line[first_space + 1..]
        .iter()
        .position(|&b| b == b' ')
        .map(|p| p + first_space + 1)
        .ok_or(ParseError::MalformedRequestLine)?;

    let method_token =
        std::str::from_utf8(&line[..first_space]).map_err(|_| ParseError::MalformedRequestLine)?;
    let uri = std::str::from_utf8(&line[first_space + 1..second_space])
        .map_err(|_| ParseError::MalformedRequestLine)?;
    let version_token = std::str::from_utf8(&line[second_space + 1..])
        .map_err(|_| ParseError::MalformedRequestLine)?;

    if uri.len() > MAX_URI_BYTES {
        return Err(ParseError::UriTooLong);
    }
    if version_token != "HTTP/1.1" {
        return Err(ParseError::UnsupportedVersion);
    }

    Ok((Method::parse(method_token), uri.to_string(), "HTTP/1.1"))
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    find_subslice(&buf[from..], b"\r\n").map(|p| p + from)
}

fn find_subslice(buf: &[u8], needle: &[u8]) -> Option<usize> {
    buf.windows(needle.len()).position(|w| w == needle)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map(|p| p + 1).unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buf: &[u8]) -> (Request, usize) {
        match parse(buf).expect("expected a successful parse") {
            Status::Complete { request, consumed } => (request, consumed),
            Status::Partial => panic!("expected Complete, got Partial"),
        }
    }

    #[test]
    fn parses_a_simple_get_request() {
        let (req, consumed) = complete(b"GET /hello.txt HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(Method::Get, req.method);
        assert_eq!("/hello.txt", req.uri);
        assert_eq!("HTTP/1.1", req.version);
        assert_eq!(consumed, b"GET /hello.txt HTTP/1.1\r\nHost: x\r\n\r\n".len());
    }

    #[test]
    fn reports_partial_when_header_terminator_is_missing() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\nHost: x\r\n"), Ok(Status::Partial)));
    }

    #[test]
    fn reports_partial_when_declared_body_is_not_fully_present() {
        let buf = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        assert!(matches!(parse(buf), Ok(Status::Partial)));
    }

    #[test]
    fn parses_a_declared_body() {
        let buf = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let (req, consumed) = complete(buf);
        assert_eq!(b"hello".to_vec(), req.body);
        assert_eq!(buf.len(), consumed);
    }

    #[test]
    fn missing_content_length_means_empty_body() {
        let (req, _) = complete(b"GET / HTTP/1.1\r\n\r\n");
        assert!(req.body.is_empty());
    }

    #[test]
    fn unparseable_content_length_is_treated_as_zero() {
        let buf = b"GET / HTTP/1.1\r\nContent-Length: not-a-number\r\n\r\n";
        let (req, consumed) = complete(buf);
        assert!(req.body.is_empty());
        assert_eq!(buf.len(), consumed);
    }

    #[test]
    fn rejects_request_line_with_too_few_spaces() {
        assert_eq!(
            Err(ParseError::MalformedRequestLine),
            parse(b"GET /\r\n\r\n").map(|_| ())
        );
    }

    #[test]
    fn rejects_uri_over_limit() {
        let long_uri = "/".to_string() + &"a".repeat(MAX_URI_BYTES);
        let buf = format!("GET {long_uri} HTTP/1.1\r\n\r\n");
        assert_eq!(Err(ParseError::UriTooLong), parse(buf.as_bytes()).map(|_| ()));
    }

    #[test]
    fn rejects_non_http_1_1_version() {
        assert_eq!(
            Err(ParseError::UnsupportedVersion),
            parse(b"GET / HTTP/1.0\r\n\r\n").map(|_| ())
        );
    }

    #[test]
    fn rejects_header_line_without_colon() {
        assert_eq!(
            Err(ParseError::MalformedHeaderLine),
            parse(b"GET / HTTP/1.1\r\nnocolon\r\n\r\n").map(|_| ())
        );
    }

    #[test]
    fn rejects_oversize_header_section() {
        let mut buf = b"GET / HTTP/1.1\r\n".to_vec();
        for _ in 0..2000 {
            buf.extend_from_slice(b"X: y\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        assert_eq!(Err(ParseError::HeaderTooLarge), parse(&buf).map(|_| ()));
    }

    #[test]
    fn rejects_oversize_declared_body() {
        let buf = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_BYTES + 1
        );
        assert_eq!(Err(ParseError::BodyTooLarge), parse(buf.as_bytes()).map(|_| ()));
    }

    #[test]
    fn obs_fold_continuation_is_appended_with_single_space() {
        let buf = b"GET / HTTP/1.1\r\nX-Multi: line one\r\n line two\r\n\r\n";
        let (req, _) = complete(buf);
        assert_eq!(Some("line one line two"), req.headers.get("x-multi"));
    }

    #[test]
    fn obs_fold_continuation_with_no_prior_header_is_dropped_silently() {
        let buf = b"GET / HTTP/1.1\r\n continuation\r\nHost: x\r\n\r\n";
        let (req, _) = complete(buf);
        assert_eq!(Some("x"), req.headers.get("host"));
    }

    #[test]
    fn later_duplicate_header_overwrites_earlier() {
        let buf = b"GET / HTTP/1.1\r\nX-Foo: first\r\nX-Foo: second\r\n\r\n";
        let (req, _) = complete(buf);
        assert_eq!(Some("second"), req.headers.get("x-foo"));
    }

    #[test]
    fn framing_leaves_the_second_pipelined_request_untouched() {
        let a = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        let b = b"GET /b HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        let mut both = a.clone();
        both.extend_from_slice(&b);

        let (req, consumed) = complete(&both);
        assert_eq!("/a", req.uri);
        assert_eq!(a.len(), consumed);
        assert_eq!(&b[..], &both[consumed..]);
    }

    #[test]
    fn parse_is_idempotent_on_the_same_buffer() {
        let buf = b"GET /hello.txt HTTP/1.1\r\nHost: x\r\n\r\n";
        let (first, first_consumed) = complete(buf);
        let (second, second_consumed) = complete(buf);
        assert_eq!(first_consumed, second_consumed);
        assert_eq!(first.uri, second.uri);
    }
}
