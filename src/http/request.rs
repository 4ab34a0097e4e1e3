//! Parsed HTTP/1.1 request.

use super::headers::RequestHeaders;
use super::method::Method;

/// A fully parsed HTTP/1.1 request.
///
/// Fields are owned rather than borrowed from the connection's read buffer: a request produced by
/// the parser must be able to outlive the byte range it was parsed from, since in pool mode it
/// crosses into a work-stealing queue as part of a `'static` task closure.
#[derive(Debug, Clone)]
pub struct Request {
    /// The request method.
    pub method: Method,
    /// The request target, exactly as written on the wire (path and optional query string).
    pub uri: String,
    /// Always `HTTP/1.1` — the parser rejects anything else.
    pub version: &'static str,
    /// Headers, keyed case-insensitively.
    pub headers: RequestHeaders,
    /// The request body, if `Content-Length` declared one.
    pub body: Vec<u8>,
}

impl Request {
    /// True iff the connection should be kept open after this request: an explicit
    /// `Connection: keep-alive` header, or no `Connection` header at all on an `HTTP/1.1`
    /// request.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) => value.eq_ignore_ascii_case("keep-alive"),
            None => self.version == "HTTP/1.1",
        }
    }
}
