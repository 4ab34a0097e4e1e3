//! Response model and wire serialization.

use super::headers::ResponseHeaders;
use super::status::Status;

/// A response ready to be written to the wire.
#[derive(Debug, Clone)]
pub struct Response {
    /// The numeric status code to emit.
    pub status_code: u16,
    /// The reason phrase to emit.
    pub reason: String,
    /// Response headers, emitted with whatever casing was set.
    pub headers: ResponseHeaders,
    /// The response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Builds a response from one of the server's own statuses, with an empty body.
    pub fn new(status: Status) -> Self {
        Response {
            status_code: status.code(),
            reason: status.reason().to_string(),
            headers: ResponseHeaders::new(),
            body: Vec::new(),
        }
    }

    /// Sets the body, replacing whatever was there.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets a header, overwriting any existing header with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Serializes the response to its wire form: status line, headers (`Content-Length` and
    /// `Connection` filled in if absent), a blank line, then the body.
    ///
    /// ```
    /// # use statily::http::response::Response;
    /// # use statily::http::status::Status;
    /// let resp = Response::new(Status::Ok).with_body(b"Hello!".to_vec());
    /// let wire = resp.serialize();
    /// assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status_code, self.reason).as_bytes());

        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.headers.contains("Content-Length") {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        if !self.headers.contains("Connection") {
            out.extend_from_slice(b"Connection: close\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_fills_in_content_length_and_connection_when_absent() {
        let resp = Response::new(Status::Ok).with_body(b"Hello!".to_vec());
        let wire = String::from_utf8(resp.serialize()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Length: 6\r\n"));
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.ends_with("Hello!"));
    }

    #[test]
    fn serialize_does_not_override_explicit_headers() {
        let mut resp = Response::new(Status::Ok).with_body(b"x".to_vec());
        resp.set_header("Connection", "keep-alive");
        let wire = String::from_utf8(resp.serialize()).unwrap();
        assert!(wire.contains("Connection: keep-alive\r\n"));
        assert!(!wire.contains("Connection: close"));
    }

    #[test]
    fn head_response_can_report_a_length_with_empty_body() {
        let mut resp = Response::new(Status::Ok);
        resp.set_header("Content-Length", "6");
        let wire = String::from_utf8(resp.serialize()).unwrap();
        assert!(wire.contains("Content-Length: 6\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }
}
