//! HTTP status codes used by the static file server.
//!
//! Unlike a general-purpose HTTP stack, this server only ever emits the handful of status codes
//! its own pipeline produces, so the full IANA registry is not modeled here.

use std::fmt::Display;

/// A response status code together with its canonical reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 15.3.1 — file served successfully.
    Ok,
    /// 15.5.1 — parse failure or oversize request.
    BadRequest,
    /// 15.5.5 — resolved path does not exist, or escapes the document root.
    NotFound,
    /// 15.5.6 — method other than GET/HEAD.
    MethodNotAllowed,
    /// 15.5.9 for this server's purposes: too many concurrent connections from one IP.
    TooManyRequests,
    /// 15.6.1 — read failure or oversize file.
    InternalServerError,
}

impl Status {
    /// The numeric status code.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::TooManyRequests => 429,
            Status::InternalServerError => 500,
        }
    }

    /// The canonical reason phrase for this status.
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::TooManyRequests => "Too Many Requests",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}
