//! The file handler: turns a parsed [`Request`] into a [`Response`] by serving a file under the
//! configured document root.
//!
//! Path resolution is deliberately conservative: any URI containing `..` is rejected outright
//! before any filesystem call, and the candidate path is canonicalized and checked against the
//! canonical root as a second, independent check. Either check failing is a 404, never a 500 —
//! an attacker scanning for traversal should not learn anything from the status code.

use std::path::{Path, PathBuf};

use crate::cache::FileCache;
use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::Status;

const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Serves static files from a document root, backed by a [`FileCache`].
pub struct FileHandler {
    doc_root: PathBuf,
    cache: FileCache,
}

impl FileHandler {
    /// Creates a handler rooted at `doc_root`, creating the directory if it doesn't already
    /// exist. Files are served through `cache`.
    pub fn new(doc_root: impl Into<PathBuf>, cache: FileCache) -> std::io::Result<Self> {
        let doc_root = doc_root.into();
        if !doc_root.exists() {
            std::fs::create_dir_all(&doc_root)?;
        }
        let doc_root = doc_root.canonicalize()?;
        Ok(FileHandler { doc_root, cache })
    }

    /// Handles a request, returning the response to send back to the client.
    pub fn handle(&self, request: &Request) -> Response {
        if !request.method.is_servable() {
            return method_not_allowed();
        }

        let path = match self.resolve_path(&request.uri) {
            Some(path) => path,
            None => return not_found(),
        };

        let path = if path.is_dir() { path.join("index.html") } else { path };

        if !path.is_file() {
            return not_found();
        }

        let file_size = match std::fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return internal_server_error("Could not open file"),
        };
        if file_size > MAX_FILE_BYTES {
            return internal_server_error("File too large or unreadable");
        }

        let path_key = path.to_string_lossy().into_owned();
        let mime_type = detect_mime_type(&path);

        let content = match self.cache.get(&path_key) {
            Some(cached) => cached.content,
            None => match std::fs::read(&path) {
                Ok(bytes) => {
                    self.cache.put(path_key, bytes.clone(), mime_type.clone());
                    bytes
                }
                Err(_) => return internal_server_error("Could not open file"),
            },
        };

        let mut response = Response::new(Status::Ok);
        response.set_header("Content-Type", mime_type.clone());
        response.set_header(
            "Connection",
            if request.is_keep_alive() { "keep-alive" } else { "close" },
        );

        if request.method == Method::Head {
            response.set_header("Content-Length", content.len().to_string());
            response
        } else {
            response.with_body(content)
        }
    }

    /// Rejects any URI containing `..`, strips the query string and leading slashes, joins the
    /// remainder onto the canonical root, and confirms the canonicalized result still lives under
    /// that root. Returns `None` if the URI can't be resolved to a path inside the root.
    fn resolve_path(&self, uri: &str) -> Option<PathBuf> {
        let clean_uri = uri.split('?').next().unwrap_or("");
        let clean_uri = if clean_uri.is_empty() { "/" } else { clean_uri };

        if clean_uri.contains("..") {
            return None;
        }

        let relative = clean_uri.trim_start_matches('/');
        let candidate = self.doc_root.join(relative);

        let canonical = weakly_canonicalize(&candidate);
        if canonical == self.doc_root {
            return Some(canonical);
        }
        match canonical.strip_prefix(&self.doc_root) {
            Ok(_) => Some(canonical),
            Err(_) => None,
        }
    }
}

/// Canonicalizes as much of `path` as exists on disk, then appends whatever trailing components
/// don't exist yet (the file the request names may not have been created at resolution time).
fn weakly_canonicalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match current.canonicalize() {
            Ok(mut base) => {
                for component in missing.into_iter().rev() {
                    base.push(component);
                }
                return base;
            }
            Err(_) => match (current.parent(), current.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_owned());
                    current = parent;
                }
                _ => {
                    let mut base = PathBuf::from(current);
                    for component in missing.into_iter().rev() {
                        base.push(component);
                    }
                    return base;
                }
            },
        }
    }
}

fn detect_mime_type(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

fn not_found() -> Response {
    Response::new(Status::NotFound)
        .with_body(b"<html><body><h1>404 Not Found</h1></body></html>".to_vec())
}

fn method_not_allowed() -> Response {
    Response::new(Status::MethodNotAllowed)
        .with_body(b"<html><body><h1>405 Method Not Allowed</h1></body></html>".to_vec())
}

fn internal_server_error(error: &str) -> Response {
    Response::new(Status::InternalServerError).with_body(
        format!("<html><body><h1>500 Internal Server Error</h1><p>{error}</p></body></html>")
            .into_bytes(),
    )
}

/// Builds the 400 Bad Request response for a request the parser rejected outright.
pub fn bad_request(error: &str) -> Response {
    Response::new(Status::BadRequest).with_body(
        format!("<html><body><h1>400 Bad Request</h1><p>{error}</p></body></html>").into_bytes(),
    )
}

/// Builds the 429 Too Many Requests response for a connection the admission table rejected.
pub fn too_many_requests() -> Response {
    Response::new(Status::TooManyRequests)
        .with_body(b"<html><body><h1>429 Too Many Requests</h1></body></html>".to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers::RequestHeaders;

    fn handler_with_root() -> (tempfile::TempDir, FileHandler) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("index.html"), b"<h1>sub index</h1>").unwrap();
        let handler = FileHandler::new(dir.path(), FileCache::new(16)).unwrap();
        (dir, handler)
    }

    fn get(uri: &str) -> Request {
        Request {
            method: Method::Get,
            uri: uri.to_string(),
            version: "HTTP/1.1",
            headers: RequestHeaders::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn serves_an_existing_file_with_200() {
        let (_dir, handler) = handler_with_root();
        let response = handler.handle(&get("/hello.txt"));
        assert_eq!(200, response.status_code);
        assert_eq!(b"hello world".to_vec(), response.body);
        assert_eq!(Some("text/plain"), response.headers.get("Content-Type"));
    }

    #[test]
    fn serves_index_html_for_a_directory() {
        let (_dir, handler) = handler_with_root();
        let response = handler.handle(&get("/sub/"));
        assert_eq!(200, response.status_code);
        assert_eq!(b"<h1>sub index</h1>".to_vec(), response.body);
    }

    #[test]
    fn missing_file_is_404() {
        let (_dir, handler) = handler_with_root();
        let response = handler.handle(&get("/missing.txt"));
        assert_eq!(404, response.status_code);
    }

    #[test]
    fn path_traversal_is_rejected_as_404() {
        let (_dir, handler) = handler_with_root();
        let response = handler.handle(&get("/../../etc/passwd"));
        assert_eq!(404, response.status_code);
    }

    #[test]
    fn post_is_405() {
        let (_dir, handler) = handler_with_root();
        let mut req = get("/hello.txt");
        req.method = Method::Post;
        let response = handler.handle(&req);
        assert_eq!(405, response.status_code);
    }

    #[test]
    fn head_request_has_content_length_but_empty_body() {
        let (_dir, handler) = handler_with_root();
        let mut req = get("/hello.txt");
        req.method = Method::Head;
        let response = handler.handle(&req);
        assert_eq!(200, response.status_code);
        assert!(response.body.is_empty());
        assert_eq!(Some("11"), response.headers.get("Content-Length"));
    }

    #[test]
    fn query_string_is_stripped_before_resolving_the_path() {
        let (_dir, handler) = handler_with_root();
        let response = handler.handle(&get("/hello.txt?x=1"));
        assert_eq!(200, response.status_code);
    }

    #[test]
    fn repeated_reads_are_served_from_the_cache() {
        let (_dir, handler) = handler_with_root();
        let first = handler.handle(&get("/hello.txt"));
        let second = handler.handle(&get("/hello.txt"));
        assert_eq!(first.body, second.body);
    }

    #[test]
    fn mime_detection_is_case_insensitive_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMAGE.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("Index.HTML"), b"y").unwrap();
        let handler = FileHandler::new(dir.path(), FileCache::new(16)).unwrap();

        let png = handler.handle(&get("/IMAGE.PNG"));
        assert_eq!(Some("image/png"), png.headers.get("Content-Type"));

        let html = handler.handle(&get("/Index.HTML"));
        assert_eq!(Some("text/html"), html.headers.get("Content-Type"));
    }
}
