//! A multi-mode HTTP/1.1 static file server: a work-stealing thread-pool acceptor, or a
//! single-threaded readiness-driven reactor, serving files from a document root.

pub mod admission;
pub mod cache;
pub mod config;
pub mod handler;
pub mod http;
pub mod logging;
pub mod pool;
pub mod server;
