//! Blocking acceptor + per-connection handler loop, dispatched to a [`ThreadPool`].
//!
//! One thread accepts; each accepted connection becomes one task submitted to the pool, which
//! runs its request/response loop to completion (or until the connection is closed, idles out, or
//! the server is stopped) before the worker picks up its next task.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admission::AdmissionTable;
use crate::handler::{self, FileHandler};
use crate::http::parser::{self, Status as ParseStatus};
use crate::logging::Logger;
use crate::pool::ThreadPool;

const IO_BUFFER_BYTES: usize = 8 * 1024;
const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the thread-pool acceptor loop on the calling thread until `stop` is set. Each accepted
/// connection is handed to `pool` as one task.
///
/// The listener is nonblocking so this loop can recheck `stop` between accept attempts instead of
/// parking indefinitely inside `accept()` the way a blocking listen socket would.
pub fn run(
    listener: &TcpListener,
    pool: &ThreadPool,
    handler: Arc<FileHandler>,
    admission: Arc<AdmissionTable>,
    logger: Arc<Logger>,
    stop: Arc<AtomicBool>,
) {
    listener
        .set_nonblocking(true)
        .expect("listener must support nonblocking accept");

    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let _ = socket2::SockRef::from(&stream).set_keepalive(true);
                let client_ip = addr.ip().to_string();
                let handler = handler.clone();
                let admission = admission.clone();
                let logger = logger.clone();
                let stop = stop.clone();
                let submitted = pool.submit(move || {
                    handle_connection(stream, client_ip, handler, admission, logger, stop);
                });
                if submitted.is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    client_ip: String,
    handler: Arc<FileHandler>,
    admission: Arc<AdmissionTable>,
    logger: Arc<Logger>,
    stop: Arc<AtomicBool>,
) {
    if !admission.try_acquire(&client_ip) {
        let mut response = handler::too_many_requests();
        response.set_header("Connection", "close");
        let _ = stream.write_all(&response.serialize());
        return;
    }

    // Released exactly once, regardless of which exit path below is taken.
    struct IpSlotGuard<'a> {
        admission: &'a AdmissionTable,
        ip: &'a str,
    }
    impl Drop for IpSlotGuard<'_> {
        fn drop(&mut self) {
            self.admission.release(self.ip);
        }
    }
    let _guard = IpSlotGuard {
        admission: &admission,
        ip: &client_ip,
    };

    let _ = stream.set_read_timeout(Some(RECV_TIMEOUT));

    let mut request_buffer = Vec::new();
    let mut io_buffer = vec![0u8; IO_BUFFER_BYTES];
    let mut last_active = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        while !request_buffer.is_empty() {
            match parser::parse(&request_buffer) {
                Ok(ParseStatus::Partial) => break,
                Err(err) => {
                    let mut bad = handler::bad_request(&err.to_string());
                    bad.set_header("Connection", "close");
                    let _ = stream.write_all(&bad.serialize());
                    return;
                }
                Ok(ParseStatus::Complete { request, consumed }) => {
                    let mut response = handler.handle(&request);
                    response.set_header(
                        "Connection",
                        if request.is_keep_alive() { "keep-alive" } else { "close" },
                    );
                    let wire = response.serialize();
                    if stream.write_all(&wire).is_err() {
                        return;
                    }
                    logger.log_access(&request.method.to_string(), &request.uri, response.status_code);
                    last_active = Instant::now();

                    request_buffer.drain(..consumed);
                    if !request.is_keep_alive() {
                        return;
                    }
                }
            }
        }

        if request_buffer.len() > MAX_REQUEST_BYTES {
            let mut bad = handler::bad_request("Request too large");
            bad.set_header("Connection", "close");
            let _ = stream.write_all(&bad.serialize());
            return;
        }

        match stream.read(&mut io_buffer) {
            Ok(0) => return,
            Ok(n) => {
                request_buffer.extend_from_slice(&io_buffer[..n]);
                last_active = Instant::now();
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                if last_active.elapsed() >= IDLE_TIMEOUT {
                    return;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return,
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
}
