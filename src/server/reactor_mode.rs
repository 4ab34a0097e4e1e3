//! Single-threaded, readiness-driven event loop.
//!
//! Ported from a raw BSD `kqueue()` loop to [`mio`]'s portable reactor: the `--kqueue` flag name
//! is kept for compatibility, but it now dispatches to whatever backend `mio` picks for the host
//! platform (epoll on Linux, kqueue on BSD/macOS, IOCP on Windows) rather than calling the BSD
//! syscall directly.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use crate::admission::AdmissionTable;
use crate::handler::{self, FileHandler};
use crate::http::parser::{self, Status as ParseStatus};
use crate::logging::Logger;

const IO_BUFFER_BYTES: usize = 8 * 1024;
const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const LISTENER_TOKEN: Token = Token(usize::MAX);

struct Connection {
    stream: TcpStream,
    client_ip: String,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    close_after_write: bool,
    last_active: Instant,
    writable_registered: bool,
}

/// Runs the reactor loop on the calling thread until `stop` is set.
pub fn run(
    mut listener: TcpListener,
    handler: Arc<FileHandler>,
    admission: Arc<AdmissionTable>,
    logger: Arc<Logger>,
    stop: Arc<AtomicBool>,
) -> io::Result<()> {
    let mut poll = Poll::new()?;
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

    let mut connections: Slab<Connection> = Slab::with_capacity(2048);
    let mut events = Events::with_capacity(256);

    while !stop.load(Ordering::Relaxed) {
        match poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                logger.error(&format!("poll failed: {err}"));
                break;
            }
        }

        for event in events.iter() {
            if event.token() == LISTENER_TOKEN {
                accept_all(&mut listener, &poll, &mut connections, &admission);
                continue;
            }

            let token = event.token();
            if !connections.contains(token.0) {
                continue;
            }

            if event.is_readable() {
                handle_readable(token, &mut connections, &handler, &logger, &poll, &admission);
            }
            if event.is_writable() && connections.contains(token.0) {
                handle_writable(token, &mut connections, &poll, &admission);
            }
        }

        sweep_idle_connections(&mut connections, &poll, &admission);
    }

    let tokens: Vec<usize> = connections.iter().map(|(key, _)| key).collect();
    for key in tokens {
        close_connection(Token(key), &mut connections, &poll, &admission);
    }

    Ok(())
}

fn accept_all(
    listener: &mut TcpListener,
    poll: &Poll,
    connections: &mut Slab<Connection>,
    admission: &AdmissionTable,
) {
    loop {
        let (mut stream, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
            Err(_) => return,
        };

        let _ = socket2::SockRef::from(&stream).set_keepalive(true);
        let client_ip = ip_of(addr);
        if !admission.try_acquire(&client_ip) {
            let mut response = handler::too_many_requests();
            response.set_header("Connection", "close");
            let _ = stream.write_all(&response.serialize());
            continue;
        }

        let entry = connections.vacant_entry();
        let token = Token(entry.key());
        if poll
            .registry()
            .register(&mut stream, token, Interest::READABLE)
            .is_err()
        {
            admission.release(&client_ip);
            continue;
        }

        entry.insert(Connection {
            stream,
            client_ip,
            read_buffer: Vec::new(),
            write_buffer: Vec::new(),
            close_after_write: false,
            last_active: Instant::now(),
            writable_registered: false,
        });
    }
}

fn handle_readable(
    token: Token,
    connections: &mut Slab<Connection>,
    handler: &FileHandler,
    logger: &Logger,
    poll: &Poll,
    admission: &AdmissionTable,
) {
    let mut io_buffer = [0u8; IO_BUFFER_BYTES];
    let mut should_close = false;

    {
        let conn = &mut connections[token.0];
        loop {
            match conn.stream.read(&mut io_buffer) {
                Ok(0) => {
                    should_close = true;
                    break;
                }
                Ok(n) => {
                    conn.read_buffer.extend_from_slice(&io_buffer[..n]);
                    conn.last_active = Instant::now();
                    if conn.read_buffer.len() > MAX_REQUEST_BYTES {
                        let mut bad = handler::bad_request("Request too large");
                        bad.set_header("Connection", "close");
                        conn.write_buffer.extend_from_slice(&bad.serialize());
                        conn.close_after_write = true;
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    should_close = true;
                    break;
                }
            }
        }

        while !conn.read_buffer.is_empty() && !conn.close_after_write {
            match parser::parse(&conn.read_buffer) {
                Ok(ParseStatus::Partial) => break,
                Err(err) => {
                    let mut bad = handler::bad_request(&err.to_string());
                    bad.set_header("Connection", "close");
                    conn.write_buffer.extend_from_slice(&bad.serialize());
                    conn.close_after_write = true;
                    conn.read_buffer.clear();
                    break;
                }
                Ok(ParseStatus::Complete { request, consumed }) => {
                    let mut response = handler.handle(&request);
                    response.set_header(
                        "Connection",
                        if request.is_keep_alive() { "keep-alive" } else { "close" },
                    );
                    conn.write_buffer.extend_from_slice(&response.serialize());
                    logger.log_access(&request.method.to_string(), &request.uri, response.status_code);
                    conn.last_active = Instant::now();

                    conn.read_buffer.drain(..consumed);
                    if !request.is_keep_alive() {
                        conn.close_after_write = true;
                    }
                }
            }
        }
    }

    let conn = &mut connections[token.0];
    conn.close_after_write = conn.close_after_write || should_close;

    if !conn.write_buffer.is_empty() && !conn.writable_registered {
        if poll
            .registry()
            .reregister(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE)
            .is_ok()
        {
            conn.writable_registered = true;
        }
    }

    let write_buffer_empty = conn.write_buffer.is_empty();
    if conn.close_after_write && write_buffer_empty {
        close_connection(token, connections, poll, admission);
    }
}

fn handle_writable(
    token: Token,
    connections: &mut Slab<Connection>,
    poll: &Poll,
    admission: &AdmissionTable,
) {
    let mut closed = false;
    {
        let conn = &mut connections[token.0];
        while !conn.write_buffer.is_empty() {
            match conn.stream.write(&conn.write_buffer) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    conn.write_buffer.drain(..n);
                    conn.last_active = Instant::now();
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    closed = true;
                    break;
                }
            }
        }
    }

    if closed {
        close_connection(token, connections, poll, admission);
        return;
    }

    let conn = &mut connections[token.0];
    if conn.write_buffer.is_empty() {
        if conn.writable_registered
            && poll
                .registry()
                .reregister(&mut conn.stream, token, Interest::READABLE)
                .is_ok()
        {
            conn.writable_registered = false;
        }
        if conn.close_after_write {
            close_connection(token, connections, poll, admission);
        }
    }
}

fn sweep_idle_connections(connections: &mut Slab<Connection>, poll: &Poll, admission: &AdmissionTable) {
    let now = Instant::now();
    let stale: Vec<usize> = connections
        .iter()
        .filter(|(_, conn)| now.duration_since(conn.last_active) >= IDLE_TIMEOUT)
        .map(|(key, _)| key)
        .collect();
    for key in stale {
        close_connection(Token(key), connections, poll, admission);
    }
}

fn close_connection(token: Token, connections: &mut Slab<Connection>, poll: &Poll, admission: &AdmissionTable) {
    if !connections.contains(token.0) {
        return;
    }
    let mut conn = connections.remove(token.0);
    admission.release(&conn.client_ip);
    let _ = poll.registry().deregister(&mut conn.stream);
    let _ = conn.stream.shutdown(std::net::Shutdown::Both);
}

fn ip_of(addr: SocketAddr) -> String {
    addr.ip().to_string()
}
