//! The two server modes this crate supports, and a small facade that picks between them.

pub mod pool_mode;
pub mod reactor_mode;

use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::admission::AdmissionTable;
use crate::cache::FileCache;
use crate::config::Config;
use crate::handler::FileHandler;
use crate::logging::Logger;
use crate::pool::ThreadPool;

const DEFAULT_CACHE_CAPACITY: usize = 1024;
const MAX_CONNECTIONS_PER_IP: usize = 100;

/// Runs the server in the mode selected by `config` until `stop` is set (or, in pool mode, until
/// the process is killed out from under the blocking accept call).
pub fn run(config: &Config, logger: Arc<Logger>, stop: Arc<AtomicBool>) -> std::io::Result<()> {
    let cache = FileCache::new(DEFAULT_CACHE_CAPACITY);
    let handler = Arc::new(FileHandler::new(config.root.clone(), cache)?);
    let admission = Arc::new(AdmissionTable::new(MAX_CONNECTIONS_PER_IP));

    let addr = format!("0.0.0.0:{}", config.port);

    if config.kqueue {
        let listener = mio::net::TcpListener::bind(addr.parse().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid listen address")
        })?)?;
        logger.log(
            &format!("Server started on port {} (reactor mode)", config.port),
            crate::logging::Level::Info,
        );
        reactor_mode::run(listener, handler, admission, logger.clone(), stop)?;
    } else {
        let listener = StdTcpListener::bind(&addr)?;
        let mut pool = ThreadPool::new(config.thread_count());
        logger.log(
            &format!("Server started on port {} (thread-pool mode)", config.port),
            crate::logging::Level::Info,
        );
        pool_mode::run(&listener, &pool, handler, admission, logger.clone(), stop.clone());
        pool.shutdown();
    }

    logger.log("Server stopped", crate::logging::Level::Info);
    Ok(())
}

/// Installs a `Ctrl-C`/`SIGTERM` handler that flips a shared atomic flag, observed by both server
/// modes' main loops.
pub fn install_shutdown_handler() -> std::io::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_for_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    Ok(stop)
}
