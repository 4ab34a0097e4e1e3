//! A minimal, level-filtered logger that serializes all output through one lock.
//!
//! Every call takes the same mutex before writing, so interleaved lines from different worker
//! threads never get scrambled mid-line.

use std::sync::Mutex;

use chrono::Local;

/// Logging verbosity. Variants are ordered: a logger configured at `Info` drops `Debug` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Verbose, per-request detail not needed in normal operation.
    Debug = 0,
    /// Access lines: one per completed request.
    Info = 1,
    /// Failures worth operator attention.
    Error = 2,
}

/// A thread-safe logger writing timestamped lines to stdout/stderr.
pub struct Logger {
    min_level: Mutex<Level>,
}

impl Logger {
    /// Creates a logger that emits everything at or above `Info`.
    pub fn new() -> Self {
        Logger {
            min_level: Mutex::new(Level::Info),
        }
    }

    /// Changes the minimum level that gets emitted.
    pub fn set_log_level(&self, level: Level) {
        *self.min_level.lock().unwrap() = level;
    }

    /// Logs `message` at `level` to stdout, prefixed with a local timestamp. Dropped if `level`
    /// is below the configured minimum.
    pub fn log(&self, message: &str, level: Level) {
        let min_level = *self.min_level.lock().unwrap();
        if level < min_level {
            return;
        }
        println!("[{}] {}", timestamp(), message);
    }

    /// Logs an `ERROR:`-prefixed line to stderr. Dropped only if the configured minimum is above
    /// `Error`, which nothing in this server ever sets.
    pub fn error(&self, message: &str) {
        let min_level = *self.min_level.lock().unwrap();
        if Level::Error < min_level {
            return;
        }
        eprintln!("[{}] ERROR: {}", timestamp(), message);
    }

    /// Logs a completed request in `METHOD URI STATUS` form, at `Info`.
    pub fn log_access(&self, method: &str, uri: &str, status_code: u16) {
        self.log(&format!("{method} {uri} {status_code}"), Level::Info);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_matches_expected_format() {
        let stamp = timestamp();
        assert_eq!(19, stamp.len());
        assert_eq!(b'-', stamp.as_bytes()[4]);
        assert_eq!(b':', stamp.as_bytes()[13]);
    }

    #[test]
    fn set_log_level_is_observable_through_behavior() {
        let logger = Logger::new();
        logger.set_log_level(Level::Error);
        assert_eq!(Level::Error, *logger.min_level.lock().unwrap());
    }
}
