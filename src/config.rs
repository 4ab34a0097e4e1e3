//! Command-line configuration.

use std::path::PathBuf;

use clap::Parser;

/// A multi-mode HTTP/1.1 static file server.
#[derive(Debug, Parser)]
#[command(name = "statily", version, about)]
pub struct Config {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Number of worker threads in pool mode. Defaults to the number of logical CPUs.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Document root to serve files from.
    #[arg(long, default_value = "./public")]
    pub root: PathBuf,

    /// Run the reactor-mode event loop instead of the thread-pool acceptor.
    #[arg(long)]
    pub kqueue: bool,
}

impl Config {
    /// The number of worker threads to run, resolving the CLI default against the host's CPU
    /// count.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| num_cpus::get().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_with_no_arguments() {
        let config = Config::parse_from(["statily"]);
        assert_eq!(8080, config.port);
        assert_eq!(PathBuf::from("./public"), config.root);
        assert!(!config.kqueue);
        assert!(config.thread_count() >= 1);
    }

    #[test]
    fn explicit_thread_count_overrides_cpu_default() {
        let config = Config::parse_from(["statily", "--threads", "3"]);
        assert_eq!(3, config.thread_count());
    }

    #[test]
    fn flags_parse_as_expected() {
        let config = Config::parse_from([
            "statily", "--port", "9090", "--root", "/srv/www", "--kqueue",
        ]);
        assert_eq!(9090, config.port);
        assert_eq!(PathBuf::from("/srv/www"), config.root);
        assert!(config.kqueue);
    }
}
