use std::sync::Arc;

use clap::Parser;

use statily::config::Config;
use statily::logging::Logger;
use statily::server;

fn main() {
    let config = Config::parse();
    let logger = Arc::new(Logger::new());

    let stop = match server::install_shutdown_handler() {
        Ok(stop) => stop,
        Err(err) => {
            eprintln!("failed to install shutdown handler: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = server::run(&config, logger, stop) {
        eprintln!("server failed to start: {err}");
        std::process::exit(1);
    }
}
