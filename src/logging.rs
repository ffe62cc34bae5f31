//! Logging setup for the CLI and for hosts loading the shared library.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{AdapterError, Result};

/// Maps the verbosity flags to a maximum log level.
///
/// `quiet` wins over any verbosity: 0 is INFO, 1 is DEBUG, anything above is
/// TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Installs a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` directives, when present, refine the level picked from the
/// flags. Fails if a subscriber is already installed in this process.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level_for(verbose, quiet)).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AdapterError::configuration(format!("Failed to initialize logging: {e}")))
}
