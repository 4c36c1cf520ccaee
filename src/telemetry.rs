// Logging setup shared by every subcommand

use crate::error::{HaikuError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level`. Output goes to stdout, one line per event,
/// so a log collector reading the container output sees events immediately.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| HaikuError::ConfigError(format!("Failed to create log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| HaikuError::Other(format!("Failed to install logger: {}", e)))
}
