//! Subscriber setup for binaries and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{HotSwapError, Result};

/// Installs a global `fmt` subscriber filtered by `level` (an `EnvFilter`
/// directive such as `info` or `graphswap=debug`).
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| HotSwapError::config(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| HotSwapError::config("logging already initialized"))
}
