//! bouncer: a TCP pairing relay
//!
//! Clients are accepted two at a time and each pair is spliced together:
//! every byte one peer sends is delivered to the other, in order, until
//! either side disconnects or errors. The relay is byte-transparent, with
//! no framing or handshake.
//!
//! Features:
//! - Positional pairing in arrival order
//! - Thread-per-pair relay with bounded per-direction buffers
//! - Immediate or flush-before-close handling of pending bytes
//! - Configuration via CLI arguments or TOML file

mod config;
mod error;
mod runtime;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        buffer_size = config.buffer_size,
        poll_timeout_secs = config.poll_timeout.as_secs(),
        close_mode = ?config.close_mode,
        "Starting bouncer"
    );

    // Setup errors propagate out of main and exit non-zero
    runtime::run(config)?;
    Ok(())
}
