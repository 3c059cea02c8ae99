//! Relay runtime.
//!
//! Thread-per-pair model:
//! - `Listener`: accepts clients two at a time and forms `ConnectionPair`s
//! - `RelayWorker`: relays one pair on its own thread using mio readiness
//! - `DirectionalBuffer`: bounded per-direction staging area

mod buffer;
mod connection;
mod listener;
mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::DEFAULT_BUFFER_SIZE;
pub use connection::Peer;
pub use listener::Listener;
pub use relay::RelayOptions;

use crate::config::Config;
use crate::error::BouncerError;
use tracing::info;

/// Bind the listener and serve pairs until the process is killed.
///
/// Returns only if setup fails.
pub fn run(config: Config) -> Result<(), BouncerError> {
    let listener = Listener::bind(&config.listen, config.backlog, config.relay_options())?;
    info!(addr = %listener.local_addr(), backlog = config.backlog, "Listening");
    listener.run();
    Ok(())
}
