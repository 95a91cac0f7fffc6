//! Remux-and-pace media relay: copies every stream of a source container
//! into a destination container without decoding, optionally holding packets
//! back to real time for live delivery.

use tokio_util::sync::CancellationToken;

/// Registers FFmpeg formats, devices and networking. Call once at startup
/// before opening network URLs or device inputs.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    ffmpeg_next::format::network::init();
    Ok(())
}

pub mod config;
pub mod container;
pub mod error;
pub mod input;
pub mod metadata;
pub mod negotiate;
pub mod output;
pub mod pacer;
pub mod packet;
pub mod rescale;
pub mod session;
pub mod stream;
pub mod task;
pub mod timestamp;

#[cfg(test)]
mod test_io;

pub use config::{Direction, RelayConfig, RelayConfigBuilder};
pub use container::FfmpegIo;
pub use error::{Endpoint, RelayError};
pub use pacer::SystemClock;
pub use session::{RelayReport, Session, SessionState, StopReason};
pub use task::RelayTask;

/// Relay `config.source` to `config.destination` with FFmpeg, blocking the
/// calling thread until the session stops.
pub fn relay(config: RelayConfig, cancel: &CancellationToken) -> error::Result<RelayReport> {
    log::info!(
        "{} '{}' -> '{}'",
        config.direction.verb(),
        config.source,
        config.destination
    );
    let mut session: Session<FfmpegIo> = Session::new(config, SystemClock);
    session.run(&FfmpegIo, cancel)
}
