// Playback - engine, session state and timing loop

pub mod engine;
pub mod session;
pub mod timing_loop;

pub use engine::PlaybackEngine;
pub use session::{Session, SharedSession};
pub use timing_loop::{LoopExit, LoopSettings, TimingLoopHandle};

use crate::config::ConfigError;
use crate::sequencer::transport::TransitionError;

/// Errors raised by engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid parameter: {0}")]
    Config(#[from] ConfigError),

    #[error("No device connected")]
    DeviceUnavailable,

    #[error("Device write failed: {0}")]
    DeviceWrite(#[from] std::io::Error),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl EngineError {
    /// Whether the client gets an `error` message for this
    /// Malformed frames and invalid transitions are only logged
    pub fn is_reported_to_client(&self) -> bool {
        !matches!(
            self,
            EngineError::MalformedCommand(_) | EngineError::InvalidTransition(_)
        )
    }
}
