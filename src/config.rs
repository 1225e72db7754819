// Engine configuration - timing resolution, device protocol and relay options
// Loaded from a RON file, every field falls back to a default

use crate::device::dispatcher::DeviceProtocol;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BPM must be a positive number, got {0}")]
    InvalidBpm(f64),

    #[error("Steps per beat must be a positive number, got {0}")]
    InvalidStepsPerBeat(f64),

    #[error("Playhead step must be a non-negative number, got {0}")]
    InvalidPlayhead(f64),

    #[error("Tick interval must be at least 1 ms")]
    InvalidTickInterval,

    #[error("Chord tolerance must be a non-negative number of milliseconds, got {0}")]
    InvalidTolerance(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Runtime configuration of one playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid resolution (4 = sixteenth notes)
    pub steps_per_beat: f64,
    /// Tempo used until a client sends one
    pub default_bpm: f64,
    /// Timing loop polling interval
    pub tick_interval_ms: u64,
    /// Notes closer than this to a chord's first note join the chord
    pub chord_tolerance_ms: f64,
    /// Minimum gap between two playhead updates sent to the client
    pub playhead_update_interval_ms: u64,
    /// Pause between member lines of a chord, lets the device drain its buffer
    pub chord_line_delay_ms: u64,
    /// Device wire format
    pub protocol: DeviceProtocol,
    /// Relay unrecognised JSON frames to the other connected clients
    pub legacy_relay: bool,
    /// Capacity of each connection's outbound message queue
    pub outbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            steps_per_beat: 4.0,
            default_bpm: 120.0,
            tick_interval_ms: 10,
            chord_tolerance_ms: 20.0,
            playhead_update_interval_ms: 100,
            chord_line_delay_ms: 2,
            protocol: DeviceProtocol::Chord,
            legacy_relay: false,
            outbox_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// File name looked up in the user config directory
    pub const FILE_NAME: &'static str = "config.ron";

    /// Default config location: `<config_dir>/fretbridge/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fretbridge").join(Self::FILE_NAME))
    }

    /// Parse and validate a RON document
    pub fn from_ron(ron_data: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(ron_data)
            .map_err(|e| ConfigError::Parse(format!("Failed to deserialize from RON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_data = std::fs::read_to_string(path)?;
        Self::from_ron(&ron_data)
    }

    /// Load from `path` if given, else from the default location when it exists,
    /// else return the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(default_path) if default_path.exists() => Self::load(&default_path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bpm(self.default_bpm)?;
        validate_steps_per_beat(self.steps_per_beat)?;

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval);
        }

        if !self.chord_tolerance_ms.is_finite() || self.chord_tolerance_ms < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.chord_tolerance_ms));
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Chord window in seconds
    pub fn chord_tolerance_seconds(&self) -> f64 {
        self.chord_tolerance_ms / 1000.0
    }

    pub fn playhead_update_interval(&self) -> Duration {
        Duration::from_millis(self.playhead_update_interval_ms)
    }

    pub fn chord_line_delay(&self) -> Duration {
        Duration::from_millis(self.chord_line_delay_ms)
    }
}

/// BPM must be finite and strictly positive
pub fn validate_bpm(bpm: f64) -> Result<f64, ConfigError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(ConfigError::InvalidBpm(bpm))
    }
}

/// Steps per beat must be finite and strictly positive
pub fn validate_steps_per_beat(steps_per_beat: f64) -> Result<f64, ConfigError> {
    if steps_per_beat.is_finite() && steps_per_beat > 0.0 {
        Ok(steps_per_beat)
    } else {
        Err(ConfigError::InvalidStepsPerBeat(steps_per_beat))
    }
}

/// Playhead must be finite and non-negative
pub fn validate_playhead(step: f64) -> Result<f64, ConfigError> {
    if step.is_finite() && step >= 0.0 {
        Ok(step)
    } else {
        Err(ConfigError::InvalidPlayhead(step))
    }
}
