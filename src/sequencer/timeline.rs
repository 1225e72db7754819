// Timeline - Step grid to wall-clock conversion
// Handles conversion between grid steps, beats and seconds for one tempo

use crate::config::{ConfigError, validate_bpm, validate_steps_per_beat};
use std::fmt;

/// Tempo plus grid resolution
///
/// A step clock is immutable: a tempo change builds a new clock, and queues
/// already scheduled with the old one keep their precomputed times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepClock {
    bpm: f64,
    steps_per_beat: f64,
}

impl StepClock {
    /// Creates a new step clock
    /// Both BPM and steps per beat must be strictly positive
    pub fn new(bpm: f64, steps_per_beat: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            bpm: validate_bpm(bpm)?,
            steps_per_beat: validate_steps_per_beat(steps_per_beat)?,
        })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Get grid resolution
    pub fn steps_per_beat(&self) -> f64 {
        self.steps_per_beat
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one grid step in seconds
    pub fn step_duration_seconds(&self) -> f64 {
        self.beat_duration_seconds() / self.steps_per_beat
    }

    /// Convert a step offset to seconds
    pub fn step_to_seconds(&self, step: f64) -> f64 {
        (step / self.steps_per_beat) * self.beat_duration_seconds()
    }

    /// Convert seconds to a step offset
    pub fn seconds_to_step(&self, seconds: f64) -> f64 {
        (seconds / self.beat_duration_seconds()) * self.steps_per_beat
    }

    /// Same grid, different tempo
    pub fn with_bpm(&self, bpm: f64) -> Result<Self, ConfigError> {
        Self::new(bpm, self.steps_per_beat)
    }
}

impl fmt::Display for StepClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM @ {} steps/beat", self.bpm, self.steps_per_beat)
    }
}
