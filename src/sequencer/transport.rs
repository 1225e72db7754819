// Transport - Playback control and state management
// Controls play/pause/stop state and anchors the playhead on the wall clock

use super::timeline::StepClock;
use std::fmt;
use std::time::{Duration, Instant};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, TransportState::Paused)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A transition requested from a state that does not allow it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} while {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: TransportState,
}

/// Transport controller
///
/// Owns the playhead origin and the wall-clock anchor of the running
/// session. `elapsed = now - session_start`, where `session_start` is shifted
/// forward on resume so that paused time never counts.
///
/// All transitions take `now` explicitly, so the arithmetic is testable
/// without sleeping.
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    /// Tempo for the next load
    bpm: f64,
    /// Clock of the loaded queue
    clock: StepClock,
    playhead_origin: f64,
    session_start: Option<Instant>,
    paused_at: Option<Instant>,
    elapsed_at_pause: f64,
}

impl Transport {
    /// Create new transport, stopped at step 0
    pub fn new(clock: StepClock) -> Self {
        Self {
            state: TransportState::Stopped,
            bpm: clock.bpm(),
            clock,
            playhead_origin: 0.0,
            session_start: None,
            paused_at: None,
            elapsed_at_pause: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Tempo that the next play/seek will use
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Clock of the currently loaded queue
    pub fn clock(&self) -> StepClock {
        self.clock
    }

    pub fn playhead_origin(&self) -> f64 {
        self.playhead_origin
    }

    pub fn session_start(&self) -> Option<Instant> {
        self.session_start
    }

    /// Seconds of playback since the origin, paused intervals excluded
    pub fn elapsed(&self, now: Instant) -> f64 {
        match self.state {
            TransportState::Playing => self
                .session_start
                .map(|start| now.saturating_duration_since(start).as_secs_f64())
                .unwrap_or(0.0),
            TransportState::Paused => self.elapsed_at_pause,
            TransportState::Stopped => 0.0,
        }
    }

    /// Playhead position in steps
    pub fn current_step(&self, now: Instant) -> f64 {
        self.playhead_origin + self.clock.seconds_to_step(self.elapsed(now))
    }

    /// Record the tempo for future loads
    /// The loaded clock is left alone, scheduled times are never rescaled
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    /// Start a fresh session at `origin` (allowed from any state)
    pub fn play(&mut self, clock: StepClock, origin: f64, now: Instant) {
        self.bpm = clock.bpm();
        self.clock = clock;
        self.playhead_origin = origin;
        self.session_start = Some(now);
        self.paused_at = None;
        self.elapsed_at_pause = 0.0;
        self.state = TransportState::Playing;
    }

    /// Freeze the anchor and remember how far playback got
    pub fn pause(&mut self, now: Instant) -> Result<(), TransitionError> {
        if !self.state.is_playing() {
            return Err(TransitionError {
                action: "pause",
                state: self.state,
            });
        }

        self.elapsed_at_pause = self.elapsed(now);
        self.paused_at = Some(now);
        self.state = TransportState::Paused;
        Ok(())
    }

    /// Continue from where pause left off
    pub fn resume(&mut self, now: Instant) -> Result<(), TransitionError> {
        if !self.state.is_paused() {
            return Err(TransitionError {
                action: "resume",
                state: self.state,
            });
        }

        let paused_for = self
            .paused_at
            .map(|paused_at| now.saturating_duration_since(paused_at))
            .unwrap_or(Duration::ZERO);

        self.session_start = match self.session_start {
            Some(start) => Some(start + paused_for),
            None => Some(now),
        };
        self.paused_at = None;
        self.state = TransportState::Playing;
        Ok(())
    }

    /// Stop and rewind to step 0 (allowed from any state)
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.playhead_origin = 0.0;
        self.session_start = None;
        self.paused_at = None;
        self.elapsed_at_pause = 0.0;
    }

    /// Move the origin to `target` with a new clock
    ///
    /// Elapsed time restarts from zero at the new origin. A playing
    /// transport must be paused by the caller first; a stopped one stays
    /// stopped.
    pub fn seek(&mut self, clock: StepClock, target: f64, now: Instant) {
        self.clock = clock;
        self.playhead_origin = target;
        self.elapsed_at_pause = 0.0;

        match self.state {
            TransportState::Paused => {
                self.session_start = Some(now);
                self.paused_at = Some(now);
            }
            TransportState::Playing => {
                self.session_start = Some(now);
            }
            TransportState::Stopped => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> StepClock {
        StepClock::new(120.0, 16.0).unwrap()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Playing.is_playing());
        assert!(TransportState::Paused.is_paused());
        assert!(TransportState::Stopped.is_stopped());
        assert_eq!(TransportState::default(), TransportState::Stopped);
        assert_eq!(TransportState::Paused.to_string(), "paused");
    }

    #[test]
    fn test_transport_control() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        assert_eq!(transport.state(), TransportState::Stopped);

        transport.play(clock(), 0.0, t0);
        assert_eq!(transport.state(), TransportState::Playing);

        transport.pause(t0 + ms(100)).unwrap();
        assert_eq!(transport.state(), TransportState::Paused);

        transport.resume(t0 + ms(200)).unwrap();
        assert_eq!(transport.state(), TransportState::Playing);

        transport.stop();
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.playhead_origin(), 0.0);
        assert_eq!(transport.elapsed(t0 + ms(300)), 0.0);
    }

    #[test]
    fn test_elapsed_and_current_step() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        transport.play(clock(), 8.0, t0);

        // 125ms at 120 BPM / 16 steps per beat = 4 steps
        assert_eq!(transport.elapsed(t0 + ms(125)), 0.125);
        assert_eq!(transport.current_step(t0 + ms(125)), 12.0);
    }

    #[test]
    fn test_pause_resume_continuity() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        transport.play(clock(), 0.0, t0);

        let pause_at = t0 + ms(250);
        let before_pause = transport.current_step(pause_at);
        transport.pause(pause_at).unwrap();

        // Time passes while paused, the playhead does not move
        assert_eq!(transport.current_step(pause_at + ms(5000)), before_pause);

        let resume_at = pause_at + ms(5000);
        transport.resume(resume_at).unwrap();
        assert_eq!(transport.current_step(resume_at), before_pause);

        // And continues from there
        assert_eq!(transport.elapsed(resume_at + ms(250)), 0.5);
    }

    #[test]
    fn test_invalid_transitions() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());

        let err = transport.pause(t0).unwrap_err();
        assert_eq!(err.action, "pause");
        assert_eq!(err.state, TransportState::Stopped);
        assert!(transport.resume(t0).is_err());

        transport.play(clock(), 0.0, t0);
        assert!(transport.resume(t0).is_err());
        assert_eq!(transport.state(), TransportState::Playing);
        assert_eq!(err.to_string(), "cannot pause while stopped");
    }

    #[test]
    fn test_play_while_playing_restarts() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        transport.play(clock(), 0.0, t0);
        transport.play(clock(), 4.0, t0 + ms(500));

        assert_eq!(transport.elapsed(t0 + ms(500)), 0.0);
        assert_eq!(transport.current_step(t0 + ms(500)), 4.0);
    }

    #[test]
    fn test_seek_while_paused_restarts_elapsed() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        transport.play(clock(), 0.0, t0);
        transport.pause(t0 + ms(300)).unwrap();

        transport.seek(clock(), 32.0, t0 + ms(400));
        assert_eq!(transport.state(), TransportState::Paused);
        assert_eq!(transport.current_step(t0 + ms(900)), 32.0);

        transport.resume(t0 + ms(1000)).unwrap();
        assert_eq!(transport.current_step(t0 + ms(1000)), 32.0);
        assert_eq!(transport.current_step(t0 + ms(1125)), 36.0);
    }

    #[test]
    fn test_seek_while_stopped_stays_stopped() {
        let mut transport = Transport::new(clock());
        transport.seek(clock(), 16.0, Instant::now());

        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.playhead_origin(), 16.0);
    }

    #[test]
    fn test_set_bpm_does_not_touch_loaded_clock() {
        let t0 = Instant::now();
        let mut transport = Transport::new(clock());
        transport.play(clock(), 0.0, t0);
        transport.set_bpm(60.0);

        assert_eq!(transport.bpm(), 60.0);
        assert_eq!(transport.clock().bpm(), 120.0);
        assert_eq!(transport.current_step(t0 + ms(125)), 4.0);
    }
}
