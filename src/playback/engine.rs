// Playback engine - Transport operations for one client connection
// Every operation cancels and joins the timing loop before touching the session

use crate::config::{EngineConfig, validate_bpm, validate_playhead};
use crate::device::dispatcher::{DeviceDispatcher, SharedDevice, lock_device};
use crate::device::status::DeviceStatus;
use crate::messaging::channels::ClientOutbox;
use crate::messaging::command::Command;
use crate::messaging::notification::{ClientMessage, PlaybackStatus};
use crate::playback::EngineError;
use crate::playback::session::{Session, SharedSession, lock_session};
use crate::playback::timing_loop::{LoopExit, LoopSettings, TimingLoopHandle};
use crate::sequencer::chord::ChordGrouper;
use crate::sequencer::note::NoteEvent;
use crate::sequencer::queue::NoteQueue;
use crate::sequencer::timeline::StepClock;
use crate::sequencer::transport::{TransitionError, TransportState};
use std::io;
use std::time::Instant;

/// Plays one client's note sequence on the device
///
/// Owns the session state, the device handle and at most one timing loop.
/// Dropping the engine stops playback.
pub struct PlaybackEngine {
    config: EngineConfig,
    session: SharedSession,
    device: Option<SharedDevice>,
    outbox: ClientOutbox,
    timing_loop: Option<TimingLoopHandle>,
}

impl PlaybackEngine {
    pub fn new(
        config: EngineConfig,
        device: Option<SharedDevice>,
        outbox: ClientOutbox,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let clock = StepClock::new(config.default_bpm, config.steps_per_beat)?;

        Ok(Self {
            config,
            session: Session::new(clock).into_shared(),
            device,
            outbox,
            timing_loop: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn state(&self) -> TransportState {
        lock_session(&self.session).transport.state()
    }

    /// Tempo the next play or seek will use
    pub fn bpm(&self) -> f64 {
        lock_session(&self.session).transport.bpm()
    }

    pub fn current_step(&self) -> f64 {
        lock_session(&self.session)
            .transport
            .current_step(Instant::now())
    }

    /// Copy of the loaded queue
    pub fn queue(&self) -> NoteQueue {
        lock_session(&self.session).queue.clone()
    }

    pub fn is_loop_running(&self) -> bool {
        self.timing_loop.as_ref().is_some_and(|l| !l.is_finished())
    }

    /// Run a parsed client command
    pub fn execute(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Play {
                notes,
                bpm,
                playhead_step,
            } => self.play(notes, bpm, playhead_step),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
            Command::Seek { target_step, notes } => self.seek(target_step, notes),
            Command::SetBpm(bpm) => self.set_bpm(bpm),
        }
    }

    /// Start a new session at `playhead_step`
    ///
    /// A running session is stopped first. Without `bpm` the current tempo
    /// is kept.
    pub fn play(
        &mut self,
        events: Vec<NoteEvent>,
        bpm: Option<f64>,
        playhead_step: f64,
    ) -> Result<(), EngineError> {
        let bpm = match bpm {
            Some(bpm) => validate_bpm(bpm)?,
            None => self.bpm(),
        };
        let playhead_step = validate_playhead(playhead_step)?;
        let clock = StepClock::new(bpm, self.config.steps_per_beat)?;
        let device = self.device.clone().ok_or(EngineError::DeviceUnavailable)?;
        if lock_device(&device).status().get() == DeviceStatus::Disconnected {
            return Err(EngineError::DeviceUnavailable);
        }

        self.halt_loop();
        {
            let mut session = lock_session(&self.session);
            if !session.transport.state().is_stopped() {
                log::info!("Play while {}, restarting session", session.transport.state());
                session.reset();
                if let Err(e) = lock_device(&device).send_stop() {
                    log::warn!("Could not stop device before restart: {}", e);
                }
            }

            session.queue = NoteQueue::load(&events, playhead_step, clock);
            session.events = events;
            session.last_playhead_update = None;
            session.transport.play(clock, playhead_step, Instant::now());
            log::info!(
                "Play: {} notes from step {} at {}",
                session.queue.len(),
                playhead_step,
                clock
            );

            if let Err(e) = lock_device(&device).send_play() {
                session.reset();
                drop(session);
                self.notify_stopped();
                return Err(e.into());
            }
        }

        self.outbox.send(ClientMessage::playback(
            PlaybackStatus::Playing,
            Some(playhead_step),
            Some(bpm),
        ));
        self.start_loop(device);
        Ok(())
    }

    /// Freeze the playhead (only while playing)
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.require("pause", TransportState::is_playing)?;
        self.halt_loop();

        let (playhead_step, bpm) = {
            let now = Instant::now();
            let mut session = lock_session(&self.session);
            session.transport.pause(now)?;
            let playhead_step = session.transport.current_step(now);

            if let Err(e) = self.with_device(DeviceDispatcher::send_stop) {
                session.reset();
                drop(session);
                self.notify_stopped();
                return Err(e.into());
            }
            (playhead_step, session.transport.clock().bpm())
        };

        log::info!("Paused at step {:.2}", playhead_step);
        self.outbox.send(ClientMessage::playback(
            PlaybackStatus::Paused,
            Some(playhead_step),
            Some(bpm),
        ));
        Ok(())
    }

    /// Continue a paused session (only while paused)
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.require("resume", TransportState::is_paused)?;
        let device = self.device.clone().ok_or(EngineError::DeviceUnavailable)?;
        self.halt_loop();

        let (playhead_step, bpm) = {
            let now = Instant::now();
            let mut session = lock_session(&self.session);
            session.transport.resume(now)?;

            if let Err(e) = lock_device(&device).send_play() {
                session.reset();
                drop(session);
                self.notify_stopped();
                return Err(e.into());
            }
            (
                session.transport.current_step(now),
                session.transport.clock().bpm(),
            )
        };

        log::info!("Resumed at step {:.2}", playhead_step);
        self.outbox.send(ClientMessage::playback(
            PlaybackStatus::Playing,
            Some(playhead_step),
            Some(bpm),
        ));
        self.start_loop(device);
        Ok(())
    }

    /// Stop and rewind to step 0 (allowed from any state)
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.halt_loop();
        lock_session(&self.session).reset();

        let result = self.with_device(DeviceDispatcher::send_stop);
        log::info!("Stopped");
        self.notify_stopped();
        result.map_err(EngineError::from)
    }

    /// Move the playhead to `target_step`
    ///
    /// A playing session keeps playing from the new position; paused and
    /// stopped sessions keep their state. `events: None` reuses the events
    /// of the last play.
    pub fn seek(
        &mut self,
        target_step: f64,
        events: Option<Vec<NoteEvent>>,
    ) -> Result<(), EngineError> {
        let target_step = validate_playhead(target_step)?;
        self.halt_loop();

        let (was_playing, state, bpm) = {
            let now = Instant::now();
            let mut session = lock_session(&self.session);
            let was_playing = session.transport.state().is_playing();
            if was_playing {
                session.transport.pause(now)?;
            }

            let bpm = session.transport.bpm();
            let clock = StepClock::new(bpm, self.config.steps_per_beat)?;
            if let Some(events) = events {
                session.events = events;
            }
            let queue = NoteQueue::load(&session.events, target_step, clock);
            session.queue = queue;
            session.last_playhead_update = None;
            session.transport.seek(clock, target_step, now);
            log::info!(
                "Seek to step {}: {} notes ahead",
                target_step,
                session.queue.len()
            );

            (was_playing, session.transport.state(), bpm)
        };

        if was_playing {
            return self.resume();
        }

        let status = match state {
            TransportState::Paused => PlaybackStatus::Paused,
            _ => PlaybackStatus::Stopped,
        };
        self.outbox
            .send(ClientMessage::playback(status, Some(target_step), Some(bpm)));
        Ok(())
    }

    /// Change the tempo used by the next play or seek
    /// Notes already scheduled keep their times
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), EngineError> {
        let bpm = validate_bpm(bpm)?;
        lock_session(&self.session).transport.set_bpm(bpm);

        log::info!("BPM set to {}", bpm);
        self.outbox.send(ClientMessage::BpmUpdated { bpm });
        Ok(())
    }

    /// Stop the loop and silence the device (connection teardown)
    pub fn shutdown(&mut self) {
        self.halt_loop();

        let mut session = lock_session(&self.session);
        if session.transport.state().is_stopped() {
            return;
        }
        session.reset();
        drop(session);

        if let Err(e) = self.with_device(DeviceDispatcher::send_stop) {
            log::warn!("Could not stop device on shutdown: {}", e);
        }
        log::info!("Playback shut down");
    }

    /// Reject a transition before the running loop is disturbed
    fn require(
        &self,
        action: &'static str,
        allowed: fn(&TransportState) -> bool,
    ) -> Result<(), TransitionError> {
        let state = self.state();
        if allowed(&state) {
            Ok(())
        } else {
            Err(TransitionError { action, state })
        }
    }

    fn start_loop(&mut self, device: SharedDevice) {
        let settings = LoopSettings {
            tick_interval: self.config.tick_interval(),
            playhead_update_interval: self.config.playhead_update_interval(),
            grouper: ChordGrouper::new(self.config.chord_tolerance_seconds()),
        };
        self.timing_loop = Some(TimingLoopHandle::spawn(
            self.session.clone(),
            device,
            self.outbox.clone(),
            settings,
        ));
    }

    fn halt_loop(&mut self) -> Option<LoopExit> {
        let exit = self.timing_loop.take()?.cancel_and_join();
        log::debug!("Timing loop joined: {:?}", exit);
        exit
    }

    /// Run `f` on the device if there is one
    fn with_device<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut DeviceDispatcher) -> io::Result<()>,
    {
        match &self.device {
            Some(device) => f(&mut *lock_device(device)),
            None => Ok(()),
        }
    }

    fn notify_stopped(&self) {
        self.outbox.send(ClientMessage::playback(
            PlaybackStatus::Stopped,
            Some(0.0),
            None,
        ));
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
