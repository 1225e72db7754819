// Timing loop - Background thread dispatching due notes
// One loop per playing session, cancelled and joined before every transport change

use crate::device::dispatcher::{SharedDevice, lock_device};
use crate::messaging::channels::ClientOutbox;
use crate::messaging::notification::{ClientMessage, PlaybackStatus};
use crate::playback::session::{SharedSession, lock_session};
use crate::sequencer::chord::ChordGrouper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Why the loop thread returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    /// Every queued note was dispatched
    Completed,
    /// The transport was no longer playing
    NotPlaying,
    /// A device write failed, the session was aborted
    DeviceFailed,
}

/// Loop timing parameters
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    pub playhead_update_interval: Duration,
    pub grouper: ChordGrouper,
}

/// Handle on a running loop thread
pub struct TimingLoopHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<LoopExit>>,
}

impl TimingLoopHandle {
    pub fn spawn(
        session: SharedSession,
        device: SharedDevice,
        outbox: ClientOutbox,
        settings: LoopSettings,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let timing_loop = TimingLoop {
            session,
            device,
            outbox,
            settings,
            cancel: Arc::clone(&cancel),
        };

        let thread = thread::spawn(move || {
            let exit = timing_loop.run();
            log::debug!("Timing loop exited: {:?}", exit);
            exit
        });

        Self {
            cancel,
            thread: Some(thread),
        }
    }

    /// Ask the loop to stop at its next check
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Cancel and wait for the thread
    /// Returns None if the thread panicked
    pub fn cancel_and_join(mut self) -> Option<LoopExit> {
        self.cancel();
        self.thread.take().and_then(|thread| match thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                log::error!("Timing loop panicked");
                None
            }
        })
    }
}

impl Drop for TimingLoopHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// State moved into the loop thread
pub(crate) struct TimingLoop {
    pub(crate) session: SharedSession,
    pub(crate) device: SharedDevice,
    pub(crate) outbox: ClientOutbox,
    pub(crate) settings: LoopSettings,
    pub(crate) cancel: Arc<AtomicBool>,
}

impl TimingLoop {
    fn run(self) -> LoopExit {
        loop {
            if self.is_cancelled() {
                return LoopExit::Cancelled;
            }
            if let Some(exit) = self.tick(Instant::now()) {
                return exit;
            }
            thread::sleep(self.settings.tick_interval);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// One polling pass at `now`
    ///
    /// Due notes are grouped and dispatched one group at a time; a note is
    /// marked played only after its group reached the device. Returns
    /// Some when the loop must exit.
    pub(crate) fn tick(&self, now: Instant) -> Option<LoopExit> {
        let mut session = lock_session(&self.session);
        if !session.transport.state().is_playing() {
            return Some(LoopExit::NotPlaying);
        }

        let elapsed = session.transport.elapsed(now);
        let current_step = session.transport.current_step(now);
        let bpm = session.transport.clock().bpm();

        let due = session.queue.due_indices(elapsed);
        if !due.is_empty() {
            let groups = self.settings.grouper.group(session.queue.snapshot(&due));

            // Groups come out in queue order, so they cover `due` in runs
            let mut cursor = 0;
            for group in &groups {
                if self.is_cancelled() {
                    return Some(LoopExit::Cancelled);
                }

                if let Err(e) = lock_device(&self.device).dispatch(group, bpm) {
                    session.reset();
                    drop(session);
                    self.outbox
                        .send(ClientMessage::error(format!("Device write failed: {}", e)));
                    self.outbox.send(ClientMessage::playback(
                        PlaybackStatus::Stopped,
                        Some(0.0),
                        None,
                    ));
                    return Some(LoopExit::DeviceFailed);
                }

                let end = (cursor + group.len()).min(due.len());
                for &index in &due[cursor..end] {
                    session.queue.mark_played(index);
                }
                cursor = end;

                self.outbox.send(ClientMessage::for_group(group, current_step));
            }
        }

        let interval = self.settings.playhead_update_interval;
        let update_due = session
            .last_playhead_update
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if update_due {
            session.last_playhead_update = Some(now);
            self.outbox.send(ClientMessage::PlayheadUpdate {
                playhead_step: current_step,
                time: elapsed,
            });
        }

        if session.queue.is_complete() {
            log::info!(
                "Playback complete: {} notes dispatched",
                session.queue.played_count()
            );
            session.reset();
            if let Err(e) = lock_device(&self.device).send_stop() {
                log::warn!("Could not stop device after completion: {}", e);
            }
            drop(session);
            self.outbox
                .send(ClientMessage::playback(PlaybackStatus::Complete, None, None));
            return Some(LoopExit::Completed);
        }

        None
    }
}
