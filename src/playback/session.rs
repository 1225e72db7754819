// Session state shared by the engine and its timing loop

use crate::sequencer::note::NoteEvent;
use crate::sequencer::queue::NoteQueue;
use crate::sequencer::timeline::StepClock;
use crate::sequencer::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Everything one connection's playback mutates
#[derive(Debug)]
pub struct Session {
    pub transport: Transport,
    pub queue: NoteQueue,
    /// Events of the last play, reused by a seek that sends none
    pub events: Vec<NoteEvent>,
    /// When the last playhead update went out
    pub last_playhead_update: Option<Instant>,
}

impl Session {
    pub fn new(clock: StepClock) -> Self {
        Self {
            transport: Transport::new(clock),
            queue: NoteQueue::new(),
            events: Vec::new(),
            last_playhead_update: None,
        }
    }

    /// Back to stopped at step 0 with an empty queue
    pub fn reset(&mut self) {
        self.transport.stop();
        self.queue.clear();
        self.last_playhead_update = None;
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Lock the session, recovering from a poisoned lock
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
