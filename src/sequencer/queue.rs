// Note queue - Time-sorted notes for one playback session
// Built from the client's events relative to a playhead origin

use super::note::{NoteEvent, ScheduledNote};
use super::timeline::StepClock;
use std::cmp::Ordering;

/// Notes of the current session, sorted by scheduled time
///
/// Invariants: `time_seconds` is non-decreasing, and no note has a step
/// before the origin the queue was loaded at.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteQueue {
    notes: Vec<ScheduledNote>,
    origin_step: f64,
    clock: Option<StepClock>,
}

impl NoteQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            origin_step: 0.0,
            clock: None,
        }
    }

    /// Build a queue from client events
    ///
    /// Events before `playhead_step` are dropped, the rest are timed relative
    /// to the playhead and sorted (ties broken by step, then id). Loading the
    /// same input twice yields the same queue.
    pub fn load(events: &[NoteEvent], playhead_step: f64, clock: StepClock) -> Self {
        let mut notes: Vec<ScheduledNote> = events
            .iter()
            .filter(|event| {
                if !event.step.is_finite() {
                    log::warn!("Dropping note {} with invalid step {}", event.id, event.step);
                    return false;
                }
                event.step >= playhead_step
            })
            .map(|event| {
                let time_seconds = clock.step_to_seconds(event.step - playhead_step).max(0.0);
                ScheduledNote::new(event.clone(), time_seconds)
            })
            .collect();

        notes.sort_by(compare_scheduled);

        Self {
            notes,
            origin_step: playhead_step,
            clock: Some(clock),
        }
    }

    /// Step the queue was loaded relative to
    pub fn origin_step(&self) -> f64 {
        self.origin_step
    }

    /// Clock the times were computed with (None for an empty, never loaded queue)
    pub fn clock(&self) -> Option<StepClock> {
        self.clock
    }

    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Indices of unplayed notes whose time has come, in queue order
    pub fn due_indices(&self, elapsed_seconds: f64) -> Vec<usize> {
        self.notes
            .iter()
            .enumerate()
            .take_while(|(_, note)| note.time_seconds <= elapsed_seconds)
            .filter(|(_, note)| !note.played)
            .map(|(index, _)| index)
            .collect()
    }

    /// Clones of the notes at `indices`
    pub fn snapshot(&self, indices: &[usize]) -> Vec<ScheduledNote> {
        indices
            .iter()
            .filter_map(|&index| self.notes.get(index).cloned())
            .collect()
    }

    /// Mark a note as dispatched
    /// Returns false if it was already played (or out of range)
    pub fn mark_played(&mut self, index: usize) -> bool {
        match self.notes.get_mut(index) {
            Some(note) if !note.played => {
                note.played = true;
                true
            }
            _ => false,
        }
    }

    /// Number of notes already dispatched
    pub fn played_count(&self) -> usize {
        self.notes.iter().filter(|note| note.played).count()
    }

    /// True once every queued note has been dispatched (vacuously true when empty)
    pub fn is_complete(&self) -> bool {
        self.notes.iter().all(|note| note.played)
    }

    /// Drop every note (called on stop)
    pub fn clear(&mut self) {
        self.notes.clear();
        self.origin_step = 0.0;
    }
}

impl Default for NoteQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue order: time, then original step, then id
pub(crate) fn compare_scheduled(a: &ScheduledNote, b: &ScheduledNote) -> Ordering {
    a.time_seconds
        .total_cmp(&b.time_seconds)
        .then_with(|| a.event.step.total_cmp(&b.event.step))
        .then_with(|| a.event.id.cmp(&b.event.id))
}
