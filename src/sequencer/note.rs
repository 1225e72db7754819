// Note representation for the sequencer
// A note event is a pitch placed on the step grid, with optional fretboard routing

use serde::{Deserialize, Serialize};

/// Unique identifier for notes within a sequence
pub type NoteId = i64;

/// A note as sent by the client
///
/// Immutable once received. `step` is a position on the grid, `string_number`,
/// `fret_number` and `note_group` are routing hints for the instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub id: NoteId,
    pub pitch_name: String,
    pub step: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fret_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_group: Option<i64>,
}

impl NoteEvent {
    /// Creates a plain note (no fretboard routing)
    pub fn new(id: NoteId, pitch_name: impl Into<String>, step: f64) -> Self {
        Self {
            id,
            pitch_name: pitch_name.into(),
            step,
            string_number: None,
            fret_number: None,
            note_group: None,
        }
    }

    /// Route the note to a string/fret position
    pub fn on_string(mut self, string_number: u32, fret_number: u32) -> Self {
        self.string_number = Some(string_number);
        self.fret_number = Some(fret_number);
        self
    }

    /// String and fret, when both routing hints are present
    pub fn fretting(&self) -> Option<(u32, u32)> {
        self.string_number.zip(self.fret_number)
    }
}

/// A note placed on the wall clock of one loaded queue
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    pub event: NoteEvent,

    /// Seconds after the playhead origin the queue was loaded at
    pub time_seconds: f64,

    /// Set once the note has been dispatched in the current session
    pub played: bool,
}

impl ScheduledNote {
    pub fn new(event: NoteEvent, time_seconds: f64) -> Self {
        Self {
            event,
            time_seconds,
            played: false,
        }
    }

    pub fn id(&self) -> NoteId {
        self.event.id
    }

    pub fn pitch_name(&self) -> &str {
        &self.event.pitch_name
    }

    pub fn step(&self) -> f64 {
        self.event.step
    }
}
