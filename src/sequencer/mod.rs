// Sequencer module
// Step grid timing, note queue, chord grouping and transport state

pub mod chord;
pub mod note;
pub mod queue;
pub mod timeline;
pub mod transport;

pub use chord::{ChordGroup, ChordGrouper};
pub use note::{NoteEvent, NoteId, ScheduledNote};
pub use queue::NoteQueue;
pub use timeline::StepClock;
pub use transport::{TransitionError, Transport, TransportState};
