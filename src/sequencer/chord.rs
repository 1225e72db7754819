// Chord grouping - Batches simultaneous notes into dispatch units
// Notes within the tolerance window of a group's first note form one chord

use super::note::ScheduledNote;
use super::queue::compare_scheduled;

/// One unit handed to the device: a single note or a chord
#[derive(Debug, Clone, PartialEq)]
pub enum ChordGroup {
    Single(ScheduledNote),
    Chord(Vec<ScheduledNote>),
}

impl ChordGroup {
    fn from_members(mut members: Vec<ScheduledNote>) -> Self {
        if members.len() == 1 {
            if let Some(note) = members.pop() {
                return ChordGroup::Single(note);
            }
        }
        ChordGroup::Chord(members)
    }

    /// Members in queue order
    pub fn notes(&self) -> &[ScheduledNote] {
        match self {
            ChordGroup::Single(note) => std::slice::from_ref(note),
            ChordGroup::Chord(notes) => notes,
        }
    }

    pub fn len(&self) -> usize {
        self.notes().len()
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, ChordGroup::Chord(_))
    }

    /// Scheduled time of the group's seed (earliest member)
    pub fn seed_time(&self) -> f64 {
        self.notes().first().map(|n| n.time_seconds).unwrap_or(0.0)
    }
}

/// Partitions due notes into simultaneity groups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordGrouper {
    tolerance_seconds: f64,
}

impl ChordGrouper {
    /// Default simultaneity window: 20 ms
    pub const DEFAULT_TOLERANCE_SECONDS: f64 = 0.020;

    pub fn new(tolerance_seconds: f64) -> Self {
        Self {
            tolerance_seconds: tolerance_seconds.max(0.0),
        }
    }

    pub fn tolerance_seconds(&self) -> f64 {
        self.tolerance_seconds
    }

    /// Group notes by relative time
    ///
    /// The input is re-sorted first, so the result does not depend on the
    /// order notes arrive in. Each group is seeded by its earliest note and
    /// absorbs following notes no later than seed + tolerance.
    pub fn group(&self, mut notes: Vec<ScheduledNote>) -> Vec<ChordGroup> {
        notes.sort_by(compare_scheduled);

        let mut groups = Vec::new();
        let mut current: Vec<ScheduledNote> = Vec::new();
        let mut seed_time = 0.0;

        for note in notes {
            if !current.is_empty() && note.time_seconds - seed_time <= self.tolerance_seconds {
                current.push(note);
                continue;
            }

            if !current.is_empty() {
                groups.push(ChordGroup::from_members(std::mem::take(&mut current)));
            }
            seed_time = note.time_seconds;
            current.push(note);
        }

        if !current.is_empty() {
            groups.push(ChordGroup::from_members(current));
        }

        groups
    }
}

impl Default for ChordGrouper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOLERANCE_SECONDS)
    }
}
