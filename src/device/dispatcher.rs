// Device dispatcher - Serializes dispatch units onto the device byte stream
// Line oriented protocol, one command per line

use crate::device::status::{AtomicDeviceStatus, DeviceStatus};
use crate::sequencer::chord::ChordGroup;
use crate::sequencer::note::ScheduledNote;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Wire variant understood by the device firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceProtocol {
    /// `NOTE:<pitch>,<step>,<bpm>` per note, no chord markers
    Simple,
    /// `CHORD_START` / `S:` or `N:` lines / `CHORD_END`
    #[default]
    Chord,
}

/// Device shared between connections
/// A whole dispatch unit is written under one lock hold
pub type SharedDevice = Arc<Mutex<DeviceDispatcher>>;

/// Lock a shared device, recovering from a poisoned lock
pub fn lock_device(device: &SharedDevice) -> MutexGuard<'_, DeviceDispatcher> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writes transport commands and notes to the device
pub struct DeviceDispatcher {
    writer: Box<dyn Write + Send>,
    protocol: DeviceProtocol,
    line_delay: Duration,
    status: AtomicDeviceStatus,
}

impl DeviceDispatcher {
    pub const PLAY: &'static str = "PLAY";
    pub const STOP: &'static str = "STOP";
    pub const CHORD_START: &'static str = "CHORD_START";
    pub const CHORD_END: &'static str = "CHORD_END";

    /// Wrap an opened, already configured byte stream
    pub fn new(writer: Box<dyn Write + Send>, protocol: DeviceProtocol) -> Self {
        Self {
            writer,
            protocol,
            line_delay: Duration::ZERO,
            status: AtomicDeviceStatus::new(DeviceStatus::Connected),
        }
    }

    /// Delay between member lines of a chord
    pub fn with_line_delay(mut self, line_delay: Duration) -> Self {
        self.line_delay = line_delay;
        self
    }

    /// Share an existing status flag (e.g. with the ack reader)
    pub fn with_status(self, status: AtomicDeviceStatus) -> Self {
        status.set(DeviceStatus::Connected);
        Self { status, ..self }
    }

    /// Wrap into the shared handle
    pub fn into_shared(self) -> SharedDevice {
        Arc::new(Mutex::new(self))
    }

    pub fn protocol(&self) -> DeviceProtocol {
        self.protocol
    }

    pub fn status(&self) -> AtomicDeviceStatus {
        self.status.clone()
    }

    pub fn send_play(&mut self) -> io::Result<()> {
        self.write_line(Self::PLAY)
    }

    pub fn send_stop(&mut self) -> io::Result<()> {
        self.write_line(Self::STOP)
    }

    /// Send one group; `bpm` is only used by the simple protocol
    pub fn dispatch(&mut self, group: &ChordGroup, bpm: f64) -> io::Result<()> {
        match (self.protocol, group) {
            (DeviceProtocol::Simple, _) => {
                for note in group.notes() {
                    self.write_line(&simple_note_line(note, bpm))?;
                }
                Ok(())
            }
            (DeviceProtocol::Chord, ChordGroup::Single(note)) => {
                self.write_line(&routed_note_line(note))
            }
            (DeviceProtocol::Chord, ChordGroup::Chord(notes)) => {
                self.write_line(Self::CHORD_START)?;
                for note in notes {
                    self.pause_between_lines();
                    self.write_line(&routed_note_line(note))?;
                }
                self.pause_between_lines();
                self.write_line(Self::CHORD_END)
            }
        }
    }

    fn pause_between_lines(&self) {
        if !self.line_delay.is_zero() {
            thread::sleep(self.line_delay);
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());

        if let Err(e) = &result {
            log::error!("Device write failed on '{}': {}", line, e);
            self.status.set(DeviceStatus::Error);
        }
        result
    }
}

/// `NOTE:<pitch>,<step>,<bpm>`
pub fn simple_note_line(note: &ScheduledNote, bpm: f64) -> String {
    format!("NOTE:{},{},{}", note.pitch_name(), note.step(), bpm)
}

/// `S:<string>:<fret>:<pitch>` when routed to a string, `N:<pitch>` otherwise
pub fn routed_note_line(note: &ScheduledNote) -> String {
    match note.event.fretting() {
        Some((string_number, fret_number)) => {
            format!("S:{}:{}:{}", string_number, fret_number, note.pitch_name())
        }
        None => format!("N:{}", note.pitch_name()),
    }
}
