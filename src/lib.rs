// Fretbridge - Library exports for the host binary, tests and benchmarks

pub mod config;
pub mod connection;
pub mod device;
pub mod logging;
pub mod messaging;
pub mod playback;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig};
pub use connection::{ClientHub, ConnectionContext};
pub use device::{
    AckReader, AtomicDeviceStatus, DeviceDispatcher, DeviceProtocol, DeviceStatus, SharedDevice,
};
pub use messaging::{
    ClientMessage, ClientOutbox, Command, Outbound, PlaybackStatus, create_outbound_channel,
    parse_command,
};
pub use playback::{EngineError, PlaybackEngine};
pub use sequencer::{
    ChordGroup, ChordGrouper, NoteEvent, NoteId, NoteQueue, ScheduledNote, StepClock, Transport,
    TransportState,
};
