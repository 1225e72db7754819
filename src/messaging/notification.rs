// Messages sent to the client
// One JSON object per message, tagged by `type`

use crate::sequencer::chord::ChordGroup;
use crate::sequencer::note::NoteId;
use serde::{Deserialize, Serialize};

/// Playback status reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    Complete,
}

/// Outbound client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Connection { device_connected: bool },

    #[serde(rename_all = "camelCase")]
    Playback {
        status: PlaybackStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        playhead_step: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bpm: Option<f64>,
    },

    /// Throttled playhead position, `time` in seconds since the origin
    #[serde(rename_all = "camelCase")]
    PlayheadUpdate { playhead_step: f64, time: f64 },

    #[serde(rename_all = "camelCase")]
    NotePlaying {
        id: NoteId,
        pitch_name: String,
        step: f64,
        playhead_step: f64,
    },

    #[serde(rename_all = "camelCase")]
    ChordPlaying {
        ids: Vec<NoteId>,
        pitch_names: Vec<String>,
        step: f64,
        playhead_step: f64,
    },

    BpmUpdated { bpm: f64 },

    Error { message: String },
}

impl ClientMessage {
    pub fn playback(status: PlaybackStatus, playhead_step: Option<f64>, bpm: Option<f64>) -> Self {
        ClientMessage::Playback {
            status,
            playhead_step,
            bpm,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ClientMessage::Error {
            message: message.into(),
        }
    }

    /// Notification for one dispatched group
    /// `step` is the group's seed step
    pub fn for_group(group: &ChordGroup, playhead_step: f64) -> Self {
        match group {
            ChordGroup::Single(note) => ClientMessage::NotePlaying {
                id: note.id(),
                pitch_name: note.pitch_name().to_string(),
                step: note.step(),
                playhead_step,
            },
            ChordGroup::Chord(notes) => ClientMessage::ChordPlaying {
                ids: notes.iter().map(|n| n.id()).collect(),
                pitch_names: notes.iter().map(|n| n.pitch_name().to_string()).collect(),
                step: notes.first().map(|n| n.step()).unwrap_or(playhead_step),
                playhead_step,
            },
        }
    }

    /// Short name of the message type, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connection { .. } => "connection",
            ClientMessage::Playback { .. } => "playback",
            ClientMessage::PlayheadUpdate { .. } => "playhead_update",
            ClientMessage::NotePlaying { .. } => "note_playing",
            ClientMessage::ChordPlaying { .. } => "chord_playing",
            ClientMessage::BpmUpdated { .. } => "bpm_updated",
            ClientMessage::Error { .. } => "error",
        }
    }
}

/// Frame queued for a client: a typed message or text relayed verbatim
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ClientMessage),
    Raw(String),
}

impl Outbound {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Message(message) => serde_json::to_string(message),
            Outbound::Raw(text) => Ok(text.clone()),
        }
    }

    pub fn message(&self) -> Option<&ClientMessage> {
        match self {
            Outbound::Message(message) => Some(message),
            Outbound::Raw(_) => None,
        }
    }
}
