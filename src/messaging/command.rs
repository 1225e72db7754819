// Types de commandes - Client → Engine
// Inbound frames are JSON objects with an `action` field

use crate::sequencer::note::NoteEvent;
use serde::Deserialize;

/// Action names accepted from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Play,
    Pause,
    Resume,
    Stop,
    Seek,
    SetBpm,
}

/// Raw inbound request, before per-action validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub action: Action,
    #[serde(default)]
    pub notes: Option<Vec<NoteEvent>>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub playhead_step: Option<f64>,
}

/// Validated engine command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play {
        notes: Vec<NoteEvent>,
        bpm: Option<f64>,
        playhead_step: f64,
    },
    Pause,
    Resume,
    Stop,
    /// `notes: None` reuses the events of the last play
    Seek {
        target_step: f64,
        notes: Option<Vec<NoteEvent>>,
    },
    SetBpm(f64),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Seek { .. } => "seek",
            Command::SetBpm(_) => "set_bpm",
        }
    }
}

/// Why an inbound frame was not turned into a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Valid JSON without a known action
    #[error("unrecognised message: {0}")]
    Unrecognized(String),

    /// Known action with a field of the wrong type
    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("{action} requires '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}

impl CommandError {
    /// Frames that may be forwarded verbatim to other clients
    pub fn is_relayable(&self) -> bool {
        matches!(self, CommandError::Unrecognized(_))
    }
}

impl TryFrom<ClientRequest> for Command {
    type Error = CommandError;

    fn try_from(request: ClientRequest) -> Result<Self, Self::Error> {
        let command = match request.action {
            Action::Play => Command::Play {
                notes: request.notes.unwrap_or_default(),
                bpm: request.bpm,
                playhead_step: request.playhead_step.unwrap_or(0.0),
            },
            Action::Pause => Command::Pause,
            Action::Resume => Command::Resume,
            Action::Stop => Command::Stop,
            Action::Seek => Command::Seek {
                target_step: request.playhead_step.ok_or(CommandError::MissingField {
                    action: "seek",
                    field: "playheadStep",
                })?,
                notes: request.notes,
            },
            Action::SetBpm => Command::SetBpm(request.bpm.ok_or(CommandError::MissingField {
                action: "set_bpm",
                field: "bpm",
            })?),
        };
        Ok(command)
    }
}

/// Parse one inbound text frame
pub fn parse_command(text: &str) -> Result<Command, CommandError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    // Only frames without a known action are foreign messages
    match value.get("action") {
        None => return Err(CommandError::Unrecognized("missing 'action'".to_string())),
        Some(action) => {
            Action::deserialize(action)
                .map_err(|e| CommandError::Unrecognized(format!("action: {}", e)))?;
        }
    }

    let request: ClientRequest =
        serde_json::from_value(value).map_err(|e| CommandError::InvalidField(e.to_string()))?;
    Command::try_from(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        let command = parse_command(
            r#"{"action":"play","bpm":90,"playheadStep":4,
                "notes":[{"id":1,"pitchName":"E","step":4,"stringNumber":6,"fretNumber":0},
                         {"id":2,"pitchName":"A","step":8.5}]}"#,
        )
        .unwrap();

        match command {
            Command::Play {
                notes,
                bpm,
                playhead_step,
            } => {
                assert_eq!(notes.len(), 2);
                assert_eq!(notes[0].fretting(), Some((6, 0)));
                assert_eq!(notes[1].step, 8.5);
                assert_eq!(bpm, Some(90.0));
                assert_eq!(playhead_step, 4.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_play_defaults() {
        let command = parse_command(r#"{"action":"play"}"#).unwrap();
        assert_eq!(
            command,
            Command::Play {
                notes: Vec::new(),
                bpm: None,
                playhead_step: 0.0
            }
        );
    }

    #[test]
    fn test_parse_simple_actions() {
        assert_eq!(parse_command(r#"{"action":"pause"}"#).unwrap(), Command::Pause);
        assert_eq!(parse_command(r#"{"action":"resume"}"#).unwrap(), Command::Resume);
        assert_eq!(parse_command(r#"{"action":"stop"}"#).unwrap(), Command::Stop);
        assert_eq!(
            parse_command(r#"{"action":"set_bpm","bpm":140}"#).unwrap(),
            Command::SetBpm(140.0)
        );
    }

    #[test]
    fn test_parse_seek() {
        assert_eq!(
            parse_command(r#"{"action":"seek","playheadStep":12}"#).unwrap(),
            Command::Seek {
                target_step: 12.0,
                notes: None
            }
        );
        match parse_command(r#"{"action":"seek","playheadStep":2,"notes":[]}"#).unwrap() {
            Command::Seek { notes, .. } => assert_eq!(notes, Some(Vec::new())),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(matches!(
            parse_command(r#"{"action":"seek"}"#),
            Err(CommandError::MissingField { field: "playheadStep", .. })
        ));
        assert!(matches!(
            parse_command(r#"{"action":"set_bpm"}"#),
            Err(CommandError::MissingField { field: "bpm", .. })
        ));
    }

    #[test]
    fn test_malformed_frames() {
        let err = parse_command("not json").unwrap_err();
        assert!(matches!(err, CommandError::InvalidJson(_)));
        assert!(!err.is_relayable());

        let err = parse_command(r#"{"action":"rewind"}"#).unwrap_err();
        assert!(err.is_relayable());

        let err = parse_command(r#"{"type":"state","playing":true,"bpm":120}"#).unwrap_err();
        assert!(err.is_relayable());

        let err = parse_command("[1,2,3]").unwrap_err();
        assert!(err.is_relayable());
    }

    #[test]
    fn test_bad_fields_on_known_action_are_not_relayable() {
        let err = parse_command(r#"{"action":"play","notes":"many"}"#).unwrap_err();
        assert!(matches!(err, CommandError::InvalidField(_)));
        assert!(!err.is_relayable());

        let err = parse_command(r#"{"action":"set_bpm","bpm":"fast"}"#).unwrap_err();
        assert!(matches!(err, CommandError::InvalidField(_)));

        let err = parse_command(r#"{"action":42}"#).unwrap_err();
        assert!(err.is_relayable());
    }
}
