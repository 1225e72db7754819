//! Client protocol tests
//!
//! Drives a connection with raw JSON frames, as a client would, and checks
//! the JSON written back.

use fretbridge::messaging::channels::{OutboundConsumer, drain};
use fretbridge::{
    ClientHub, ConnectionContext, DeviceDispatcher, DeviceProtocol, EngineConfig, Outbound,
    TransportState, create_outbound_channel,
};
use serde_json::{Value, json};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct MemoryDevice(Arc<Mutex<Vec<u8>>>);

impl MemoryDevice {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for MemoryDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn connect(
    config: EngineConfig,
    device: Option<&MemoryDevice>,
    hub: &Arc<ClientHub>,
) -> (ConnectionContext, OutboundConsumer) {
    let device =
        device.map(|d| DeviceDispatcher::new(Box::new(d.clone()), config.protocol).into_shared());
    let (outbox, consumer) = create_outbound_channel(1024);
    let context = ConnectionContext::open(config, device, outbox, Arc::clone(hub)).unwrap();
    (context, consumer)
}

/// Everything queued for the client, as JSON values
fn received(consumer: &mut OutboundConsumer) -> Vec<Value> {
    drain(consumer)
        .iter()
        .map(|frame| serde_json::from_str(&frame.to_json().unwrap()).unwrap())
        .collect()
}

fn of_type<'a>(values: &'a [Value], kind: &str) -> Vec<&'a Value> {
    values.iter().filter(|v| v["type"] == kind).collect()
}

fn wait_for_state(context: &ConnectionContext, state: TransportState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while context.engine().state() != state && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(context.engine().state(), state);
}

#[test]
fn test_full_session_over_json() {
    let hub = Arc::new(ClientHub::new());
    let device = MemoryDevice::default();
    let (mut context, mut consumer) = connect(EngineConfig::default(), Some(&device), &hub);

    assert_eq!(
        received(&mut consumer),
        vec![json!({"type": "connection", "deviceConnected": true})]
    );

    // 4 steps per beat at 240 BPM: one step = 62.5 ms
    context.handle_text(
        r#"{"action":"play","bpm":240,"playheadStep":0,"notes":[
            {"id":10,"pitchName":"E","step":0,"stringNumber":6,"fretNumber":0},
            {"id":11,"pitchName":"G#","step":0,"stringNumber":4,"fretNumber":1},
            {"id":12,"pitchName":"B","step":1}
        ]}"#,
    );
    wait_for_state(&context, TransportState::Stopped);

    assert_eq!(
        device.text(),
        "PLAY\nCHORD_START\nS:6:0:E\nS:4:1:G#\nCHORD_END\nN:B\nSTOP\n"
    );

    let values = received(&mut consumer);
    let playback = of_type(&values, "playback");
    assert_eq!(
        playback,
        vec![
            &json!({"type": "playback", "status": "playing", "playheadStep": 0.0, "bpm": 240.0}),
            &json!({"type": "playback", "status": "complete"}),
        ]
    );

    let chords = of_type(&values, "chord_playing");
    assert_eq!(chords.len(), 1);
    assert_eq!(chords[0]["ids"], json!([10, 11]));
    assert_eq!(chords[0]["pitchNames"], json!(["E", "G#"]));

    let notes = of_type(&values, "note_playing");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["id"], json!(12));
    assert_eq!(notes[0]["step"], json!(1.0));
    assert!(notes[0]["playheadStep"].as_f64().unwrap() >= 1.0);
}

#[test]
fn test_bpm_update_is_confirmed() {
    let hub = Arc::new(ClientHub::new());
    let (mut context, mut consumer) = connect(EngineConfig::default(), None, &hub);
    received(&mut consumer);

    context.handle_text(r#"{"action":"set_bpm","bpm":72.5}"#);
    assert_eq!(
        received(&mut consumer),
        vec![json!({"type": "bpm_updated", "bpm": 72.5})]
    );
    assert_eq!(context.engine().bpm(), 72.5);
}

#[test]
fn test_error_frames() {
    let hub = Arc::new(ClientHub::new());
    let (mut context, mut consumer) = connect(EngineConfig::default(), None, &hub);
    received(&mut consumer);

    context.handle_text(r#"{"action":"play","notes":[]}"#);
    context.handle_text(r#"{"action":"seek","playheadStep":-4}"#);

    let errors = received(&mut consumer);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], json!({"type": "error", "message": "No device connected"}));
    assert_eq!(errors[1]["type"], "error");
}

#[test]
fn test_ignored_frames_produce_nothing() {
    let hub = Arc::new(ClientHub::new());
    let device = MemoryDevice::default();
    let (mut context, mut consumer) = connect(EngineConfig::default(), Some(&device), &hub);
    received(&mut consumer);

    for frame in [
        "",
        "{",
        r#"{"action":"fast_forward"}"#,
        r#"{"action":"pause"}"#,
        r#"{"action":"resume"}"#,
        r#"{"action":"seek"}"#,
        r#"[1,2,3]"#,
    ] {
        context.handle_text(frame);
    }

    assert!(received(&mut consumer).is_empty());
    assert!(device.text().is_empty());
    assert_eq!(context.engine().state(), TransportState::Stopped);
}

#[test]
fn test_seek_then_pause_report_positions() {
    let hub = Arc::new(ClientHub::new());
    let device = MemoryDevice::default();
    let (mut context, mut consumer) = connect(EngineConfig::default(), Some(&device), &hub);
    received(&mut consumer);

    context.handle_text(r#"{"action":"play","notes":[{"id":1,"pitchName":"C","step":1000}]}"#);
    context.handle_text(r#"{"action":"pause"}"#);
    context.handle_text(r#"{"action":"seek","playheadStep":500}"#);

    let values = received(&mut consumer);
    let playback = of_type(&values, "playback");
    assert_eq!(playback.len(), 3);
    assert_eq!(playback[1]["status"], "paused");
    assert_eq!(
        playback[2],
        &json!({"type": "playback", "status": "paused", "playheadStep": 500.0, "bpm": 120.0})
    );
    assert_eq!(context.engine().state(), TransportState::Paused);

    context.handle_text(r#"{"action":"stop"}"#);
    let values = received(&mut consumer);
    assert_eq!(
        of_type(&values, "playback"),
        vec![&json!({"type": "playback", "status": "stopped", "playheadStep": 0.0})]
    );
    assert_eq!(device.text(), "PLAY\nSTOP\nSTOP\n");
}

#[test]
fn test_state_frames_relayed_between_clients() {
    let hub = Arc::new(ClientHub::new());
    let config = EngineConfig {
        legacy_relay: true,
        ..EngineConfig::default()
    };
    let (mut editor, mut editor_rx) = connect(config.clone(), None, &hub);
    let (_viewer, mut viewer_rx) = connect(config, None, &hub);
    received(&mut editor_rx);
    received(&mut viewer_rx);

    let frame = concat!(
        r#"{"type":"state","notes":[{"id":1,"pitchName":"C","step":0}],"#,
        r#""playing":false,"bpm":110}"#
    );
    editor.handle_text(frame);

    let relayed = drain(&mut viewer_rx);
    assert_eq!(relayed, vec![Outbound::Raw(frame.to_string())]);
    assert!(drain(&mut editor_rx).is_empty());

    // Commands are never relayed
    editor.handle_text(r#"{"action":"set_bpm","bpm":100}"#);
    assert!(drain(&mut viewer_rx).is_empty());
}

#[test]
fn test_disconnect_stops_device() {
    let hub = Arc::new(ClientHub::new());
    let device = MemoryDevice::default();
    let (mut context, _consumer) = connect(EngineConfig::default(), Some(&device), &hub);

    context.handle_text(r#"{"action":"play","notes":[{"id":1,"pitchName":"C","step":4000}]}"#);
    assert_eq!(context.engine().state(), TransportState::Playing);

    context.close();
    assert_eq!(device.text(), "PLAY\nSTOP\n");
    assert!(hub.is_empty());
}

#[test]
fn test_simple_protocol_from_config() {
    let hub = Arc::new(ClientHub::new());
    let device = MemoryDevice::default();
    let config = EngineConfig::from_ron("(protocol: Simple, steps_per_beat: 16.0)").unwrap();
    let (mut context, _consumer) = connect(config, Some(&device), &hub);

    context.handle_text(
        r#"{"action":"play","bpm":100,"notes":[{"id":1,"pitchName":"A","step":2.5}]}"#,
    );
    wait_for_state(&context, TransportState::Stopped);

    assert_eq!(device.text(), "PLAY\nNOTE:A,2.5,100\nSTOP\n");
}
