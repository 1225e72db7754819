// Connection context - One client session from open to close
// Parses inbound frames, runs them on the engine, reports failures to the client

use crate::config::EngineConfig;
use crate::connection::hub::ClientHub;
use crate::device::dispatcher::{SharedDevice, lock_device};
use crate::messaging::channels::ClientOutbox;
use crate::messaging::command::{Command, parse_command};
use crate::messaging::notification::ClientMessage;
use crate::playback::{EngineError, PlaybackEngine};
use std::io::{BufRead, ErrorKind};
use std::sync::Arc;
use uuid::Uuid;

/// Per-connection state
///
/// Registered with the hub on open and unregistered on drop; dropping the
/// context also stops its playback.
pub struct ConnectionContext {
    id: Uuid,
    engine: PlaybackEngine,
    outbox: ClientOutbox,
    hub: Arc<ClientHub>,
    legacy_relay: bool,
}

impl ConnectionContext {
    /// Open a connection and greet the client with the device state
    pub fn open(
        config: EngineConfig,
        device: Option<SharedDevice>,
        outbox: ClientOutbox,
        hub: Arc<ClientHub>,
    ) -> Result<Self, EngineError> {
        let device_connected = device
            .as_ref()
            .is_some_and(|device| lock_device(device).status().get().is_connected());
        let legacy_relay = config.legacy_relay;
        let engine = PlaybackEngine::new(config, device, outbox.clone())?;

        let id = Uuid::new_v4();
        hub.register(id, outbox.clone());
        log::info!("Client {} connected (device connected: {})", id, device_connected);
        outbox.send(ClientMessage::Connection { device_connected });

        Ok(Self {
            id,
            engine,
            outbox,
            hub,
            legacy_relay,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Handle one inbound text frame
    /// Never fails: errors are logged and, where relevant, sent to the client
    pub fn handle_text(&mut self, text: &str) {
        match parse_command(text) {
            Ok(command) => {
                if let Err(e) = self.execute(command) {
                    self.report(e);
                }
            }
            Err(e) if self.legacy_relay && e.is_relayable() => {
                let relayed = self.hub.relay_from(self.id, text);
                log::debug!("Relayed frame from {} to {} clients", self.id, relayed);
            }
            Err(e) => self.report(EngineError::MalformedCommand(e.to_string())),
        }
    }

    /// Feed newline-delimited frames from `input` until EOF
    ///
    /// Lines that are not valid UTF-8 are skipped with a warning. Returns
    /// the number of frames handled; only a read error ends the loop early.
    pub fn serve_lines<R: BufRead>(&mut self, mut input: R) -> std::io::Result<usize> {
        let mut buf = Vec::new();
        let mut handled = 0;
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => return Ok(handled),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let text = match std::str::from_utf8(&buf) {
                Ok(text) => text.trim(),
                Err(e) => {
                    log::warn!("Client {}: ignoring frame that is not UTF-8: {}", self.id, e);
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }

            self.handle_text(text);
            handled += 1;
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<(), EngineError> {
        log::debug!("Client {}: {}", self.id, command.name());
        self.engine.execute(command)
    }

    fn report(&self, error: EngineError) {
        if error.is_reported_to_client() {
            log::error!("Client {}: {}", self.id, error);
            self.outbox.send(ClientMessage::error(error.to_string()));
        } else {
            log::warn!("Client {}: ignoring request: {}", self.id, error);
        }
    }

    /// Close the connection (same as dropping it)
    pub fn close(self) {}
}

impl Drop for ConnectionContext {
    fn drop(&mut self) {
        self.engine.shutdown();
        self.hub.unregister(self.id);
        log::info!("Client {} disconnected", self.id);
    }
}
