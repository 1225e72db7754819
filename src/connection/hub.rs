// Client hub - Registry of connected clients
// Used to relay legacy state frames between clients

use crate::messaging::channels::ClientOutbox;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Outboxes of every open connection, keyed by connection id
#[derive(Default)]
pub struct ClientHub {
    clients: Mutex<HashMap<Uuid, ClientOutbox>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<Uuid, ClientOutbox>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: Uuid, outbox: ClientOutbox) {
        self.clients().insert(id, outbox);
        log::debug!("Client {} registered", id);
    }

    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.clients().remove(&id).is_some();
        if removed {
            log::debug!("Client {} unregistered", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }

    /// Forward `text` verbatim to every client except `sender`
    /// Returns the number of clients it was queued for
    pub fn relay_from(&self, sender: Uuid, text: &str) -> usize {
        self.clients()
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter(|(_, outbox)| outbox.send_raw(text))
            .count()
    }
}
