// Communication channels lock-free
// Engine and timing loop → connection writer, one queue per client

use crate::messaging::notification::{ClientMessage, Outbound};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::{Arc, Mutex, PoisonError};

pub type OutboundProducer = ringbuf::HeapProd<Outbound>;
pub type OutboundConsumer = ringbuf::HeapCons<Outbound>;

pub fn create_outbound_channel(capacity: usize) -> (ClientOutbox, OutboundConsumer) {
    let rb = HeapRb::<Outbound>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    (ClientOutbox::new(producer), consumer)
}

/// Sending half of a client's outbound queue
///
/// Cloned into the engine and its timing loop. Sends never block: when the
/// client stops draining, frames are dropped with a warning.
#[derive(Clone)]
pub struct ClientOutbox {
    producer: Arc<Mutex<OutboundProducer>>,
}

impl ClientOutbox {
    pub fn new(producer: OutboundProducer) -> Self {
        Self {
            producer: Arc::new(Mutex::new(producer)),
        }
    }

    /// Queue a typed message, false if it was dropped
    pub fn send(&self, message: ClientMessage) -> bool {
        self.push(Outbound::Message(message))
    }

    /// Queue text to be forwarded as is
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.push(Outbound::Raw(text.into()))
    }

    /// Frames waiting to be drained
    pub fn pending(&self) -> usize {
        self.producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .occupied_len()
    }

    fn push(&self, frame: Outbound) -> bool {
        let mut producer = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        match producer.try_push(frame) {
            Ok(()) => true,
            Err(frame) => {
                let kind = frame.message().map(|m| m.kind()).unwrap_or("raw");
                log::warn!("Client queue full, dropping {} message", kind);
                false
            }
        }
    }
}

/// Pop everything currently queued
pub fn drain(consumer: &mut OutboundConsumer) -> Vec<Outbound> {
    let mut frames = Vec::with_capacity(consumer.occupied_len());
    while let Some(frame) = consumer.try_pop() {
        frames.push(frame);
    }
    frames
}

/// Pop only the typed messages (relayed text is skipped)
pub fn drain_messages(consumer: &mut OutboundConsumer) -> Vec<ClientMessage> {
    drain(consumer)
        .into_iter()
        .filter_map(|frame| match frame {
            Outbound::Message(message) => Some(message),
            Outbound::Raw(_) => None,
        })
        .collect()
}
