//! Outbound chain-event port
//!
//! A single-producer, multi-consumer stream of envelope messages. The node
//! enqueues one envelope per accepted block; delivery and peer management
//! belong to the consumers. Sends never block: with nobody listening the
//! event is dropped with a diagnostic.

use crate::core::block::{current_timestamp, Block};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Envelopes buffered per subscriber before the oldest are dropped
const BROADCAST_CAPACITY: usize = 100;

/// Wire frame kinds, serialized as integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    QueryLatest,
    QueryAll,
    ResponseBlockchain,
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value: u8 = match self {
            MessageType::QueryLatest => 0,
            MessageType::QueryAll => 1,
            MessageType::ResponseBlockchain => 2,
        };
        serializer.serialize_u8(value)
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(MessageType::QueryLatest),
            1 => Ok(MessageType::QueryAll),
            2 => Ok(MessageType::ResponseBlockchain),
            other => Err(de::Error::custom(format!("unknown message type {other}"))),
        }
    }
}

/// Gossip envelope exchanged with peers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub message_type: MessageType,
    pub message: String,
    pub timestamp: i64,
}

/// Broadcaster for chain events
#[derive(Debug)]
pub struct ChainBroadcaster {
    sender: broadcast::Sender<Message>,
}

impl ChainBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Enqueues the envelope for an accepted block
    pub fn announce_block(&self, block: &Block) {
        let payload = match serde_json::to_string(block) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("failed to serialize block {}: {}", block.index, e);
                return;
            }
        };
        self.send(Message {
            id: block.hash.clone(),
            message_type: MessageType::ResponseBlockchain,
            message: payload,
            timestamp: current_timestamp(),
        });
    }

    /// Non-blocking send; drops the envelope when nobody is subscribed
    pub fn send(&self, message: Message) {
        if let Err(e) = self.sender.send(message) {
            log::debug!("broadcast envelope dropped: {}", e);
        }
    }

    /// Subscribes a new consumer
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChainBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
