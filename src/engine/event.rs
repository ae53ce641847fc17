//! Engine boundary events and notices
//!
//! `ChatEvent` is what the transport layer feeds in: local sends from this
//! device and messages observed from the backend, in arbitrary order and
//! interleaving (the transport may redeliver, reorder, or deliver remote
//! echoes of our own sends).
//!
//! `StateChange` is what flows out to watchers after every accepted
//! mutation; the presentation layer re-projects on receipt.

use serde::{Deserialize, Serialize};

use crate::engine::delivery::DeliveryState;
use crate::engine::message::{ConversationId, Message, MessageId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message authored on this device.
    LocalSend(Message),
    /// A message observed from the backend, possibly an echo of our own.
    RemoteObserved(Message),
}

impl ChatEvent {
    pub fn message(&self) -> &Message {
        match self {
            ChatEvent::LocalSend(message) | ChatEvent::RemoteObserved(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChange {
    MessageInserted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    DeliveryUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
        state: DeliveryState,
    },
}
