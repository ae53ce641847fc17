//! Message definitions for the engine
//!
//! `Message` is the canonical internal representation of a chat message.
//! Content is immutable once the message exists; only its delivery state
//! (tracked separately) evolves.
//!
//! Notes on fields:
//! - `id`: globally unique, assigned by the sender at creation time, never
//!   by storage. A message with a given `id` is the same message no matter
//!   how many times it is observed from the stream.
//! - `conversation_id`: stable symmetric conversation key (see
//!   `conversation::direct_id` for direct chats).
//! - `created_at`: milliseconds since UNIX epoch, assigned by the sender,
//!   monotonic per sender. Canonical ordering is `(created_at, id)`.

use serde::{Deserialize, Serialize};

pub type MessageId = String;
pub type ConversationId = String;
pub type UserId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: i64,
}
