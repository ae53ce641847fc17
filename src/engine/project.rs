//! Conversation view projection
//!
//! Derives the read-facing sequence for rendering by joining the message
//! store's canonical order with the delivery tracker's per-message state.
//! Pure function of current state; the engine recomputes it on demand
//! rather than caching.

use serde::{Deserialize, Serialize};

use crate::engine::delivery::{DeliveryState, DeliveryTracker};
use crate::engine::message::Message;
use crate::engine::store::MessageStore;

/// One renderable row: a message together with its delivery state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedMessage {
    pub message: Message,
    pub delivery: DeliveryState,
}

/// Ordered `(message, delivery)` rows for a conversation.
pub fn project(
    store: &MessageStore,
    delivery: &DeliveryTracker,
    conversation_id: &str,
) -> Vec<ProjectedMessage> {
    store
        .ordered_messages(conversation_id)
        .into_iter()
        .map(|message| ProjectedMessage {
            message: message.clone(),
            // A missing state can only mean the store was mutated behind the
            // tracker's back; treat the message as settled.
            delivery: delivery
                .state(&message.id)
                .cloned()
                .unwrap_or(DeliveryState::Acknowledged),
        })
        .collect()
}

/// Trailing window of the projection, for presentation layers that page.
pub fn project_recent(
    store: &MessageStore,
    delivery: &DeliveryTracker,
    conversation_id: &str,
    limit: usize,
) -> Vec<ProjectedMessage> {
    let mut rows = project(store, delivery, conversation_id);
    let start = rows.len().saturating_sub(limit);
    rows.split_off(start)
}
