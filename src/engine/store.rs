//! Message store
//!
//! Append-only storage of messages keyed by id, plus the per-conversation
//! ordered index. Inserting an already-known id is a no-op, and the ordered
//! sequence is always derived from `(created_at, id)`, never from call
//! order, so the store is commutative and idempotent under replay.
//!
//! No I/O happens here; durable recording lives in the `journal` module and
//! is driven by the embedder.

use std::collections::HashMap;

use crate::engine::conversation::Conversation;
use crate::engine::message::{ConversationId, Message, MessageId};
use crate::watcher::WatcherId;

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: HashMap<MessageId, Message>,
    conversations: HashMap<ConversationId, Conversation>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            conversations: HashMap::new(),
        }
    }

    /// Insert a message if its id is not already present. Returns whether an
    /// insertion occurred; `false` means the duplicate was ignored.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }
        self.ensure_conversation(&message.conversation_id)
            .insert_ordered(message.created_at, message.id.clone());
        self.messages.insert(message.id.clone(), message);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Messages of a conversation in canonical `(created_at, id)` order.
    /// An unknown conversation id yields an empty sequence.
    pub fn ordered_messages(&self, conversation_id: &str) -> Vec<&Message> {
        self.conversations
            .get(conversation_id)
            .map(|conversation| {
                conversation
                    .message_ids()
                    .filter_map(|id| self.messages.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a conversation, creating it empty if needed.
    pub(crate) fn ensure_conversation(&mut self, id: &str) -> &mut Conversation {
        self.conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id))
    }

    pub(crate) fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.get_mut(id)
    }

    /// Remove a watcher from every conversation it is attached to.
    pub(crate) fn detach_watcher(&mut self, watcher_id: &WatcherId) {
        for conversation in self.conversations.values_mut() {
            conversation.unwatch(watcher_id);
        }
    }
}
