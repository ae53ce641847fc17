//! Conversation management
//!
//! A `Conversation` holds the ordered message index and the set of watcher
//! ids attached to it. Duplicate watch/unwatch calls are no-ops. The index
//! is kept sorted by `(created_at, id)` at all times, so the rendered order
//! never depends on arrival order.
//!
//! Concurrency note: callers must synchronize access to a `Conversation`
//! (for example via the engine lock) when mutating it.

use std::collections::HashSet;

use crate::engine::message::{ConversationId, MessageId};
use crate::watcher::WatcherId;

#[derive(Debug, Default)]
pub struct Conversation {
    pub id: ConversationId,
    pub watchers: HashSet<WatcherId>,
    entries: Vec<(i64, MessageId)>,
}

impl Conversation {
    /// Create an empty conversation with the given key.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            watchers: HashSet::new(),
            entries: Vec::new(),
        }
    }

    /// Attach a watcher. Duplicate attaches are ignored.
    pub fn watch(&mut self, id: WatcherId) {
        self.watchers.insert(id);
    }

    /// Detach a watcher. Unknown ids are ignored.
    pub fn unwatch(&mut self, id: &WatcherId) {
        self.watchers.remove(id);
    }

    /// Insert a message reference, keeping entries sorted by
    /// `(created_at, id)`. Most traffic arrives in order, so append is the
    /// fast path; out-of-order arrivals fall back to a binary search.
    /// The caller guarantees the id is not already present.
    pub(crate) fn insert_ordered(&mut self, created_at: i64, id: MessageId) {
        let key = (created_at, id);
        if self.entries.last().map_or(true, |last| *last <= key) {
            self.entries.push(key);
        } else {
            let pos = self
                .entries
                .binary_search(&key)
                .unwrap_or_else(|insert_at| insert_at);
            self.entries.insert(pos, key);
        }
    }

    /// Message ids in canonical order.
    pub fn message_ids(&self) -> impl Iterator<Item = &MessageId> {
        self.entries.iter().map(|(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stable key for a direct conversation between two participants. The pair
/// is unordered: both participants derive the same key regardless of who is
/// sender and who is receiver.
pub fn direct_id(a: &str, b: &str) -> ConversationId {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}
