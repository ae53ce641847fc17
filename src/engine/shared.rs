//! Shared concurrent facade over the reconciler
//!
//! The send path (user action) and the receive path (transport
//! notifications) may run on independent execution contexts. This facade
//! serializes mutations per conversation while letting different
//! conversations proceed without cross-blocking: each conversation gets its
//! own engine shard behind its own lock, and a message-id index routes
//! delivery confirmations to the right shard.
//!
//! Lock discipline: the shard registry and the id index are each held only
//! long enough to resolve a shard; no call acquires two shard locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::engine::event::ChatEvent;
use crate::engine::message::{ConversationId, Message, MessageId};
use crate::engine::project::ProjectedMessage;
use crate::engine::reconcile::{AckToken, Applied, Reconciler};
use crate::utils::error::EngineError;
use crate::watcher::{Watcher, WatcherId};

#[derive(Debug, Default, Clone)]
pub struct SharedReconciler {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    shards: RwLock<HashMap<ConversationId, Arc<Mutex<Reconciler>>>>,
    index: RwLock<HashMap<MessageId, ConversationId>>,
}

impl SharedReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transport event. Safe to call concurrently with any other
    /// operation on this handle.
    pub fn apply(&self, event: ChatEvent) -> Applied {
        match event {
            ChatEvent::LocalSend(message) => {
                let (token, inserted) = self.local_send(message);
                Applied {
                    inserted,
                    ack: Some(token),
                }
            }
            ChatEvent::RemoteObserved(message) => Applied {
                inserted: self.remote_observed(message),
                ack: None,
            },
        }
    }

    pub fn local_send(&self, message: Message) -> (AckToken, bool) {
        let conversation_id = message.conversation_id.clone();
        let shard = self.shard(&conversation_id);
        let (token, inserted) = { shard.lock().unwrap().local_send(message) };
        // The shard may have stamped a generated id; index the final one.
        self.index_insert(&token.message_id, &conversation_id);
        (token, inserted)
    }

    pub fn remote_observed(&self, message: Message) -> bool {
        let conversation_id = message.conversation_id.clone();
        let message_id = message.id.clone();
        let shard = self.shard(&conversation_id);
        let inserted = { shard.lock().unwrap().remote_observed(message) };
        self.index_insert(&message_id, &conversation_id);
        inserted
    }

    pub fn mark_sent(&self, message_id: &str) -> Result<(), EngineError> {
        let shard = self.shard_for_message(message_id)?;
        shard.lock().unwrap().mark_sent(message_id)
    }

    pub fn mark_acknowledged(&self, message_id: &str) -> Result<(), EngineError> {
        let shard = self.shard_for_message(message_id)?;
        shard.lock().unwrap().mark_acknowledged(message_id)
    }

    pub fn mark_failed(&self, message_id: &str, reason: &str) -> Result<(), EngineError> {
        let shard = self.shard_for_message(message_id)?;
        shard.lock().unwrap().mark_failed(message_id, reason)
    }

    pub fn retry(&self, message_id: &str) -> Result<(), EngineError> {
        let shard = self.shard_for_message(message_id)?;
        shard.lock().unwrap().retry(message_id)
    }

    /// Ordered `(message, delivery)` rows for rendering. An unknown
    /// conversation yields an empty sequence.
    pub fn project(&self, conversation_id: &str) -> Vec<ProjectedMessage> {
        self.existing_shard(conversation_id)
            .map(|shard| shard.lock().unwrap().project(conversation_id))
            .unwrap_or_default()
    }

    pub fn project_recent(&self, conversation_id: &str, limit: usize) -> Vec<ProjectedMessage> {
        self.existing_shard(conversation_id)
            .map(|shard| shard.lock().unwrap().project_recent(conversation_id, limit))
            .unwrap_or_default()
    }

    /// Register a watcher for one conversation. Creates the conversation's
    /// shard if needed.
    pub fn watch(&self, conversation_id: &str, watcher: Watcher) {
        let shard = self.shard(conversation_id);
        let mut engine = shard.lock().unwrap();
        let watcher_id = watcher.id.clone();
        engine.register_watcher(watcher);
        engine.watch(conversation_id, watcher_id);
    }

    /// Detach a watcher from a conversation and drop its handle there.
    pub fn unwatch(&self, conversation_id: &str, watcher_id: &WatcherId) {
        if let Some(shard) = self.existing_shard(conversation_id) {
            shard.lock().unwrap().cleanup_watcher(watcher_id);
        }
    }

    fn shard(&self, conversation_id: &str) -> Arc<Mutex<Reconciler>> {
        if let Some(shard) = self.inner.shards.read().unwrap().get(conversation_id) {
            return shard.clone();
        }
        let mut shards = self.inner.shards.write().unwrap();
        shards
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    fn existing_shard(&self, conversation_id: &str) -> Option<Arc<Mutex<Reconciler>>> {
        self.inner.shards.read().unwrap().get(conversation_id).cloned()
    }

    fn shard_for_message(&self, message_id: &str) -> Result<Arc<Mutex<Reconciler>>, EngineError> {
        let conversation_id = self
            .inner
            .index
            .read()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownMessage(message_id.to_string()))?;
        Ok(self.shard(&conversation_id))
    }

    fn index_insert(&self, message_id: &str, conversation_id: &str) {
        self.inner
            .index
            .write()
            .unwrap()
            .insert(message_id.to_string(), conversation_id.to_string());
    }
}
