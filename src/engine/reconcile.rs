//! Stream reconciler
//!
//! This module contains the engine that merges the transport's event stream
//! into consistent state. Responsibilities:
//! - applying `LocalSend` / `RemoteObserved` events idempotently
//! - routing delivery confirmations into the tracker
//! - fanning out state-change notices to conversation watchers
//!
//! Reconciliation never orders by arrival time; the persisted order is
//! always derived from `(created_at, id)`, which makes replaying the same
//! event stream safe and duplicate delivery harmless.
//!
//! Concurrency and usage notes:
//! - The public API here is synchronous and designed to be held behind a
//!   lock by the caller. `SharedReconciler` packages the per-conversation
//!   locking scheme; use it when the send and receive paths run on
//!   independent execution contexts.
//! - No call here performs I/O. Journal recording and network transport are
//!   collaborators invoked outside this boundary.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::delivery::{DeliveryState, DeliveryTracker};
use crate::engine::event::{ChatEvent, StateChange};
use crate::engine::message::{ConversationId, Message, MessageId};
use crate::engine::project::{self, ProjectedMessage};
use crate::engine::store::MessageStore;
use crate::utils::error::EngineError;
use crate::watcher::{Watcher, WatcherId};

/// Handle returned by a local send. The transport layer keeps it and feeds
/// the message id back as delivery confirmations arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

/// Outcome of applying one event. `inserted` is `false` when the duplicate
/// was ignored; that is observability, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub inserted: bool,
    pub ack: Option<AckToken>,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    store: MessageStore,
    delivery: DeliveryTracker,
    watchers: HashMap<WatcherId, Watcher>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            store: MessageStore::new(),
            delivery: DeliveryTracker::new(),
            watchers: HashMap::new(),
        }
    }

    /// Apply one transport event.
    pub fn apply(&mut self, event: ChatEvent) -> Applied {
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

    /// Accept a message authored on this device: store it, mark it pending,
    /// and hand back the token the transport uses for later confirmations.
    /// An unset id or timestamp is stamped here, mirroring sender-side
    /// assignment; a resent message with an id it already carries is a
    /// no-op on content and keeps its current delivery state.
    pub fn local_send(&mut self, mut message: Message) -> (AckToken, bool) {
        if message.id.is_empty() {
            message.id = Uuid::new_v4().to_string();
        }
        if message.created_at == 0 {
            message.created_at = chrono::Utc::now().timestamp_millis();
        }
        let token = AckToken {
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
        };
        let inserted = self.store.insert(message);
        if inserted {
            self.delivery.begin(&token.message_id, DeliveryState::Pending);
            self.notify(
                &token.conversation_id,
                StateChange::MessageInserted {
                    conversation_id: token.conversation_id.clone(),
                    message_id: token.message_id.clone(),
                },
            );
            debug!(message_id = %token.message_id, conversation_id = %token.conversation_id, "local send accepted");
        } else {
            debug!(message_id = %token.message_id, "duplicate local send ignored");
        }
        (token, inserted)
    }

    /// Accept a message observed from the backend. Idempotent on content;
    /// when the message turns out to be the echo of one of our own in-flight
    /// sends, its delivery state advances to acknowledged, since remote
    /// observation implies it reached the backend.
    pub fn remote_observed(&mut self, message: Message) -> bool {
        let message_id = message.id.clone();
        let conversation_id = message.conversation_id.clone();
        let inserted = self.store.insert(message);
        if inserted {
            // Not one of ours in flight: the backend already has it.
            self.delivery
                .begin(&message_id, DeliveryState::Acknowledged);
            self.notify(
                &conversation_id,
                StateChange::MessageInserted {
                    conversation_id: conversation_id.clone(),
                    message_id: message_id.clone(),
                },
            );
            debug!(%message_id, %conversation_id, "remote message stored");
        } else if self.delivery.observe_remote(&message_id) {
            self.notify(
                &conversation_id,
                StateChange::DeliveryUpdated {
                    conversation_id: conversation_id.clone(),
                    message_id: message_id.clone(),
                    state: DeliveryState::Acknowledged,
                },
            );
            debug!(%message_id, "remote echo acknowledged in-flight send");
        }
        inserted
    }

    pub fn mark_sent(&mut self, message_id: &str) -> Result<(), EngineError> {
        self.require_known(message_id)?;
        self.delivery.mark_sent(message_id)?;
        self.notify_delivery(message_id);
        Ok(())
    }

    pub fn mark_acknowledged(&mut self, message_id: &str) -> Result<(), EngineError> {
        self.require_known(message_id)?;
        self.delivery.mark_acknowledged(message_id)?;
        self.notify_delivery(message_id);
        Ok(())
    }

    pub fn mark_failed(&mut self, message_id: &str, reason: &str) -> Result<(), EngineError> {
        self.require_known(message_id)?;
        self.delivery.mark_failed(message_id, reason)?;
        self.notify_delivery(message_id);
        Ok(())
    }

    /// Reset a failed message to pending so the transport can resend it.
    pub fn retry(&mut self, message_id: &str) -> Result<(), EngineError> {
        self.require_known(message_id)?;
        self.delivery.retry(message_id)?;
        self.notify_delivery(message_id);
        Ok(())
    }

    pub fn delivery_state(&self, message_id: &str) -> Option<&DeliveryState> {
        self.delivery.state(message_id)
    }

    /// Ordered `(message, delivery)` rows for rendering.
    pub fn project(&self, conversation_id: &str) -> Vec<ProjectedMessage> {
        project::project(&self.store, &self.delivery, conversation_id)
    }

    /// Trailing window of the projection.
    pub fn project_recent(&self, conversation_id: &str, limit: usize) -> Vec<ProjectedMessage> {
        project::project_recent(&self.store, &self.delivery, conversation_id, limit)
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Register a watcher with the engine. Attach it to conversations with
    /// `watch` to start receiving notices.
    pub fn register_watcher(&mut self, watcher: Watcher) {
        self.watchers.insert(watcher.id.clone(), watcher);
    }

    pub fn remove_watcher(&mut self, watcher_id: &WatcherId) {
        self.watchers.remove(watcher_id);
    }

    /// Attach a registered watcher to a conversation. Creates the
    /// conversation if it does not exist yet.
    pub fn watch(&mut self, conversation_id: &str, watcher_id: WatcherId) {
        self.store.ensure_conversation(conversation_id).watch(watcher_id);
    }

    pub fn unwatch(&mut self, conversation_id: &str, watcher_id: &WatcherId) {
        if let Some(conversation) = self.store.conversation_mut(conversation_id) {
            conversation.unwatch(watcher_id);
        }
    }

    /// Remove a watcher and detach it from every conversation. Used when a
    /// presentation surface goes away.
    pub fn cleanup_watcher(&mut self, watcher_id: &WatcherId) {
        self.remove_watcher(watcher_id);
        self.store.detach_watcher(watcher_id);
        debug!(%watcher_id, "cleaned up watcher");
    }

    fn require_known(&self, message_id: &str) -> Result<(), EngineError> {
        if self.store.contains(message_id) {
            Ok(())
        } else {
            Err(EngineError::UnknownMessage(message_id.to_string()))
        }
    }

    fn notify_delivery(&self, message_id: &str) {
        let Some(message) = self.store.message(message_id) else {
            return;
        };
        let Some(state) = self.delivery.state(message_id) else {
            return;
        };
        self.notify(
            &message.conversation_id,
            StateChange::DeliveryUpdated {
                conversation_id: message.conversation_id.clone(),
                message_id: message_id.to_string(),
                state: state.clone(),
            },
        );
    }

    fn notify(&self, conversation_id: &str, change: StateChange) {
        let Some(conversation) = self.store.conversation(conversation_id) else {
            return;
        };
        for watcher_id in &conversation.watchers {
            if let Some(watcher) = self.watchers.get(watcher_id) {
                if let Err(e) = watcher.sender.send(change.clone()) {
                    warn!(%watcher_id, "failed to notify watcher: {e}");
                }
            } else {
                warn!(%watcher_id, "no watcher registered with id");
            }
        }
    }
}
