//! Delivery-state tracking
//!
//! Each outbound message moves through a small state machine, independent of
//! the store's ordering:
//!
//! ```text
//! pending -> sent -> acknowledged
//! pending -> acknowledged          (remote echo seen before send confirm)
//! pending | sent -> failed
//! failed -> pending                (only via `retry`)
//! ```
//!
//! `acknowledged` and `failed` are terminal apart from `retry`. Transitions
//! outside this set are rejected with `EngineError::IllegalTransition` and
//! leave the state unchanged; they surface a transport-layer bug rather than
//! being silently applied. Retry scheduling itself is transport policy and
//! never happens here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::message::MessageId;
use crate::utils::error::EngineError;

/// Lifecycle stage of a message as perceived by the sending client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Sent,
    Acknowledged,
    Failed { reason: String },
}

/// Tracks delivery states by message id. Sole owner of state mutations; the
/// message store only ever reads these for projection.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    states: HashMap<MessageId, DeliveryState>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Current state for a message, if the tracker has ever seen it.
    pub fn state(&self, id: &str) -> Option<&DeliveryState> {
        self.states.get(id)
    }

    /// Register a message as pending. A message already pending is a no-op;
    /// any other existing state is an illegal transition.
    pub fn mark_pending(&mut self, id: &str) -> Result<(), EngineError> {
        if !self.states.contains_key(id) {
            self.states.insert(id.to_string(), DeliveryState::Pending);
            return Ok(());
        }
        match self.states.get(id) {
            Some(DeliveryState::Pending) | None => Ok(()),
            Some(other) => Err(EngineError::IllegalTransition {
                id: id.to_string(),
                from: other.clone(),
                to: DeliveryState::Pending,
            }),
        }
    }

    pub fn mark_sent(&mut self, id: &str) -> Result<(), EngineError> {
        self.transition(id, DeliveryState::Sent)
    }

    pub fn mark_acknowledged(&mut self, id: &str) -> Result<(), EngineError> {
        self.transition(id, DeliveryState::Acknowledged)
    }

    pub fn mark_failed(&mut self, id: &str, reason: &str) -> Result<(), EngineError> {
        self.transition(
            id,
            DeliveryState::Failed {
                reason: reason.to_string(),
            },
        )
    }

    /// Reset a failed message to pending so the transport can resend it.
    /// This is the only way out of `failed`.
    pub fn retry(&mut self, id: &str) -> Result<(), EngineError> {
        let current = self
            .states
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownMessage(id.to_string()))?;
        match current {
            DeliveryState::Failed { .. } => {
                *current = DeliveryState::Pending;
                Ok(())
            }
            other => Err(EngineError::IllegalTransition {
                id: id.to_string(),
                from: other.clone(),
                to: DeliveryState::Pending,
            }),
        }
    }

    /// Absorb a remote observation of `id`: an in-flight state advances to
    /// `acknowledged`, an unseen id registers directly as `acknowledged`,
    /// terminal states are left alone. Returns whether the state changed.
    pub fn observe_remote(&mut self, id: &MessageId) -> bool {
        if !self.states.contains_key(id) {
            self.states
                .insert(id.clone(), DeliveryState::Acknowledged);
            return true;
        }
        match self.states.get_mut(id) {
            Some(current) => match current {
                DeliveryState::Pending | DeliveryState::Sent => {
                    *current = DeliveryState::Acknowledged;
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    /// Insert an initial state if the id is unknown. Idempotent.
    pub(crate) fn begin(&mut self, id: &MessageId, state: DeliveryState) -> bool {
        if self.states.contains_key(id) {
            return false;
        }
        self.states.insert(id.clone(), state);
        true
    }

    fn transition(&mut self, id: &str, to: DeliveryState) -> Result<(), EngineError> {
        let current = self
            .states
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownMessage(id.to_string()))?;
        if permitted(current, &to) {
            *current = to;
            Ok(())
        } else {
            Err(EngineError::IllegalTransition {
                id: id.to_string(),
                from: current.clone(),
                to,
            })
        }
    }
}

/// Valid transition set. `failed -> pending` is deliberately absent here;
/// it is reserved for `retry`.
fn permitted(from: &DeliveryState, to: &DeliveryState) -> bool {
    use DeliveryState::*;
    matches!(
        (from, to),
        (Pending, Sent)
            | (Pending, Acknowledged)
            | (Sent, Acknowledged)
            | (Pending, Failed { .. })
            | (Sent, Failed { .. })
    )
}
