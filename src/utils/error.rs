//! Error types surfaced by the engine.
//!
//! Duplicate insertions are deliberately not represented here; they are
//! no-ops reported through boolean returns. What does error is a
//! transport layer that has drifted out of sync with the store (unknown
//! ids) or violates the delivery state machine (illegal transitions).

use thiserror::Error;

use crate::engine::delivery::DeliveryState;
use crate::engine::message::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A delivery-state call referenced a message id the store has never
    /// seen.
    #[error("unknown message reference: {0}")]
    UnknownMessage(MessageId),

    /// The requested transition is not in the delivery state machine. The
    /// state is left unchanged.
    #[error("illegal delivery transition for {id}: {from:?} -> {to:?}")]
    IllegalTransition {
        id: MessageId,
        from: DeliveryState,
        to: DeliveryState,
    },
}
