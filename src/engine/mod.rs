//! The reconciliation engine.
//!
//! Public types:
//! - `Reconciler`: synchronous single-owner engine; callers bring their own
//!   locking if they share it.
//! - `SharedReconciler`: cloneable concurrent facade with one lock per
//!   conversation shard.
//!
//! This module is intended to be used by a transport layer (which feeds it
//! events and delivery confirmations) and a presentation layer (which calls
//! the projection and listens for watcher notices).

pub mod conversation;
pub mod delivery;
pub mod event;
pub mod message;
pub mod project;
pub mod reconcile;
pub mod shared;
pub mod store;

pub use reconcile::{AckToken, Applied, Reconciler};
pub use shared::SharedReconciler;

#[cfg(test)]
mod tests;
