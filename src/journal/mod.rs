//! Event journal for recording and replaying accepted chat events.
//!
//! Replay is how a client restores conversation state after a restart:
//! recorded events are fed back through the reconciler, whose idempotent,
//! order-independent application makes the rebuild deterministic.
//!
//! Backed by `sled` as an embedded key-value store. The journal is a
//! collaborator invoked by the embedder; the engine itself never touches
//! it.

pub mod sled_store;

pub use sled_store::Journal;
