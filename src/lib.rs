//! # chatsync
//!
//! `chatsync` is the message-ordering and delivery-state reconciliation core
//! of a chat client. It sits between a raw stream of inbound and outbound
//! message events (from whatever transport the embedder brings) and a
//! consistent, ordered, deduplicated conversation view for rendering.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct
//! responsibility:
//!
//! - `engine`: the reconciliation core itself: message store, delivery-state
//!   tracker, stream reconciler and view projector.
//! - `watcher`: handles through which a presentation layer is notified of
//!   accepted mutations so it can re-project.
//! - `journal`: sled-backed event journal for recording and replaying
//!   accepted events across restarts.
//! - `config`: layered settings loading (defaults, file, environment).
//! - `utils`: shared error types and logging setup.
//!
//! The engine performs no I/O of its own; the transport layer feeds it
//! events and delivery confirmations, and the journal is invoked by the
//! embedder outside the engine's call boundary.

pub mod config;
pub mod engine;
pub mod journal;
pub mod utils;
pub mod watcher;

pub use engine::{Reconciler, SharedReconciler};

#[cfg(test)]
mod tests;
