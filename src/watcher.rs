//! Watcher representation
//!
//! `Watcher` models an attached presentation surface and holds the sending
//! side of a per-watcher channel used by the engine to push state-change
//! notices. The receiving side stays with the presentation layer, which
//! re-projects the affected conversation on every notice.

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::engine::event::StateChange;

pub type WatcherId = String;

#[derive(Debug)]
pub struct Watcher {
    pub id: WatcherId,
    pub sender: UnboundedSender<StateChange>,
}

impl Watcher {
    /// Create a new watcher with a sender channel. The `id` is a UUID used
    /// to identify the watcher across engine operations.
    pub fn new(sender: UnboundedSender<StateChange>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
        }
    }
}
