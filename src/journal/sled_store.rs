use chrono::Utc;
use sled::Db;
use tracing::warn;

use crate::config::JournalSettings;
use crate::engine::Reconciler;
use crate::engine::event::ChatEvent;

/// Append-only record of accepted chat events, one `sled` tree per
/// conversation. Keys are `{created_at:020}_{message_id}` so iteration
/// yields events in canonical order and re-recording a duplicate event
/// lands on the same key.
///
/// Retention options:
/// - `ttl_seconds`: optional age limit; expired events are removed during
///   load.
/// - `max_events_per_conversation`: optional cap; when exceeded the oldest
///   events are removed.
#[derive(Clone)]
pub struct Journal {
    db: Db,
    ttl_seconds: Option<i64>,
    max_events_per_conversation: Option<usize>,
}

impl Journal {
    /// Open or create a sled database at `path` with the given policy.
    pub fn new(
        path: &str,
        ttl_seconds: Option<i64>,
        max_events_per_conversation: Option<usize>,
    ) -> Self {
        let db = sled::open(path).expect("Failed to open sled DB");
        Self {
            db,
            ttl_seconds,
            max_events_per_conversation,
        }
    }

    /// Build a journal from loaded settings. Zero values disable the
    /// corresponding retention policy.
    pub fn from_settings(settings: &JournalSettings) -> Self {
        let ttl = if settings.event_ttl_secs > 0 {
            Some(settings.event_ttl_secs as i64)
        } else {
            None
        };
        let max = if settings.max_events_per_conversation > 0 {
            Some(settings.max_events_per_conversation)
        } else {
            None
        };
        Self::new(&settings.path, ttl, max)
    }

    /// Record an accepted event in its conversation's tree.
    pub fn record(&self, event: &ChatEvent) {
        let message = event.message();

        let serialized = match serde_json::to_vec(event) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to serialize event: {e}");
                return;
            }
        };

        let tree = match self.db.open_tree(&message.conversation_id) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(
                    "failed to open conversation tree '{}': {e}",
                    message.conversation_id
                );
                return;
            }
        };

        let key = format!("{:020}_{}", message.created_at, message.id);

        if let Err(e) = tree.insert(key.as_bytes(), serialized) {
            warn!(
                "failed to record event in conversation '{}': {e}",
                message.conversation_id
            );
            return;
        }

        if let Some(max) = self.max_events_per_conversation {
            let total = tree.len();
            if total > max {
                let excess = total - max;

                let keys_to_delete: Vec<_> = tree
                    .iter()
                    .take(excess)
                    .filter_map(|entry| entry.ok().map(|(k, _)| k))
                    .collect();

                for key in keys_to_delete {
                    if let Err(e) = tree.remove(key) {
                        warn!(
                            "failed to remove old event from '{}': {e}",
                            message.conversation_id
                        );
                    }
                }
            }
        }
    }

    /// Load recorded events for a conversation in canonical order, honoring
    /// the TTL policy.
    pub fn load_events(&self, conversation_id: &str) -> Vec<ChatEvent> {
        self.cleanup_expired(conversation_id);

        let tree = match self.db.open_tree(conversation_id) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("failed to open conversation tree '{conversation_id}': {e}");
                return Vec::new();
            }
        };

        tree.iter()
            .filter_map(|res| res.ok())
            .filter_map(|(_, val)| serde_json::from_slice(&val).ok())
            .collect()
    }

    /// Feed every recorded event for `conversation_id` back through the
    /// engine. Returns how many events inserted a message that was not
    /// already present; replaying into an engine that has seen the stream
    /// before returns 0.
    pub fn replay_into(&self, engine: &mut Reconciler, conversation_id: &str) -> usize {
        self.load_events(conversation_id)
            .into_iter()
            .filter(|event| engine.apply(event.clone()).inserted)
            .count()
    }

    /// Remove events older than the TTL for a single conversation.
    fn cleanup_expired(&self, conversation_id: &str) {
        if let Some(ttl) = self.ttl_seconds {
            let now = Utc::now().timestamp_millis();
            let expiry_time = now - ttl * 1000;

            let tree = match self.db.open_tree(conversation_id) {
                Ok(tree) => tree,
                Err(_) => return,
            };
            let old_keys: Vec<_> = tree
                .iter()
                .filter_map(|res| res.ok())
                .filter_map(|(key_bytes, _)| {
                    let key_str = std::str::from_utf8(&key_bytes).ok()?;
                    let (ts_str, _) = key_str.split_once('_')?;
                    let ts = ts_str.parse::<i64>().ok()?;
                    (ts < expiry_time).then_some(key_bytes)
                })
                .collect();

            for key in old_keys {
                let _ = tree.remove(key);
            }
        }
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").field("db", &"sled::Db").finish()
    }
}
