use tokio::sync::mpsc;

use super::conversation::{self, Conversation};
use super::delivery::{DeliveryState, DeliveryTracker};
use super::event::{ChatEvent, StateChange};
use super::message::Message;
use super::store::MessageStore;
use super::{Reconciler, SharedReconciler};
use crate::utils::error::EngineError;
use crate::watcher::Watcher;

fn message(id: &str, conversation_id: &str, sender_id: &str, created_at: i64) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        body: format!("body of {id}"),
        created_at,
    }
}

#[test]
fn test_direct_id_is_symmetric() {
    assert_eq!(
        conversation::direct_id("alice", "bob"),
        conversation::direct_id("bob", "alice")
    );
    assert_eq!(conversation::direct_id("alice", "bob"), "alice:bob");
}

#[test]
fn test_conversation_watch_unwatch() {
    let mut conversation = Conversation::new("c1");
    conversation.watch("w1".to_string());
    conversation.watch("w1".to_string());
    assert!(conversation.watchers.contains("w1"));
    assert_eq!(conversation.watchers.len(), 1);

    conversation.unwatch(&"w1".to_string());
    assert!(!conversation.watchers.contains("w1"));
}

#[test]
fn test_store_insert_is_idempotent() {
    let mut store = MessageStore::new();
    assert!(store.insert(message("m1", "c1", "alice", 100)));
    assert!(!store.insert(message("m1", "c1", "alice", 100)));

    assert_eq!(store.len(), 1);
    assert_eq!(store.ordered_messages("c1").len(), 1);
}

#[test]
fn test_store_order_is_permutation_independent() {
    let messages = [
        message("m1", "c1", "alice", 100),
        message("m2", "c1", "bob", 50),
        message("m3", "c1", "alice", 100),
    ];
    // Expected canonical order: (50, m2), (100, m1), (100, m3).
    let expected = vec!["m2", "m1", "m3"];

    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for permutation in permutations {
        let mut store = MessageStore::new();
        for &index in &permutation {
            store.insert(messages[index].clone());
        }
        let ids: Vec<_> = store
            .ordered_messages("c1")
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(ids, expected, "permutation {permutation:?}");
    }
}

#[test]
fn test_delivery_happy_path() {
    let mut tracker = DeliveryTracker::new();
    tracker.mark_pending("m1").unwrap();
    tracker.mark_sent("m1").unwrap();
    tracker.mark_acknowledged("m1").unwrap();
    assert_eq!(tracker.state("m1"), Some(&DeliveryState::Acknowledged));
}

#[test]
fn test_delivery_rejects_illegal_transitions() {
    let mut tracker = DeliveryTracker::new();
    tracker.mark_pending("m1").unwrap();
    tracker.mark_acknowledged("m1").unwrap();

    // Acknowledged is terminal.
    let err = tracker.mark_sent("m1").unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(tracker.state("m1"), Some(&DeliveryState::Acknowledged));

    // Failed only exits through retry.
    tracker.mark_pending("m2").unwrap();
    tracker.mark_failed("m2", "timeout").unwrap();
    assert!(tracker.mark_acknowledged("m2").is_err());
    assert_eq!(
        tracker.state("m2"),
        Some(&DeliveryState::Failed {
            reason: "timeout".to_string()
        })
    );
}

#[test]
fn test_delivery_unknown_message() {
    let mut tracker = DeliveryTracker::new();
    assert_eq!(
        tracker.mark_sent("nope"),
        Err(EngineError::UnknownMessage("nope".to_string()))
    );
}

#[test]
fn test_retry_resets_failed_only() {
    let mut tracker = DeliveryTracker::new();
    tracker.mark_pending("m1").unwrap();
    assert!(tracker.retry("m1").is_err());

    tracker.mark_failed("m1", "timeout").unwrap();
    tracker.retry("m1").unwrap();
    assert_eq!(tracker.state("m1"), Some(&DeliveryState::Pending));

    // The reset message can complete normally afterwards.
    tracker.mark_acknowledged("m1").unwrap();
    assert_eq!(tracker.state("m1"), Some(&DeliveryState::Acknowledged));
}

#[test]
fn test_local_send_sets_pending() {
    let mut engine = Reconciler::new();
    let (token, inserted) = engine.local_send(message("m1", "c1", "alice", 100));

    assert!(inserted);
    assert_eq!(token.message_id, "m1");
    assert_eq!(token.conversation_id, "c1");
    assert_eq!(engine.delivery_state("m1"), Some(&DeliveryState::Pending));
}

#[test]
fn test_local_send_stamps_missing_id_and_timestamp() {
    let mut engine = Reconciler::new();
    let mut draft = message("", "c1", "alice", 0);
    draft.body = "hello".to_string();

    let (token, inserted) = engine.local_send(draft);
    assert!(inserted);
    assert!(!token.message_id.is_empty());

    let rows = engine.project("c1");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].message.created_at > 0);
}

#[test]
fn test_remote_echo_acknowledges_in_flight_send() {
    let mut engine = Reconciler::new();
    engine.local_send(message("m1", "c1", "alice", 100));
    let inserted = engine.remote_observed(message("m1", "c1", "alice", 100));

    assert!(!inserted);
    assert_eq!(engine.store().len(), 1);
    assert_eq!(
        engine.delivery_state("m1"),
        Some(&DeliveryState::Acknowledged)
    );
}

#[test]
fn test_remote_message_enters_acknowledged() {
    let mut engine = Reconciler::new();
    assert!(engine.remote_observed(message("m1", "c1", "bob", 100)));
    assert_eq!(
        engine.delivery_state("m1"),
        Some(&DeliveryState::Acknowledged)
    );
}

#[test]
fn test_remote_echo_does_not_resurrect_failed_send() {
    let mut engine = Reconciler::new();
    engine.local_send(message("m1", "c1", "alice", 100));
    engine.mark_failed("m1", "timeout").unwrap();

    engine.remote_observed(message("m1", "c1", "alice", 100));
    assert_eq!(
        engine.delivery_state("m1"),
        Some(&DeliveryState::Failed {
            reason: "timeout".to_string()
        })
    );
}

#[test]
fn test_duplicate_local_send_keeps_delivery_state() {
    let mut engine = Reconciler::new();
    engine.local_send(message("m1", "c1", "alice", 100));
    engine.mark_acknowledged("m1").unwrap();

    let (_, inserted) = engine.local_send(message("m1", "c1", "alice", 100));
    assert!(!inserted);
    assert_eq!(
        engine.delivery_state("m1"),
        Some(&DeliveryState::Acknowledged)
    );
}

#[test]
fn test_projection_orders_by_created_at() {
    let mut engine = Reconciler::new();
    engine.local_send(message("m1", "c1", "alice", 100));
    engine.local_send(message("m2", "c1", "alice", 50));

    let ids: Vec<_> = engine
        .project("c1")
        .iter()
        .map(|row| row.message.id.clone())
        .collect();
    assert_eq!(ids, vec!["m2", "m1"]);
}

#[test]
fn test_project_recent_limits_window() {
    let mut engine = Reconciler::new();
    for i in 0..5 {
        engine.remote_observed(message(&format!("m{i}"), "c1", "bob", 100 + i));
    }

    let ids: Vec<_> = engine
        .project_recent("c1", 2)
        .iter()
        .map(|row| row.message.id.clone())
        .collect();
    assert_eq!(ids, vec!["m3", "m4"]);

    assert_eq!(engine.project_recent("c1", 10).len(), 5);
    assert!(engine.project_recent("unknown", 3).is_empty());
}

#[test]
fn test_delivery_calls_require_stored_message() {
    let mut engine = Reconciler::new();
    assert_eq!(
        engine.mark_sent("ghost"),
        Err(EngineError::UnknownMessage("ghost".to_string()))
    );
}

#[test]
fn test_replaying_event_stream_is_idempotent() {
    let events = vec![
        ChatEvent::LocalSend(message("m1", "c1", "alice", 100)),
        ChatEvent::RemoteObserved(message("m2", "c1", "bob", 50)),
        ChatEvent::RemoteObserved(message("m1", "c1", "alice", 100)),
        ChatEvent::LocalSend(message("m3", "c2", "alice", 10)),
    ];

    let mut engine = Reconciler::new();
    for event in &events {
        engine.apply(event.clone());
    }
    let first_c1 = engine.project("c1");
    let first_c2 = engine.project("c2");

    for event in &events {
        let applied = engine.apply(event.clone());
        assert!(!applied.inserted);
    }
    assert_eq!(engine.project("c1"), first_c1);
    assert_eq!(engine.project("c2"), first_c2);
}

#[test]
fn test_watcher_notified_on_insert_and_delivery() {
    let mut engine = Reconciler::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<StateChange>();
    let watcher = Watcher::new(tx);
    let watcher_id = watcher.id.clone();
    engine.register_watcher(watcher);
    engine.watch("c1", watcher_id);

    engine.local_send(message("m1", "c1", "alice", 100));
    assert_eq!(
        rx.try_recv().unwrap(),
        StateChange::MessageInserted {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
        }
    );

    engine.mark_sent("m1").unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        StateChange::DeliveryUpdated {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
            state: DeliveryState::Sent,
        }
    );

    // Mutations in other conversations stay silent.
    engine.local_send(message("m2", "c2", "alice", 100));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_cleanup_watcher_stops_notifications() {
    let mut engine = Reconciler::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<StateChange>();
    let watcher = Watcher::new(tx);
    let watcher_id = watcher.id.clone();
    engine.register_watcher(watcher);
    engine.watch("c1", watcher_id.clone());

    engine.cleanup_watcher(&watcher_id);
    engine.local_send(message("m1", "c1", "alice", 100));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_notify_watcher_with_closed_channel() {
    let mut engine = Reconciler::new();
    let (tx, rx) = mpsc::unbounded_channel::<StateChange>();
    let watcher = Watcher::new(tx);
    let watcher_id = watcher.id.clone();
    engine.register_watcher(watcher);
    engine.watch("c1", watcher_id);

    // Drop the receiver to close the channel; the engine just logs.
    drop(rx);
    engine.local_send(message("m1", "c1", "alice", 100));
}

#[test]
fn test_shared_routes_delivery_by_message_id() {
    let shared = SharedReconciler::new();
    let (token, inserted) = shared.local_send(message("m1", "c1", "alice", 100));
    assert!(inserted);

    shared.mark_sent(&token.message_id).unwrap();
    shared.mark_acknowledged(&token.message_id).unwrap();

    let rows = shared.project("c1");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].delivery, DeliveryState::Acknowledged);

    assert_eq!(
        shared.mark_sent("ghost"),
        Err(EngineError::UnknownMessage("ghost".to_string()))
    );
}

#[test]
fn test_shared_concurrent_sends_keep_order() {
    let shared = SharedReconciler::new();

    let mut handles = Vec::new();
    for device in 0..4 {
        let shared = shared.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                let conversation = if device % 2 == 0 { "c_even" } else { "c_odd" };
                let id = format!("d{device}_m{i}");
                let created_at = 1000 + i;
                if device < 2 {
                    shared.local_send(message(&id, conversation, "alice", created_at));
                } else {
                    shared.remote_observed(message(&id, conversation, "bob", created_at));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for conversation in ["c_even", "c_odd"] {
        let rows = shared.project(conversation);
        assert_eq!(rows.len(), 50);
        // Canonical order regardless of thread interleaving.
        let mut keys: Vec<_> = rows
            .iter()
            .map(|row| (row.message.created_at, row.message.id.clone()))
            .collect();
        let sorted = {
            let mut sorted = keys.clone();
            sorted.sort();
            sorted
        };
        assert_eq!(keys, sorted);
        keys.dedup();
        assert_eq!(keys.len(), 50);
    }
}

#[test]
fn test_shared_watch_receives_notices() {
    let shared = SharedReconciler::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<StateChange>();
    shared.watch("c1", Watcher::new(tx));

    shared.remote_observed(message("m1", "c1", "bob", 100));
    assert_eq!(
        rx.try_recv().unwrap(),
        StateChange::MessageInserted {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
        }
    );
}
