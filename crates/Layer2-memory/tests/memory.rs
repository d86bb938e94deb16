//! Conversation memory behavior through the public API

use chrono::{Duration as ChronoDuration, Utc};
use retain_foundation::{JsonStore, MemoryConfig};
use retain_memory::{ConversationMemory, Role, SessionActivity, SessionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn memory(config: MemoryConfig) -> ConversationMemory {
    ConversationMemory::new(config).unwrap()
}

#[test]
fn test_what_is_python_scenario() {
    let memory = memory(MemoryConfig::default());
    memory.add_message("abc123", Role::User, "What is Python?");
    memory.add_message(
        "abc123",
        Role::Assistant,
        "Python is a high-level programming language known for readability.",
    );

    let context = memory.get_context("abc123");
    assert!(context.contains("Python"));
    assert!(context.contains("Recent Messages"));
    assert!(context.contains("User: What is Python?"));
    assert!(context.ends_with("=== End Context ===\n"));
}

#[test]
fn test_window_holds_exactly_r_after_two_r_plus_one() {
    let r = 3;
    let memory = memory(MemoryConfig::default().with_window(r));

    for i in 0..(2 * r + 1) {
        memory.add_message("s", Role::User, format!("Question number {} about lifetimes?", i));
    }

    let snapshot = memory.export_session("s").unwrap();
    assert_eq!(snapshot.recent.len(), r);
    assert!(snapshot
        .recent
        .iter()
        .all(|m| !m.content.contains("number 0 ")));
    assert_eq!(snapshot.recent[0].content, "Question number 4 about lifetimes?");
    assert_eq!(snapshot.metadata.total_messages, 2 * r + 1);
}

#[test]
fn test_default_window_compresses_past_threshold() {
    let memory = memory(MemoryConfig::default());

    for i in 0..10 {
        memory.add_message("s", Role::Assistant, format!("reply {}", i));
    }
    assert_eq!(memory.export_session("s").unwrap().recent.len(), 10);

    memory.add_message("s", Role::Assistant, "reply 10");
    assert_eq!(memory.export_session("s").unwrap().recent.len(), 5);
}

#[test]
fn test_only_messages_above_threshold_are_summarized() {
    let memory = memory(MemoryConfig::default().with_window(1));

    // 0.5 + 0.1 (user): exactly at the threshold, forgotten
    memory.add_message("s", Role::User, "x".repeat(100));
    // question + keyword: 0.75, kept as a summary
    memory.add_message("s", Role::User, "What is Python?");
    memory.add_message("s", Role::Assistant, "ok");

    let snapshot = memory.export_session("s").unwrap();
    assert_eq!(snapshot.summarized.len(), 1);
    assert_eq!(snapshot.summarized[0].summary, "What is Python?");
    assert_eq!(snapshot.summarized[0].role, Role::User);
}

#[test]
fn test_summary_history_shows_last_three() {
    let memory = memory(MemoryConfig::default().with_window(1));

    for i in 0..5 {
        memory.add_message("s", Role::User, format!("Why does step {} fail?", i));
    }

    let context = memory.get_context("s");
    assert!(context.contains("=== Summary History ==="));
    assert!(!context.contains("User: Why does step 0 fail?"));
    assert!(context.contains("User: Why does step 1 fail?\nUser: Why does step 2 fail?\nUser: Why does step 3 fail?"));
    assert!(context.contains("=== Recent Messages ===\nUser: Why does step 4 fail?"));
}

#[test]
fn test_budget_fallback_shrinks_context() {
    let memory = memory(MemoryConfig::default());
    let paragraph = "Ownership rules govern how memory is managed in Rust programs. ".repeat(3);
    for _ in 0..8 {
        memory.add_message("s", Role::User, paragraph.clone());
        memory.add_message("s", Role::Assistant, paragraph.clone());
    }

    let roomy = memory.get_context_with_budget("s", 100_000);
    let tight = memory.get_context_with_budget("s", 10);

    assert!(tight.len() < roomy.len());
    assert!(roomy.contains("Active session since: "));
    assert!(tight.contains("=== Conversation Context ===\nMessages: 16\nTopics: "));
    assert!(!tight.contains("Summary History"));
}

#[test]
fn test_clear_session() {
    let memory = memory(MemoryConfig::default());
    memory.add_message("s", Role::User, "Remember this please");

    assert!(memory.clear_session("s"));
    assert_eq!(memory.get_context("s"), "");
    assert!(!memory.clear_session("s"));

    // a cleared id starts over
    memory.add_message("s", Role::User, "Fresh start");
    assert_eq!(memory.export_session("s").unwrap().metadata.total_messages, 1);
}

#[test]
fn test_session_analytics() {
    let memory = memory(MemoryConfig::default());
    memory.add_message("s", Role::User, "Python decorators?");
    memory.add_message("s", Role::Assistant, "Decorators wrap python functions");
    memory.add_message("s", Role::User, "Show python closures");

    let analytics = memory.session_analytics("s").unwrap();
    assert_eq!(analytics.recent_message_count, 3);
    assert_eq!(analytics.summarized_message_count, 0);
    assert_eq!(analytics.user_questions, 1);
    assert_eq!(analytics.activity, SessionActivity::Moderate);

    let expected_avg = (18 + 32 + 20) as f64 / 3.0;
    assert!((analytics.avg_message_length - expected_avg).abs() < 1e-9);

    let top: Vec<(&str, usize)> = analytics
        .top_keywords
        .iter()
        .map(|(k, n)| (k.as_str(), *n))
        .collect();
    assert_eq!(
        top,
        vec![
            ("python", 3),
            ("decorators", 2),
            ("wrap", 1),
            ("functions", 1),
            ("show", 1),
        ]
    );
}

#[test]
fn test_list_sessions() {
    let memory = memory(MemoryConfig::default());
    memory.add_message("first", Role::User, "hello");
    memory.add_message("second", Role::User, "hello");
    memory.add_message("second", Role::Assistant, "hi there");

    let sessions = memory.list_sessions();
    assert_eq!(sessions.len(), 2);

    let second = sessions.iter().find(|s| s.session_id == "second").unwrap();
    assert_eq!(second.total_messages, 2);
    assert!(second.last_activity >= second.created_at);
}

#[test]
fn test_import_replaces_and_applies_bounds() {
    let source = memory(MemoryConfig::default());
    for i in 0..10 {
        source.add_message("s", Role::User, format!("How do I configure item {}?", i));
    }
    let snapshot = source.export_session("s").unwrap();
    assert_eq!(snapshot.recent.len(), 10);

    let target = memory(MemoryConfig::default().with_window(3));
    target.add_message("restored", Role::User, "state that will be replaced");
    target.import_session("restored", snapshot);

    let restored = target.export_session("restored").unwrap();
    assert_eq!(restored.recent.len(), 3);
    assert_eq!(restored.summarized.len(), 7);
    assert_eq!(restored.metadata.total_messages, 10);
    assert!(restored
        .recent
        .iter()
        .all(|m| m.content != "state that will be replaced"));
}

#[test]
fn test_snapshot_persists_through_store() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path());

    let before = memory(MemoryConfig::default());
    before.add_message("persisted", Role::User, "What is a trait object?");
    before
        .export_session("persisted")
        .unwrap()
        .save(&store, "persisted")
        .unwrap();

    let after = memory(MemoryConfig::default());
    let snapshot = SessionSnapshot::load(&store, "persisted").unwrap().unwrap();
    after.import_session("persisted", snapshot);

    assert!(after
        .get_context("persisted")
        .contains("User: What is a trait object?"));
}

#[test]
fn test_expire_idle() {
    let memory = memory(MemoryConfig::default());
    memory.add_message("fresh", Role::User, "still chatting");
    memory.add_message("stale", Role::User, "long gone");

    let mut snapshot = memory.export_session("stale").unwrap();
    snapshot.metadata.last_activity = Utc::now() - ChronoDuration::hours(3);
    memory.import_session("stale", snapshot);

    assert_eq!(memory.expire_idle(Duration::from_secs(2 * 3600)), 1);
    assert!(memory.contains("fresh"));
    assert!(!memory.contains("stale"));
    assert_eq!(memory.expire_idle(Duration::from_secs(2 * 3600)), 0);
}

#[test]
fn test_concurrent_sessions() {
    let memory = Arc::new(memory(MemoryConfig::default()));

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let memory = Arc::clone(&memory);
            scope.spawn(move || {
                for i in 0..25 {
                    memory.add_message(&format!("own-{}", worker), Role::User, format!("message {}", i));
                    memory.add_message("shared", Role::Assistant, format!("worker {} says {}", worker, i));
                }
            });
        }
    });

    assert_eq!(memory.session_count(), 5);
    let shared = memory.export_session("shared").unwrap();
    assert_eq!(shared.metadata.total_messages, 100);
    assert!(shared.recent.len() <= memory.config().compression_threshold);

    for worker in 0..4 {
        let own = memory.export_session(&format!("own-{}", worker)).unwrap();
        assert_eq!(own.metadata.total_messages, 25);
    }
}
