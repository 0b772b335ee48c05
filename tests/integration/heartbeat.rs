//! Heartbeat sweeps: tracked-market alerts, strong-signal fan-out, and the
//! process-wide community duties.

use serde_json::json;
use std::sync::Arc;

use zigma::community::Community;
use zigma::entitlement::{day_key, today};
use zigma::heartbeat::Heartbeat;
use zigma::store::UserMemory;
use zigma::types::TrackedMarket;

use crate::mock_api::{analysis, comment, signal, test_config, Harness, MockCommunity};

fn heartbeat(h: &Harness, community: Option<Arc<MockCommunity>>) -> Heartbeat {
    Heartbeat::for_skill(&h.skill, community.map(|c| c as Arc<dyn Community>))
}

/// A user with persisted state, as left behind by any successful command.
async fn known_user(h: &Harness, user_id: &str) -> UserMemory {
    let memory = h.stores.user(user_id).unwrap();
    memory.set_tracked(&[]).await.unwrap();
    memory
}

// -- Tracked market tests --

#[tokio::test]
async fn test_edge_alerts_follow_threshold_and_persist_last_edge() {
    let h = Harness::new();
    h.api.respond("/signals", json!([]));
    h.api.respond("/market/m1/analysis", analysis("m1", 0.12));
    let memory = h.stores.user("u1").unwrap();
    memory.set_tracked(&[TrackedMarket::new("m1", 5.0)]).await.unwrap();
    let hb = heartbeat(&h, None);

    // First check: 0 → 12
    let report = hb.sweep().await;
    assert_eq!(report.users, 1);
    assert_eq!(report.markets_checked, 1);
    assert_eq!(report.edge_alerts, 1);
    let sent = h.notifier.sent_to("u1");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Edge changed: 0.0% → 12.0%"));
    let last = memory.tracked().await.unwrap()[0].last_edge.unwrap();
    assert!((last - 12.0).abs() < 1e-9);

    // 12 → 14 stays under the threshold
    h.clear_cache();
    h.api.respond("/market/m1/analysis", analysis("m1", 0.14));
    let report = hb.sweep().await;
    assert_eq!(report.edge_alerts, 0);
    let last = memory.tracked().await.unwrap()[0].last_edge.unwrap();
    assert!((last - 14.0).abs() < 1e-9);

    // 14 → 3 crosses it again
    h.clear_cache();
    h.api.respond("/market/m1/analysis", analysis("m1", -0.03));
    let report = hb.sweep().await;
    assert_eq!(report.edge_alerts, 1);
    let sent = h.notifier.sent_to("u1");
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("14.0% → 3.0%"));
}

#[tokio::test]
async fn test_failed_market_check_does_not_stop_sweep() {
    let h = Harness::new();
    h.api.respond("/signals", json!([]));
    h.api.respond_status("/market/gone/analysis", 404);
    h.api.respond("/market/m1/analysis", analysis("m1", 0.02));
    let memory = h.stores.user("u1").unwrap();
    memory
        .set_tracked(&[TrackedMarket::new("gone", 5.0), TrackedMarket::new("m1", 5.0)])
        .await
        .unwrap();

    let report = heartbeat(&h, None).sweep().await;

    assert_eq!(report.markets_failed, 1);
    assert_eq!(report.markets_checked, 1);
    assert_eq!(report.errors, 0);
    let tracked = memory.tracked().await.unwrap();
    assert_eq!(tracked.len(), 2);
    assert!(tracked[0].last_edge.is_none());
    assert!(tracked[1].last_edge.is_some());
}

// -- Strong signal tests --

#[tokio::test]
async fn test_strong_signal_announced_once_per_user() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("s1", "STRONG_TRADE", 15.0)]));
    known_user(&h, "u1").await;
    known_user(&h, "u2").await;
    let hb = heartbeat(&h, None);

    let report = hb.sweep().await;
    assert_eq!(report.users, 2);
    assert_eq!(report.strong_signal_alerts, 2);
    assert!(h.notifier.sent_to("u1")[0].contains("Strong Trade Signal"));

    h.clear_cache();
    let report = hb.sweep().await;
    assert_eq!(report.strong_signal_alerts, 0);

    h.clear_cache();
    h.api.respond("/signals", json!([signal("s2", "STRONG_TRADE", 18.0)]));
    let report = hb.sweep().await;
    assert_eq!(report.strong_signal_alerts, 2);
    assert_eq!(h.notifier.sent_to("u2").len(), 2);

    let memory = h.stores.user("u2").unwrap();
    assert_eq!(memory.last_strong_signal().await.unwrap().as_deref(), Some("s2"));
}

#[tokio::test]
async fn test_weaker_top_signal_is_not_announced() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("s1", "SMALL_TRADE", 11.0)]));
    known_user(&h, "u1").await;

    let report = heartbeat(&h, None).sweep().await;

    assert_eq!(report.strong_signal_alerts, 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_undelivered_strong_signal_is_retried() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("s1", "STRONG_TRADE", 15.0)]));
    let memory = known_user(&h, "u1").await;
    let hb = heartbeat(&h, None);

    h.notifier.set_failing(true);
    let report = hb.sweep().await;
    assert_eq!(report.strong_signal_alerts, 0);
    assert!(memory.last_strong_signal().await.unwrap().is_none());

    h.notifier.set_failing(false);
    h.clear_cache();
    let report = hb.sweep().await;
    assert_eq!(report.strong_signal_alerts, 1);
    assert_eq!(memory.last_strong_signal().await.unwrap().as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_without_notifier_strong_signals_are_not_fetched() {
    let h = Harness::new();
    h.api.respond("/market/m1/analysis", analysis("m1", 0.09));
    let memory = h.stores.user("u1").unwrap();
    memory.set_tracked(&[TrackedMarket::new("m1", 5.0)]).await.unwrap();

    let hb = Heartbeat::new(
        Arc::new(test_config()),
        h.skill.client().clone(),
        h.stores.clone(),
        None,
        None,
    );
    let report = hb.sweep().await;

    assert_eq!(h.api.calls_matching("/signals"), 0);
    assert_eq!(report.edge_alerts, 0);
    assert_eq!(report.markets_checked, 1);
    assert!(memory.tracked().await.unwrap()[0].last_edge.is_some());
}

#[tokio::test]
async fn test_users_without_state_are_not_swept() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("s1", "STRONG_TRADE", 15.0)]));
    known_user(&h, "regular").await;

    // Failed commands leave nothing behind
    for i in 0..25 {
        let reply = h
            .run(&format!("drive-by-{i}"), "connect", json!({"address": "0x123"}))
            .await;
        assert!(reply.starts_with("❌ Invalid wallet address"));
    }

    let report = heartbeat(&h, None).sweep().await;

    assert_eq!(report.users, 1);
    assert_eq!(report.strong_signal_alerts, 1);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.stores.prune_idle_locks(), 0);
}

// -- Community tests --

#[tokio::test]
async fn test_daily_post_published_once_per_day() {
    let h = Harness::new();
    h.api.respond(
        "/signals",
        json!([
            signal("a", "STRONG_TRADE", 14.0),
            signal("b", "SMALL_TRADE", 6.0),
            signal("c", "PROBE", 3.5)
        ]),
    );
    let community = Arc::new(MockCommunity::new(true));
    let hb = heartbeat(&h, Some(community.clone()));

    let report = hb.sweep().await;
    assert!(report.daily_post);
    let created = community.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].submolt, "general");
    assert!(created[0].title.starts_with("Zigma Daily Alpha - "));
    assert!(created[0].content.contains("Top 3 Signals"));

    let process = h.stores.process().unwrap();
    assert_eq!(
        process.last_daily_post().await.unwrap(),
        Some(day_key(today()))
    );

    let report = hb.sweep().await;
    assert!(!report.daily_post);
    assert_eq!(community.created().len(), 1);
}

#[tokio::test]
async fn test_comment_replies_sent_once() {
    let h = Harness::new();
    h.api.respond("/signals", json!([]));
    let community = Arc::new(
        MockCommunity::new(true)
            .with_post(
                "p1",
                vec![
                    comment("c1", "alice", "Hello Zigma, welcome!", None),
                    comment("c2", "zigma", "Thanks!", Some("c1")),
                ],
            )
            .with_post("p2", vec![comment("c3", "bob", "What are you building?", None)]),
    );
    let hb = heartbeat(&h, Some(community.clone()));

    let report = hb.sweep().await;
    assert_eq!(report.comment_replies, 2);
    assert!(!report.daily_post);

    let replies = community.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!((replies[0].0.as_str(), replies[0].1.as_str()), ("p1", "c1"));
    assert!(replies[0].2.contains("Good to meet you, alice"));
    assert_eq!((replies[1].0.as_str(), replies[1].1.as_str()), ("p2", "c3"));
    assert!(replies[1].2.contains("812 prediction markets"));
    assert_eq!(h.api.calls_matching("/stats"), 1);

    let report = hb.sweep().await;
    assert_eq!(report.comment_replies, 0);
    assert_eq!(community.replies().len(), 2);

    let process = h.stores.process().unwrap();
    assert_eq!(process.replied_comments().await.unwrap(), vec!["c1", "c3"]);
}

#[tokio::test]
async fn test_disabled_community_is_skipped() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("a", "SMALL_TRADE", 6.0)]));
    let community = Arc::new(
        MockCommunity::new(false).with_post("p1", vec![comment("c1", "alice", "hello", None)]),
    );

    let report = heartbeat(&h, Some(community.clone())).sweep().await;

    assert!(!report.daily_post);
    assert_eq!(report.comment_replies, 0);
    assert_eq!(report.errors, 0);
    assert!(community.created().is_empty());
    assert!(community.replies().is_empty());
}
