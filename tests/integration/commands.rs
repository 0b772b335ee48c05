//! End-to-end command flows against the mock oracle.

use serde_json::json;
use std::collections::BTreeMap;
use tokio_test::assert_ok;

use zigma::entitlement::{day_key, today};
use zigma::types::{TrackedMarket, UsageRecord};

use crate::mock_api::{access, analysis, signal, wallet_analysis, Harness, WALLET};

fn used_today(signals: u32, wallets: u32) -> BTreeMap<String, UsageRecord> {
    let mut usage = BTreeMap::new();
    usage.insert(
        day_key(today()),
        UsageRecord {
            signals_requested: signals,
            wallet_analyses: wallets,
        },
    );
    usage
}

// -- alpha tests --

#[tokio::test]
async fn test_free_user_over_quota_is_denied_without_fetching() {
    let h = Harness::new();
    let memory = h.stores.user("u1").unwrap();
    assert_ok!(memory.set_usage_map(&used_today(3, 0)).await);

    let reply = h.run("u1", "alpha", json!({})).await;

    assert!(reply.contains("Daily Limit Reached"));
    assert!(reply.contains("3 signals"));
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn test_alpha_clamps_limit_and_records_usage() {
    let h = Harness::new();
    h.api.respond(
        "/signals",
        json!([signal("fed-cut", "STRONG_TRADE", 12.0), signal("btc-100k", "SMALL_TRADE", 4.5)]),
    );

    let reply = h.run("u1", "alpha", json!({"limit": 10, "minEdge": 4})).await;

    assert!(reply.contains("Top 2 Zigma Signals"));
    assert!(reply.contains("Will fed-cut resolve YES?"));
    let calls = h.api.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("limit=3"));
    assert!(calls[0].contains("minEdge=0.04"));

    let memory = h.stores.user("u1").unwrap();
    let usage = memory.usage_map().await.unwrap();
    assert_eq!(usage[&day_key(today())].signals_requested, 1);
}

#[tokio::test]
async fn test_alpha_empty_result_reports_market_count_and_keeps_quota() {
    let h = Harness::new();
    h.api.respond("/signals", json!([]));

    let reply = h.run("u1", "alpha", json!(null)).await;

    assert!(reply.contains("No High-Edge Signals"));
    assert!(reply.contains("812 markets"));
    let memory = h.stores.user("u1").unwrap();
    assert!(memory.usage_map().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_tier_lookup() {
    let h = Harness::new();
    let memory = h.stores.user("u1").unwrap();
    memory.set_wallet(WALLET).await.unwrap();

    let reply = h.run("u1", "alpha", json!({"limit": 0})).await;

    assert_eq!(reply, "❌ Limit must be a number between 1 and 50");
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn test_network_failure_yields_generic_message() {
    let h = Harness::new();
    h.api.fail("/signals", "connection reset");

    let reply = h.run("u1", "alpha", json!({})).await;

    assert_eq!(reply, "❌ Failed to fetch signals. Please try again.");
}

#[tokio::test]
async fn test_unknown_command_reply() {
    let h = Harness::new();
    let reply = h.run("u1", "search", json!({"limit": 0})).await;

    assert_eq!(reply, "❌ Unknown command: search");
    assert!(h.api.calls().is_empty());
    let memory = h.stores.user("u1").unwrap();
    assert!(memory.usage_map().await.unwrap().is_empty());
}

// -- Entitlement tests --

#[tokio::test]
async fn test_tier_lookup_failure_falls_back_to_free() {
    let h = Harness::new();
    h.api.respond_status("/access/", 503);
    h.api.respond("/arbitrage", json!([]));
    let memory = h.stores.user("u1").unwrap();
    memory.set_wallet(WALLET).await.unwrap();

    let reply = h.run("u1", "arb", json!({})).await;

    assert!(reply.contains("Feature Not Available"));
    assert_eq!(h.api.calls_matching("/arbitrage"), 0);
}

#[tokio::test]
async fn test_pro_user_can_scan_arbitrage() {
    let h = Harness::new();
    h.api.respond("/access/", access("PRO", 1500.0));
    h.api.respond("/arbitrage", json!([]));
    let memory = h.stores.user("u1").unwrap();
    memory.set_wallet(WALLET).await.unwrap();

    let reply = h.run("u1", "arb", json!({})).await;

    assert!(!reply.contains("Feature Not Available"));
    assert_eq!(h.api.calls_matching("/arbitrage"), 1);
}

#[tokio::test]
async fn test_whale_eleventh_track_hits_absolute_cap() {
    let h = Harness::new();
    h.api.respond("/access/", access("WHALE", 25_000.0));
    let memory = h.stores.user("whale").unwrap();
    memory.set_wallet(WALLET).await.unwrap();
    let tracked: Vec<TrackedMarket> = (1..=10)
        .map(|i| TrackedMarket::new(format!("m{i}"), 5.0))
        .collect();
    memory.set_tracked(&tracked).await.unwrap();

    let reply = h.run("whale", "track", json!({"market": "m11"})).await;
    assert!(reply.contains("Maximum 10 tracked markets"));
    assert_eq!(memory.tracked().await.unwrap().len(), 10);

    // Updating an existing entry needs no free slot
    let reply = h.run("whale", "track", json!({"market": "m3", "threshold": 8})).await;
    assert!(reply.contains("Tracking Updated"));
    let tracked = memory.tracked().await.unwrap();
    assert_eq!(tracked.len(), 10);
    assert_eq!(tracked[2].threshold, 8.0);
}

#[tokio::test]
async fn test_free_user_tracking_cap() {
    let h = Harness::new();

    let reply = h
        .run("u1", "track", json!({"market": "https://polymarket.com/event/fed-cut"}))
        .await;
    assert!(reply.contains("Now Tracking"));
    assert!(reply.contains("fed-cut"));

    let reply = h.run("u1", "track", json!({"market": "btc-100k"})).await;
    assert!(reply.contains("Tracking Limit Reached"));
}

#[tokio::test]
async fn test_wallet_quota_counts_analyses() {
    let h = Harness::new();
    h.api.respond("/wallet/", wallet_analysis(WALLET));

    let reply = h.run("u1", "wallet", json!({"address": WALLET})).await;
    assert!(reply.contains("Wallet Analysis"));
    assert!(reply.contains("B+"));

    let reply = h.run("u1", "wallet", json!({"address": WALLET})).await;
    assert!(reply.contains("1 wallet analyses"));
    assert_eq!(h.api.calls_matching("/wallet/"), 1);
}

// -- Market tests --

#[tokio::test]
async fn test_connect_persists_wallet_and_shows_features() {
    let h = Harness::new();
    h.api.respond("/access/", access("PRO", 1500.0));

    let reply = h.run("u1", "connect", json!({"address": WALLET})).await;

    assert!(reply.contains("Wallet Connected"));
    assert!(reply.contains("Unlimited signals"));
    assert!(reply.contains("Arbitrage scanner"));
    let memory = h.stores.user("u1").unwrap();
    assert_eq!(memory.wallet().await.unwrap().as_deref(), Some(WALLET));
}

#[tokio::test]
async fn test_connect_rejects_bad_address() {
    let h = Harness::new();
    let reply = h.run("u1", "connect", json!({"address": "0x123"})).await;
    assert!(reply.starts_with("❌ Invalid wallet address"));
    let memory = h.stores.user("u1").unwrap();
    assert!(memory.wallet().await.unwrap().is_none());
}

#[tokio::test]
async fn test_untrack_by_position_and_url() {
    let h = Harness::new();
    let memory = h.stores.user("u1").unwrap();
    memory
        .set_tracked(&[
            TrackedMarket::new("fed-cut", 5.0),
            TrackedMarket::new("btc-100k", 5.0),
            TrackedMarket::new("eth-etf", 5.0),
        ])
        .await
        .unwrap();

    let reply = h.run("u1", "untrack", json!({"market": "2"})).await;
    assert!(reply.contains("btc-100k"));
    assert!(reply.contains("2 markets still tracked"));

    let reply = h
        .run("u1", "untrack", json!({"market": "https://polymarket.com/event/eth-etf"}))
        .await;
    assert!(reply.contains("Stopped Tracking"));

    let reply = h.run("u1", "untrack", json!({"market": "eth-etf"})).await;
    assert!(reply.contains("is not tracked"));

    let ids: Vec<String> = memory
        .tracked()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.market_id)
        .collect();
    assert_eq!(ids, vec!["fed-cut"]);
}

#[tokio::test]
async fn test_portfolio_marks_unavailable_rows() {
    let h = Harness::new();
    h.api.respond("/market/fed-cut/analysis", analysis("fed-cut", 0.08));
    h.api.respond_status("/market/gone/analysis", 404);
    let memory = h.stores.user("u1").unwrap();
    memory
        .set_tracked(&[TrackedMarket::new("fed-cut", 5.0), TrackedMarket::new("gone", 5.0)])
        .await
        .unwrap();

    let reply = h.run("u1", "portfolio", json!({})).await;

    assert!(reply.contains("Will fed-cut resolve YES?"));
    assert!(reply.contains("+8.0%"));
    assert!(reply.contains("2. ❓ gone (data unavailable)"));
}

#[tokio::test]
async fn test_analyze_failure_quotes_market() {
    let h = Harness::new();
    h.api.respond_status("/analysis", 500);

    let reply = h.run("u1", "analyze", json!({"market": "no-such-market"})).await;

    assert!(reply.contains("\"no-such-market\""));
}

// -- Community tests --

#[tokio::test]
async fn test_share_posts_through_poster() {
    let h = Harness::with_poster();
    h.api.respond("/signals", json!([signal("fed-cut", "STRONG_TRADE", 12.0)]));

    let reply = h.run("u1", "share", json!({"signalIndex": 1})).await;

    assert_eq!(reply, "✅ Signal shared to m/showandtell!");
    let posts = h.poster.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "m/showandtell");
    assert!(posts[0].1.contains("Zigma Signal Alert"));
}

#[tokio::test]
async fn test_share_without_poster_returns_copyable_text() {
    let h = Harness::new();
    h.api.respond("/signals", json!([signal("fed-cut", "STRONG_TRADE", 12.0)]));

    let reply = h.run("u1", "share", json!({})).await;
    assert!(reply.starts_with("✅ **Ready to Share**"));

    let reply = h.run("u1", "share", json!({"signalIndex": 4})).await;
    assert!(reply.contains("Signal #4 not found"));
    assert!(h.poster.posts().is_empty());
}

#[tokio::test]
async fn test_challenge_posts_through_poster() {
    let h = Harness::with_poster();
    h.api.respond("/analysis", analysis("fed-cut", 0.08));

    let reply = h
        .run("u1", "challenge", json!({"agent": "rival-bot", "market": "fed-cut"}))
        .await;

    assert!(reply.contains("Challenge posted to m/showandtell"));
    assert!(reply.contains("rival-bot"));
    assert_eq!(h.poster.posts().len(), 1);
}
