//! Mock collaborators for integration testing.
//!
//! Provides a deterministic `Transport` that answers oracle URLs from a
//! route table, plus in-memory community, notifier and poster doubles. All
//! state is inspectable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use zigma::api::{RawResponse, Transport, TransportError, ZigmaClient};
use zigma::commands::{Notifier, Poster, Skill};
use zigma::community::{Comment, Community, NewPost, PostSummary};
use zigma::config::AppConfig;
use zigma::store::StoreRegistry;

// ---------------------------------------------------------------------------
// Oracle API
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail(String),
}

/// A mock oracle API keyed by URL fragment.
///
/// The first route whose fragment occurs in the requested URL answers.
/// Unmatched URLs get a 404.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<Vec<(String, Route)>>,
    calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_route(&self, fragment: &str, route: Route) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(f, _)| f == fragment) {
            Some(existing) => existing.1 = route,
            None => routes.push((fragment.to_string(), route)),
        }
    }

    /// Answer URLs containing `fragment` with `200` and `body`.
    pub fn respond(&self, fragment: &str, body: Value) {
        self.set_route(
            fragment,
            Route::Respond {
                status: 200,
                body: body.to_string(),
            },
        );
    }

    pub fn respond_status(&self, fragment: &str, status: u16) {
        self.set_route(
            fragment,
            Route::Respond {
                status,
                body: json!({ "error": "mock" }).to_string(),
            },
        );
    }

    /// Fail URLs containing `fragment` at the transport level.
    pub fn fail(&self, fragment: &str, msg: &str) {
        self.set_route(fragment, Route::Fail(msg.to_string()));
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for MockApi {
    async fn get(&self, url: &str, _bearer: Option<&str>) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        let route = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, route)| route.clone());

        match route {
            Some(Route::Respond { status, body }) => Ok(RawResponse { status, body }),
            Some(Route::Fail(msg)) => Err(TransportError(msg)),
            None => Ok(RawResponse {
                status: 404,
                body: json!({ "error": "not found" }).to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const WALLET: &str = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01";

pub fn signal(market_id: &str, tier: &str, edge: f64) -> Value {
    json!({
        "marketId": market_id,
        "question": format!("Will {market_id} resolve YES?"),
        "action": "BUY YES",
        "marketOdds": 40.0,
        "zigmaOdds": 40.0 + edge,
        "edge": edge,
        "confidence": 72.0,
        "tier": tier,
        "kelly": 0.05,
        "liquidity": 65000.0,
        "link": format!("https://polymarket.com/event/{market_id}")
    })
}

/// `edge` is a fraction, as the analysis endpoint reports it.
pub fn analysis(market_id: &str, edge: f64) -> Value {
    json!({
        "id": market_id,
        "question": format!("Will {market_id} resolve YES?"),
        "probability": 0.55,
        "confidence": 68.0,
        "edge": edge,
        "recommendation": "BUY YES",
        "reasoning": "Polling drift not yet priced in."
    })
}

pub fn wallet_analysis(address: &str) -> Value {
    json!({
        "address": address,
        "totalPnl": 1250.5,
        "winRate": 0.61,
        "profitFactor": 1.8,
        "sharpeRatio": 1.2,
        "grade": "B+",
        "healthScore": 74.0,
        "avgHoldTime": 36.0,
        "tradeFrequency": 2.5,
        "avgPositionSize": 120.0
    })
}

pub fn access(tier: &str, balance: f64) -> Value {
    json!({ "tier": tier, "balance": balance })
}

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

/// Records every notification. Can be told to refuse delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, msg)| msg)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("user unreachable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPoster {
    posts: Mutex<Vec<(String, String)>>,
}

impl RecordingPoster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Poster for RecordingPoster {
    async fn post(&self, community: &str, content: &str) -> Result<()> {
        self.posts
            .lock()
            .unwrap()
            .push((community.to_string(), content.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

/// In-memory community: a fixed set of the bot's posts and their comments.
pub struct MockCommunity {
    enabled: bool,
    my_posts: Vec<PostSummary>,
    comments: HashMap<String, Vec<Comment>>,
    created: Mutex<Vec<NewPost>>,
    replies: Mutex<Vec<(String, String, String)>>,
}

impl MockCommunity {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            my_posts: Vec::new(),
            comments: HashMap::new(),
            created: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    /// Add one of the bot's posts with its comments.
    pub fn with_post(mut self, post_id: &str, comments: Vec<Comment>) -> Self {
        self.my_posts.push(PostSummary {
            id: post_id.to_string(),
            title: format!("Post {post_id}"),
            created_at: None,
        });
        self.comments.insert(post_id.to_string(), comments);
        self
    }

    pub fn created(&self) -> Vec<NewPost> {
        self.created.lock().unwrap().clone()
    }

    /// `(post_id, parent_id, content)` per reply.
    pub fn replies(&self) -> Vec<(String, String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

pub fn comment(id: &str, author: &str, content: &str, parent_id: Option<&str>) -> Comment {
    Comment {
        id: id.to_string(),
        author: author.to_string(),
        content: content.to_string(),
        parent_id: parent_id.map(str::to_string),
        created_at: None,
    }
}

#[async_trait]
impl Community for MockCommunity {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn create_post(&self, post: &NewPost) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        let mut created = self.created.lock().unwrap();
        created.push(post.clone());
        Ok(Some(format!("post-{}", created.len())))
    }

    async fn feed(&self, _submolt: Option<&str>, limit: u32) -> Result<Vec<PostSummary>> {
        Ok(self.my_posts.iter().take(limit as usize).cloned().collect())
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        Ok(self.comments.get(post_id).cloned().unwrap_or_default())
    }

    async fn reply(&self, post_id: &str, parent_id: &str, content: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        self.replies.lock().unwrap().push((
            post_id.to_string(),
            parent_id.to_string(),
            content.to_string(),
        ));
        Ok(true)
    }

    async fn my_posts(&self, limit: usize) -> Result<Vec<PostSummary>> {
        Ok(self.my_posts.iter().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Configuration with no API key requirement and no retries.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.test_mode = true;
    cfg.api.base_url = "https://oracle.test".to_string();
    cfg.api.max_retries = 0;
    cfg.api.retry_delay_ms = 1;
    cfg.storage.dir = None;
    cfg
}

/// A skill wired to a fresh mock API and in-memory stores.
pub struct Harness {
    pub api: Arc<MockApi>,
    pub stores: Arc<StoreRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub poster: Arc<RecordingPoster>,
    pub skill: Skill,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Same as `new`, with a community poster attached to the skill.
    pub fn with_poster() -> Self {
        Self::build(true)
    }

    fn build(poster: bool) -> Self {
        let cfg = Arc::new(test_config());
        let api = MockApi::new();
        api.respond("/stats", json!({ "marketCount": 812 }));

        let client = Arc::new(ZigmaClient::new(&cfg, api.clone()));
        let stores = Arc::new(StoreRegistry::in_memory());
        let notifier = RecordingNotifier::new();
        let recording_poster = RecordingPoster::new();

        let mut skill = Skill::new(cfg, client, stores.clone()).with_notifier(notifier.clone());
        if poster {
            skill = skill.with_poster(recording_poster.clone());
        }

        Self {
            api,
            stores,
            notifier,
            poster: recording_poster,
            skill,
        }
    }

    /// Run a command by name for `user_id` and return the reply.
    pub async fn run(&self, user_id: &str, command: &str, params: Value) -> String {
        let ctx = self.skill.context(user_id).unwrap();
        self.skill.dispatch_named(command, &ctx, params).await
    }

    /// Drop cached oracle responses so the next fetch hits the mock.
    pub fn clear_cache(&self) {
        self.skill.client().fetcher().cache().clear();
    }
}
