//! Moltbook community integration.
//!
//! Used for the daily alpha post, replies to comments on the bot's posts,
//! and the `share`/`challenge` commands.
//!
//! Base URL: https://www.moltbook.com/api/v1 (override with `MOLTBOOK_BASE_URL`)
//! Auth: `Authorization: Bearer {MOLTBOOK_API_KEY}`. Without a key every
//! write is skipped and every read is empty.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::commands::Poster;
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub submolt: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default, deserialize_with = "author_name")]
    pub author: String,
    #[serde(default)]
    pub content: String,
    /// Set on replies; top-level comments have none.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Authors come back either as a bare name or as an agent object.
fn author_name<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Author {
        Name(String),
        Agent { name: String },
        Other(serde::de::IgnoredAny),
    }

    Ok(match Author::deserialize(de)? {
        Author::Name(name) | Author::Agent { name } => name,
        Author::Other(_) => "there".to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    post: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    posts: Vec<PostSummary>,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct AgentProfile {
    #[serde(default)]
    posts: Vec<PostSummary>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    agent: AgentProfile,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Community platform operations used by the heartbeat.
#[async_trait]
pub trait Community: Send + Sync {
    /// Whether writes can succeed at all (an API key is configured).
    fn is_enabled(&self) -> bool;

    /// Create a post. `Ok(None)` when posting is disabled.
    async fn create_post(&self, post: &NewPost) -> Result<Option<String>>;

    async fn feed(&self, submolt: Option<&str>, limit: u32) -> Result<Vec<PostSummary>>;

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>>;

    /// Reply under `parent_id`. `Ok(false)` when posting is disabled.
    async fn reply(&self, post_id: &str, parent_id: &str, content: &str) -> Result<bool>;

    /// The bot's own most recent posts.
    async fn my_posts(&self, limit: usize) -> Result<Vec<PostSummary>>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct MoltbookClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl MoltbookClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("ZIGMA/0.1.0 (prediction-market-skill)")
            .build()
            .context("Failed to build HTTP client for Moltbook")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let client = Self::new(&cfg.community.base_url, cfg.secrets.community_key.clone())?;
        if !client.is_enabled() {
            warn!("MOLTBOOK_API_KEY not set, community posting disabled");
        }
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn feed_url(&self, submolt: Option<&str>, limit: u32) -> String {
        match submolt {
            Some(s) => self.url(&format!("/posts?submolt={}&limit={limit}", urlencoding::encode(s))),
            None => self.url(&format!("/posts?limit={limit}")),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &SecretString, url: &str) -> Result<T> {
        debug!(url = %url, "Fetching Moltbook resource");

        let resp = self
            .http
            .get(url)
            .bearer_auth(key.expose_secret())
            .send()
            .await
            .context("Moltbook API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Moltbook API error {status}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Moltbook response from {url}"))
    }
}

#[async_trait]
impl Community for MoltbookClient {
    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn create_post(&self, post: &NewPost) -> Result<Option<String>> {
        let Some(key) = self.api_key.as_ref() else {
            warn!(title = %post.title, "MOLTBOOK_API_KEY not set, skipping post");
            return Ok(None);
        };

        let resp = self
            .http
            .post(self.url("/posts"))
            .bearer_auth(key.expose_secret())
            .json(post)
            .send()
            .await
            .context("Moltbook post request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Moltbook post failed {status}: {body}");
        }

        let created: CreatePostResponse = resp
            .json()
            .await
            .context("Failed to parse Moltbook post response")?;

        info!(
            post_id = %created.post.id,
            url = created.post.url.as_deref().unwrap_or(""),
            submolt = %post.submolt,
            "Posted to Moltbook"
        );
        Ok(Some(created.post.id))
    }

    async fn feed(&self, submolt: Option<&str>, limit: u32) -> Result<Vec<PostSummary>> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(Vec::new());
        };
        let feed: FeedResponse = self.get_json(key, &self.feed_url(submolt, limit)).await?;
        Ok(feed.posts)
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(Vec::new());
        };
        let url = self.url(&format!("/posts/{}/comments", urlencoding::encode(post_id)));
        let resp: CommentsResponse = self.get_json(key, &url).await?;
        Ok(resp.comments)
    }

    async fn reply(&self, post_id: &str, parent_id: &str, content: &str) -> Result<bool> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(false);
        };

        let url = self.url(&format!("/posts/{}/comments", urlencoding::encode(post_id)));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(key.expose_secret())
            .json(&serde_json::json!({ "content": content, "parent_id": parent_id }))
            .send()
            .await
            .context("Moltbook reply request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Moltbook reply failed {}", resp.status());
        }

        info!(post_id, comment_id = parent_id, "Replied to comment");
        Ok(true)
    }

    async fn my_posts(&self, limit: usize) -> Result<Vec<PostSummary>> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(Vec::new());
        };
        let me: MeResponse = self.get_json(key, &self.url("/agents/me")).await?;
        Ok(me.agent.posts.into_iter().take(limit).collect())
    }
}

/// Title for a community post: the first non-empty line, stripped of
/// markdown emphasis.
fn title_from(content: &str) -> String {
    content
        .lines()
        .map(|l| l.trim().replace("**", ""))
        .find(|l| !l.is_empty())
        .unwrap_or_else(|| "Zigma".to_string())
}

/// Commands post as `m/<submolt>`.
fn submolt_from(community: &str) -> &str {
    community.strip_prefix("m/").unwrap_or(community)
}

#[async_trait]
impl Poster for MoltbookClient {
    async fn post(&self, community: &str, content: &str) -> Result<()> {
        let post = NewPost {
            submolt: submolt_from(community).to_string(),
            title: title_from(content),
            content: content.to_string(),
        };
        match self.create_post(&post).await? {
            Some(_) => Ok(()),
            None => anyhow::bail!("community posting is disabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
