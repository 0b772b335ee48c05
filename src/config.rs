//! Configuration loading from TOML with environment variable overrides.
//!
//! `config.toml` is optional: every section has defaults matching the
//! reference deployment. Endpoints may be overridden from the environment;
//! secrets (API keys) are read from the environment only and never from the
//! file. The resulting `AppConfig` is immutable and shared by `Arc`.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::types::{Limit, TierLimits, UserTier, ZigmaError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub community: CommunityConfig,
    pub limits: GlobalLimits,
    pub tiers: TierTable,
    pub token_requirements: TokenRequirements,
    pub heartbeat: HeartbeatConfig,
    pub host: HostConfig,
    pub storage: StorageConfig,
    #[serde(skip)]
    pub secrets: Secrets,
    /// Set from `ZIGMA_ENV=test`; relaxes the mandatory API key.
    #[serde(skip)]
    pub test_mode: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.zigma.pro".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            cache_ttl_secs: 600,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommunityConfig {
    pub base_url: String,
    /// Submolt used for the daily alpha post.
    pub submolt: String,
    /// Community targeted by `share` and `challenge`.
    pub share_community: String,
    pub daily_post_signals: u32,
    /// How many of the bot's own posts are scanned for new comments.
    pub recent_posts: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.moltbook.com/api/v1".to_string(),
            submolt: "general".to_string(),
            share_community: "m/showandtell".to_string(),
            daily_post_signals: 3,
            recent_posts: 5,
        }
    }
}

/// Limits that apply regardless of tier.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalLimits {
    /// Absolute cap on tracked markets, applied even to unlimited tiers.
    pub max_tracked_markets: u32,
    pub default_signal_limit: u32,
    /// Percent.
    pub default_min_edge: f64,
    /// Percent.
    pub default_track_threshold: f64,
    /// Fraction passed straight to the signals endpoint.
    pub strong_signal_min_edge: f64,
    /// Shown when the stats endpoint is unavailable.
    pub default_market_count: u64,
    /// Days of per-day usage kept in user memory.
    pub usage_retention_days: u32,
    pub arbitrage_display: usize,
}

impl Default for GlobalLimits {
    fn default() -> Self {
        Self {
            max_tracked_markets: 10,
            default_signal_limit: 5,
            default_min_edge: 3.0,
            default_track_threshold: 5.0,
            strong_signal_min_edge: 0.10,
            default_market_count: 500,
            usage_retention_days: 7,
            arbitrage_display: 5,
        }
    }
}

/// Per-tier entitlements.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TierTable {
    pub free: TierLimits,
    pub basic: TierLimits,
    pub pro: TierLimits,
    pub whale: TierLimits,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: TierLimits {
                signals_per_day: Limit::Max(3),
                tracked_markets: Limit::Max(1),
                wallet_analysis_per_day: Limit::Max(1),
                arbitrage: false,
                alerts: None,
                api_access: false,
            },
            basic: TierLimits {
                signals_per_day: Limit::Max(15),
                tracked_markets: Limit::Max(5),
                wallet_analysis_per_day: Limit::Max(5),
                arbitrage: false,
                alerts: Some("hourly".to_string()),
                api_access: false,
            },
            pro: TierLimits {
                signals_per_day: Limit::Unlimited,
                tracked_markets: Limit::Max(25),
                wallet_analysis_per_day: Limit::Unlimited,
                arbitrage: true,
                alerts: Some("15min".to_string()),
                api_access: false,
            },
            whale: TierLimits {
                signals_per_day: Limit::Unlimited,
                tracked_markets: Limit::Unlimited,
                wallet_analysis_per_day: Limit::Unlimited,
                arbitrage: true,
                alerts: Some("realtime".to_string()),
                api_access: true,
            },
        }
    }
}

impl TierTable {
    pub fn get(&self, tier: UserTier) -> &TierLimits {
        match tier {
            UserTier::Free => &self.free,
            UserTier::Basic => &self.basic,
            UserTier::Pro => &self.pro,
            UserTier::Whale => &self.whale,
        }
    }
}

/// $ZIGMA holdings needed for each paid tier (shown in upgrade prompts).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenRequirements {
    pub basic: u64,
    pub pro: u64,
    pub whale: u64,
}

impl Default for TokenRequirements {
    fn default() -> Self {
        Self {
            basic: 100,
            pro: 1_000,
            whale: 10_000,
        }
    }
}

impl TokenRequirements {
    pub fn for_tier(&self, tier: UserTier) -> u64 {
        match tier {
            UserTier::Free => 0,
            UserTier::Basic => self.basic,
            UserTier::Pro => self.pro,
            UserTier::Whale => self.whale,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval_mins: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_mins: 15,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.max(1) * 60)
    }

    /// Cron-style schedule advertised to the host runtime.
    pub fn cron(&self) -> String {
        format!("*/{} * * * *", self.interval_mins.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    /// Undrained notifications kept per user; the oldest are dropped beyond this.
    pub max_pending_per_user: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 8787,
            max_pending_per_user: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for per-user JSON memory files. `None` keeps memory in-process.
    pub dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: Some("zigma_state".to_string()),
        }
    }
}

/// API keys, resolved from the environment only.
#[derive(Default)]
pub struct Secrets {
    pub api_key: Option<SecretString>,
    pub community_key: Option<SecretString>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = |s: &Option<SecretString>| if s.is_some() { "[set]" } else { "[unset]" };
        f.debug_struct("Secrets")
            .field("api_key", &state(&self.api_key))
            .field("community_key", &state(&self.community_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the reference
    /// configuration.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using reference configuration");
            Ok(Self::default())
        }
    }

    /// Full startup path: file (or defaults), then process environment.
    pub fn from_env(path: &str) -> Result<Self> {
        let mut cfg = Self::load_or_default(path)?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Apply environment overrides through `lookup` (injected for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("ZIGMA_API_URL") {
            self.api.base_url = url;
        }
        if let Some(url) = non_empty("MOLTBOOK_BASE_URL") {
            self.community.base_url = url;
        }
        self.secrets.api_key = non_empty("ZIGMA_API_KEY").map(SecretString::new);
        self.secrets.community_key = non_empty("MOLTBOOK_API_KEY").map(SecretString::new);
        self.test_mode = lookup("ZIGMA_ENV").is_some_and(|v| v.eq_ignore_ascii_case("test"));
    }

    /// Reject configurations the skill cannot run with. Called once at
    /// startup; any error here is fatal.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(ZigmaError::Config(msg.to_string()).into()) };

        if self.secrets.api_key.is_none() && !self.test_mode {
            return invalid("ZIGMA_API_KEY environment variable is required");
        }
        if self.api.base_url.trim().is_empty() {
            return invalid("api.base_url must not be empty");
        }
        if self.api.timeout_ms == 0 {
            return invalid("api.timeout_ms must be greater than zero");
        }
        if self.limits.max_tracked_markets == 0 {
            return invalid("limits.max_tracked_markets must be greater than zero");
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    pub fn api_key(&self) -> Option<&str> {
        self.secrets.api_key.as_ref().map(|s| s.expose_secret().as_str())
    }

    pub fn community_key(&self) -> Option<&str> {
        self.secrets.community_key.as_ref().map(|s| s.expose_secret().as_str())
    }

    pub fn tier_limits(&self, tier: UserTier) -> &TierLimits {
        self.tiers.get(tier)
    }
}
