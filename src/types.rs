//! Shared types for the ZIGMA skill.
//!
//! Entitlement types (tiers, limits, usage), the per-user tracked-market
//! record, the oracle API payloads, and the error taxonomy. Payload structs
//! double as the response schema: decoding into them is the validation step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tiers & limits
// ---------------------------------------------------------------------------

/// Entitlement level derived from the user's connected wallet.
///
/// Variant order is the entitlement order: `Free < Basic < Pro < Whale`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserTier {
    #[default]
    Free,
    Basic,
    Pro,
    Whale,
}

impl UserTier {
    pub const ALL: &'static [UserTier] = &[
        UserTier::Free,
        UserTier::Basic,
        UserTier::Pro,
        UserTier::Whale,
    ];

    pub fn emoji(&self) -> &'static str {
        match self {
            UserTier::Free => "🆓",
            UserTier::Basic => "🥉",
            UserTier::Pro => "🥇",
            UserTier::Whale => "🏆",
        }
    }

    /// Display name used in upgrade prompts ("Basic", "Pro", ...).
    pub fn title(&self) -> &'static str {
        match self {
            UserTier::Free => "Free",
            UserTier::Basic => "Basic",
            UserTier::Pro => "Pro",
            UserTier::Whale => "Whale",
        }
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserTier::Free => write!(f, "FREE"),
            UserTier::Basic => write!(f, "BASIC"),
            UserTier::Pro => write!(f, "PRO"),
            UserTier::Whale => write!(f, "WHALE"),
        }
    }
}

impl std::str::FromStr for UserTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(UserTier::Free),
            "basic" => Ok(UserTier::Basic),
            "pro" => Ok(UserTier::Pro),
            "whale" => Ok(UserTier::Whale),
            _ => Err(anyhow::anyhow!("Unknown tier: {s}")),
        }
    }
}

/// A per-tier quota. On the wire and in config, `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Limit {
    Unlimited,
    Max(u32),
}

impl TryFrom<i64> for Limit {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Limit::Unlimited),
            n if n >= 0 && n <= u32::MAX as i64 => Ok(Limit::Max(n as u32)),
            n => Err(format!("invalid limit {n}: expected -1 (unlimited) or a count")),
        }
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Unlimited => -1,
            Limit::Max(n) => n as i64,
        }
    }
}

impl Limit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// The finite cap, if any.
    pub fn max(&self) -> Option<u32> {
        match self {
            Limit::Unlimited => None,
            Limit::Max(n) => Some(*n),
        }
    }

    /// Whether `used` has reached this quota.
    pub fn is_exhausted(&self, used: u32) -> bool {
        match self {
            Limit::Unlimited => false,
            Limit::Max(n) => used >= *n,
        }
    }

    /// Clamp a requested amount downward to this quota. Never raises it.
    pub fn clamp(&self, requested: u32) -> u32 {
        match self {
            Limit::Unlimited => requested,
            Limit::Max(n) => requested.min(*n),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Unlimited => write!(f, "unlimited"),
            Limit::Max(n) => write!(f, "{n}"),
        }
    }
}

/// Static entitlements of one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub signals_per_day: Limit,
    pub tracked_markets: Limit,
    pub wallet_analysis_per_day: Limit,
    #[serde(default)]
    pub arbitrage: bool,
    /// Alert cadence label ("hourly", "15min", "realtime").
    #[serde(default)]
    pub alerts: Option<String>,
    #[serde(default)]
    pub api_access: bool,
}

// ---------------------------------------------------------------------------
// Per-user state
// ---------------------------------------------------------------------------

/// Counters for one user on one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default)]
    pub signals_requested: u32,
    #[serde(default)]
    pub wallet_analyses: u32,
}

impl UsageRecord {
    /// Add a delta. Counters only grow.
    pub fn apply(&mut self, delta: UsageDelta) {
        self.signals_requested = self.signals_requested.saturating_add(delta.signals_requested);
        self.wallet_analyses = self.wallet_analyses.saturating_add(delta.wallet_analyses);
    }
}

/// Increment applied to today's [`UsageRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub signals_requested: u32,
    pub wallet_analyses: u32,
}

impl UsageDelta {
    pub fn signal_request() -> Self {
        Self {
            signals_requested: 1,
            ..Self::default()
        }
    }

    pub fn wallet_analysis() -> Self {
        Self {
            wallet_analyses: 1,
            ..Self::default()
        }
    }
}

/// A market the user asked to be alerted about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedMarket {
    pub market_id: String,
    /// Edge change (percentage points) that triggers an alert.
    pub threshold: f64,
    pub added_at: DateTime<Utc>,
    /// Absolute edge in percent at the last heartbeat check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edge: Option<f64>,
}

impl TrackedMarket {
    pub fn new(market_id: impl Into<String>, threshold: f64) -> Self {
        Self {
            market_id: market_id.into(),
            threshold,
            added_at: Utc::now(),
            last_edge: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle API payloads
// ---------------------------------------------------------------------------

/// Signal strength bucket assigned by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalTier {
    StrongTrade,
    SmallTrade,
    Probe,
    NoTrade,
}

impl SignalTier {
    pub fn emoji(&self) -> &'static str {
        match self {
            SignalTier::StrongTrade => "🔥",
            SignalTier::SmallTrade => "✅",
            SignalTier::Probe => "🔍",
            SignalTier::NoTrade => "⏹️",
        }
    }
}

/// Recommended action on a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "BUY YES")]
    BuyYes,
    #[serde(rename = "BUY NO")]
    BuyNo,
    #[serde(rename = "HOLD")]
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::BuyYes => write!(f, "BUY YES"),
            Action::BuyNo => write!(f, "BUY NO"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// A trading signal. Odds, edge and confidence are in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub market_id: String,
    pub question: String,
    pub action: Action,
    pub market_odds: f64,
    pub zigma_odds: f64,
    pub edge: f64,
    pub confidence: f64,
    pub tier: SignalTier,
    /// Kelly fraction (0.0–1.0).
    pub kelly: f64,
    /// Liquidity in USD.
    pub liquidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
}

/// Deep analysis of one market. `probability` and `edge` are fractions,
/// `confidence` is in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub id: String,
    pub question: String,
    pub probability: f64,
    pub confidence: f64,
    pub edge: f64,
    pub recommendation: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<Vec<NewsItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub name: String,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
}

/// Trader performance profile for a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAnalysis {
    pub address: String,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub grade: String,
    pub health_score: f64,
    /// Hours.
    pub avg_hold_time: f64,
    /// Trades per day.
    pub trade_frequency: f64,
    pub avg_position_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_categories: Option<Vec<CategoryStat>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbTrade {
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageOpportunity {
    #[serde(rename = "type")]
    pub kind: String,
    pub expected_profit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_a_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_b_title: Option<String>,
    pub trades: Vec<ArbTrade>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub agent: String,
    pub pnl: f64,
    pub win_rate: f64,
    pub trades: u32,
    pub sharpe: f64,
}

/// Response of the wallet access (tier) endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessInfo {
    #[serde(default)]
    pub tier: Option<UserTier>,
    #[serde(default)]
    pub balance: f64,
}

impl AccessInfo {
    pub fn tier(&self) -> UserTier {
        self.tier.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub market_count: u64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFailure {
    Timeout { after_ms: u64 },
    Transport(String),
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFailure::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            NetworkFailure::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

/// An entitlement check that refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    SignalQuota { limit: u32 },
    WalletQuota { limit: u32 },
    TierTrackingCap { limit: u32 },
    GlobalTrackingCap { limit: u32 },
    ArbitrageLocked { tier: UserTier },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::SignalQuota { limit } => write!(f, "daily signal limit of {limit} reached"),
            Denial::WalletQuota { limit } => {
                write!(f, "daily wallet analysis limit of {limit} reached")
            }
            Denial::TierTrackingCap { limit } => write!(f, "tier tracking cap of {limit} reached"),
            Denial::GlobalTrackingCap { limit } => {
                write!(f, "absolute tracking cap of {limit} reached")
            }
            Denial::ArbitrageLocked { tier } => write!(f, "arbitrage not available on {tier}"),
        }
    }
}

/// Domain-specific error types for the skill.
#[derive(Debug, thiserror::Error)]
pub enum ZigmaError {
    #[error("Network error ({url}): {failure}")]
    Network { url: String, failure: NetworkFailure },

    #[error("API error {status} ({url})")]
    Api { url: String, status: u16 },

    #[error("Response validation failed ({url}): {detail}")]
    Validation { url: String, detail: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quota exceeded: {0}")]
    Quota(Denial),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Community error: {0}")]
    Community(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ZigmaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ZigmaError::InvalidInput(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ZigmaError::Network {
                failure: NetworkFailure::Timeout { .. },
                ..
            }
        )
    }

    /// Failures of the remote fetch layer (network, status, shape).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            ZigmaError::Network { .. } | ZigmaError::Api { .. } | ZigmaError::Validation { .. }
        )
    }
}

pub type ZigmaResult<T> = std::result::Result<T, ZigmaError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
