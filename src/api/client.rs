//! Typed endpoints of the ZIGMA oracle API.
//!
//! API base: `https://api.zigma.pro/api/v1` (override with `ZIGMA_API_URL`).
//! Auth: `Authorization: Bearer {ZIGMA_API_KEY}` when a key is configured.
//!
//! Everything except the access lookup goes through the response cache.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::fetch::ResilientFetcher;
use super::{ReqwestTransport, Transport};
use crate::config::AppConfig;
use crate::entitlement::TierLookup;
use crate::types::{
    AccessInfo, ArbitrageOpportunity, LeaderboardEntry, MarketAnalysis, Signal, Stats,
    WalletAnalysis, ZigmaResult,
};

const API_PREFIX: &str = "/api/v1";

/// Query for the signals endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalQuery {
    pub limit: u32,
    /// Minimum edge as a fraction (3% → 0.03).
    pub min_edge: f64,
    pub category: Option<String>,
}

impl SignalQuery {
    /// Build from a percent min-edge, the unit users type.
    pub fn from_percent(limit: u32, min_edge_pct: f64, category: Option<String>) -> Self {
        Self {
            limit,
            min_edge: min_edge_pct / 100.0,
            category,
        }
    }

    fn to_query_string(&self) -> String {
        let mut q = format!("limit={}&minEdge={}", self.limit, self.min_edge);
        if let Some(cat) = self.category.as_deref().filter(|c| !c.is_empty()) {
            q.push_str("&category=");
            q.push_str(&urlencoding::encode(cat));
        }
        q
    }
}

/// Oracle API client.
pub struct ZigmaClient {
    fetcher: ResilientFetcher,
    base_url: String,
    default_market_count: u64,
}

impl ZigmaClient {
    pub fn new(cfg: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            fetcher: ResilientFetcher::new(transport, &cfg.api, cfg.api_key()),
            base_url: cfg.api_base().to_string(),
            default_market_count: cfg.limits.default_market_count,
        }
    }

    /// Client over the production `reqwest` transport.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self::new(cfg, Arc::new(ReqwestTransport::new()?)))
    }

    pub fn fetcher(&self) -> &ResilientFetcher {
        &self.fetcher
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    pub fn signals_url(&self, query: &SignalQuery) -> String {
        self.url(&format!("/signals?{}", query.to_query_string()))
    }

    pub fn analysis_url(&self, market_id: &str) -> String {
        self.url(&format!("/market/{}/analysis", urlencoding::encode(market_id)))
    }

    pub fn wallet_url(&self, address: &str) -> String {
        self.url(&format!("/wallet/{address}"))
    }

    pub fn access_url(&self, address: &str) -> String {
        self.url(&format!("/access/{address}"))
    }

    // -- Endpoints -------------------------------------------------------

    pub async fn signals(&self, query: &SignalQuery) -> ZigmaResult<Vec<Signal>> {
        self.fetcher.fetch(&self.signals_url(query), true).await
    }

    pub async fn market_analysis(&self, market_id: &str) -> ZigmaResult<MarketAnalysis> {
        self.fetcher.fetch(&self.analysis_url(market_id), true).await
    }

    pub async fn wallet_analysis(&self, address: &str) -> ZigmaResult<WalletAnalysis> {
        self.fetcher.fetch(&self.wallet_url(address), true).await
    }

    pub async fn arbitrage(&self) -> ZigmaResult<Vec<ArbitrageOpportunity>> {
        self.fetcher.fetch(&self.url("/arbitrage"), true).await
    }

    pub async fn leaderboard(&self) -> ZigmaResult<Vec<LeaderboardEntry>> {
        self.fetcher.fetch(&self.url("/leaderboard"), true).await
    }

    /// Tier and balance for a wallet. Never cached: a user who just bought
    /// tokens should see the upgrade immediately.
    pub async fn access(&self, address: &str) -> ZigmaResult<AccessInfo> {
        self.fetcher.fetch(&self.access_url(address), false).await
    }

    pub async fn stats(&self) -> ZigmaResult<Stats> {
        self.fetcher.fetch(&self.url("/stats"), false).await
    }

    /// Number of markets the oracle is scanning, or the configured estimate
    /// when the stats endpoint is unavailable.
    pub async fn market_count(&self) -> u64 {
        match self.stats().await {
            Ok(stats) => stats.market_count,
            Err(e) => {
                warn!(error = %e, "Failed to fetch market count, using default");
                self.default_market_count
            }
        }
    }
}

#[async_trait]
impl TierLookup for ZigmaClient {
    async fn lookup_access(&self, wallet: &str) -> ZigmaResult<AccessInfo> {
        self.access(wallet).await
    }
}
