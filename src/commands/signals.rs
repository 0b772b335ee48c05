//! Signal-feed commands: `alpha`, `arb`, `leaderboard`, `share`.

use chrono::Local;
use serde::Deserialize;
use tracing::info;

use super::{Skill, SkillContext};
use crate::api::SignalQuery;
use crate::format;
use crate::types::{UsageDelta, ZigmaError, ZigmaResult};
use crate::validate::{validate_limit, validate_min_edge};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphaParams {
    pub limit: Option<u32>,
    /// Percent.
    pub min_edge: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareParams {
    pub signal_index: Option<u32>,
}

impl Skill {
    /// Top signals, clamped to the tier's daily quota. A request only counts
    /// against the quota when it returned signals.
    pub async fn alpha(&self, ctx: &SkillContext, params: AlphaParams) -> ZigmaResult<String> {
        let limits = &self.cfg.limits;
        let requested = params.limit.unwrap_or(limits.default_signal_limit);
        let min_edge = params.min_edge.unwrap_or(limits.default_min_edge);
        validate_limit(requested)?;
        validate_min_edge(min_edge)?;

        let tier = self.tracker.resolve_tier(&ctx.memory).await;
        let usage = self.tracker.usage(&ctx.memory).await?;
        self.tracker.check_signal_quota(tier, &usage)?;

        let limit = self.tracker.effective_signal_limit(tier, requested);
        let query = SignalQuery::from_percent(limit, min_edge, params.category);
        let signals = self.client.signals(&query).await?;

        if signals.is_empty() {
            let market_count = self.client.market_count().await;
            return Ok(format::no_signals(market_count, min_edge));
        }

        let usage = self
            .tracker
            .record_usage(&ctx.memory, UsageDelta::signal_request())
            .await?;
        info!(
            user = %ctx.user_id,
            tier = %tier,
            returned = signals.len(),
            used_today = usage.signals_requested,
            "Served signals"
        );

        Ok(format::signal_list(&signals, &format::time_label(Local::now())))
    }

    pub async fn arb(&self, ctx: &SkillContext) -> ZigmaResult<String> {
        let tier = self.tracker.resolve_tier(&ctx.memory).await;
        self.tracker.check_arbitrage(tier)?;

        let opportunities = self.client.arbitrage().await?;
        if opportunities.is_empty() {
            return Ok(format::no_arbitrage());
        }
        Ok(format::arbitrage_list(
            &opportunities,
            self.cfg.limits.arbitrage_display,
        ))
    }

    pub async fn leaderboard(&self, _ctx: &SkillContext) -> ZigmaResult<String> {
        let entries = self.client.leaderboard().await?;
        if entries.is_empty() {
            return Ok(format::empty_leaderboard());
        }
        Ok(format::leaderboard(&entries, format::week_of_month(Local::now())))
    }

    /// Publish one of the current signals, or hand back copyable text when
    /// the host has no community poster.
    pub async fn share(&self, ctx: &SkillContext, params: ShareParams) -> ZigmaResult<String> {
        let index = params.signal_index.unwrap_or(1);
        if index == 0 {
            return Err(ZigmaError::invalid("Signal index must be 1 or greater"));
        }

        let limits = &self.cfg.limits;
        let query = SignalQuery::from_percent(
            limits.default_signal_limit,
            limits.default_min_edge,
            None,
        );
        let signals = self.client.signals(&query).await?;
        if signals.is_empty() {
            return Ok("❌ No signals available to share right now.".to_string());
        }

        let Some(signal) = signals.get(index as usize - 1) else {
            return Ok(format!(
                "❌ Signal #{index} not found. Try `zigma alpha` to see available signals."
            ));
        };

        let content = format::share_post(signal);
        let community = &self.cfg.community.share_community;
        match &ctx.poster {
            Some(poster) => {
                poster
                    .post(community, &content)
                    .await
                    .map_err(|e| ZigmaError::Community(e.to_string()))?;
                info!(user = %ctx.user_id, market_id = %signal.market_id, "Shared signal");
                Ok(format!("✅ Signal shared to {community}!"))
            }
            None => Ok(format::ready_to_post("Ready to Share", &content)),
        }
    }
}
