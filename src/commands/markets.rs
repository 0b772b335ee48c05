//! Market commands: `analyze`, `track`, `untrack`, `portfolio`, `challenge`.

use futures::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Skill, SkillContext};
use crate::format::{self, PortfolioRow};
use crate::types::{TrackedMarket, ZigmaError, ZigmaResult};
use crate::validate::{parse_market_id, validate_threshold};

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    pub market: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackParams {
    pub market: String,
    /// Percent.
    pub threshold: Option<f64>,
}

/// `market` may be an id, a Polymarket URL, or a 1-based portfolio position.
#[derive(Debug, Deserialize)]
pub struct UntrackParams {
    pub market: String,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeParams {
    pub agent: String,
    pub market: String,
}

impl Skill {
    pub async fn analyze(&self, _ctx: &SkillContext, params: AnalyzeParams) -> ZigmaResult<String> {
        let market_id = parse_market_id(&params.market)?;
        let analysis = self.client.market_analysis(&market_id).await?;
        Ok(format::analysis(&analysis))
    }

    /// Start tracking a market, or update the threshold of one already
    /// tracked. Updating never needs free capacity.
    pub async fn track(&self, ctx: &SkillContext, params: TrackParams) -> ZigmaResult<String> {
        let market_id = parse_market_id(&params.market)?;
        let threshold = params
            .threshold
            .unwrap_or(self.cfg.limits.default_track_threshold);
        validate_threshold(threshold)?;

        let mut tracked = ctx.memory.tracked().await?;

        if let Some(existing) = tracked.iter_mut().find(|t| t.market_id == market_id) {
            existing.threshold = threshold;
            ctx.memory.set_tracked(&tracked).await?;
            info!(user = %ctx.user_id, market_id = %market_id, threshold, "Updated tracking threshold");
            return Ok(format::tracking_updated(&market_id, threshold));
        }

        let tier = self.tracker.resolve_tier(&ctx.memory).await;
        self.tracker.check_tracking_capacity(tier, tracked.len())?;

        tracked.push(TrackedMarket::new(market_id.clone(), threshold));
        ctx.memory.set_tracked(&tracked).await?;

        info!(
            user = %ctx.user_id,
            market_id = %market_id,
            threshold,
            tracked = tracked.len(),
            "Tracking market"
        );
        Ok(format::tracking_started(&market_id, threshold))
    }

    pub async fn untrack(&self, ctx: &SkillContext, params: UntrackParams) -> ZigmaResult<String> {
        let mut tracked = ctx.memory.tracked().await?;
        let input = params.market.trim();

        let position = match input.parse::<usize>() {
            Ok(n) if (1..=tracked.len()).contains(&n) => Some(n - 1),
            _ => {
                let market_id = parse_market_id(input)?;
                tracked.iter().position(|t| t.market_id == market_id)
            }
        };

        let Some(position) = position else {
            return Err(ZigmaError::invalid(format::not_tracked(input)));
        };

        let removed = tracked.remove(position);
        ctx.memory.set_tracked(&tracked).await?;

        info!(user = %ctx.user_id, market_id = %removed.market_id, "Stopped tracking market");
        Ok(format::untracked(&removed.market_id, tracked.len()))
    }

    /// Tracked markets with their current edge. Analyses are fetched
    /// concurrently; a failed fetch only blanks that row.
    pub async fn portfolio(&self, ctx: &SkillContext) -> ZigmaResult<String> {
        let tracked = ctx.memory.tracked().await?;
        if tracked.is_empty() {
            return Ok(format::empty_portfolio());
        }

        let analyses = join_all(
            tracked
                .iter()
                .map(|t| self.client.market_analysis(&t.market_id)),
        )
        .await;

        let analyses: Vec<_> = tracked
            .iter()
            .zip(analyses)
            .map(|(t, result)| match result {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!(market_id = %t.market_id, error = %e, "Portfolio fetch failed");
                    None
                }
            })
            .collect();

        let rows: Vec<PortfolioRow<'_>> = tracked
            .iter()
            .zip(&analyses)
            .map(|(t, analysis)| PortfolioRow {
                market_id: &t.market_id,
                threshold: t.threshold,
                analysis: analysis.as_ref(),
            })
            .collect();

        Ok(format::portfolio(&rows))
    }

    pub async fn challenge(&self, ctx: &SkillContext, params: ChallengeParams) -> ZigmaResult<String> {
        let agent = params.agent.trim();
        if agent.is_empty() {
            return Err(ZigmaError::invalid("Please name the agent to challenge"));
        }
        let market_id = parse_market_id(&params.market)?;

        let analysis = self.client.market_analysis(&market_id).await?;
        let content = format::challenge(agent, &analysis);

        let community = &self.cfg.community.share_community;
        match &ctx.poster {
            Some(poster) => {
                poster
                    .post(community, &content)
                    .await
                    .map_err(|e| ZigmaError::Community(e.to_string()))?;
                info!(user = %ctx.user_id, agent, market_id = %market_id, "Posted challenge");
                Ok(format!(
                    "✅ Challenge posted to {community}! Let's see if {agent} accepts. 🔥"
                ))
            }
            None => Ok(format::ready_to_post("Challenge Ready", &content)),
        }
    }
}
