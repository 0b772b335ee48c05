//! Periodic heartbeat sweep.
//!
//! Once per interval: publish the daily alpha post (at most once per local
//! day), answer new comments on the bot's recent posts, then walk every
//! known user to re-check tracked markets and announce new strong signals.
//! Nothing escapes the sweep; failures are logged and counted in the
//! returned [`SweepReport`].

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::{SignalQuery, ZigmaClient};
use crate::commands::{Notifier, Skill};
use crate::community::{Community, NewPost};
use crate::config::AppConfig;
use crate::entitlement::{day_key, today};
use crate::format;
use crate::store::{StoreRegistry, PROCESS_SCOPE};
use crate::types::{Signal, SignalTier, ZigmaResult};

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub users: usize,
    pub markets_checked: usize,
    pub markets_failed: usize,
    pub edge_alerts: usize,
    pub strong_signal_alerts: usize,
    pub daily_post: bool,
    pub comment_replies: usize,
    pub errors: usize,
}

/// Absolute edge in percent from an analysis edge fraction, and its
/// distance from the last recorded edge (0 when never checked).
pub fn edge_move(edge_fraction: f64, last_edge: Option<f64>) -> (f64, f64) {
    let edge = (edge_fraction * 100.0).abs();
    let change = (edge - last_edge.unwrap_or(0.0)).abs();
    (edge, change)
}

pub struct Heartbeat {
    cfg: Arc<AppConfig>,
    client: Arc<ZigmaClient>,
    stores: Arc<StoreRegistry>,
    notifier: Option<Arc<dyn Notifier>>,
    community: Option<Arc<dyn Community>>,
}

impl Heartbeat {
    pub fn new(
        cfg: Arc<AppConfig>,
        client: Arc<ZigmaClient>,
        stores: Arc<StoreRegistry>,
        notifier: Option<Arc<dyn Notifier>>,
        community: Option<Arc<dyn Community>>,
    ) -> Self {
        Self {
            cfg,
            client,
            stores,
            notifier,
            community,
        }
    }

    /// Heartbeat sharing the skill's configuration, client, memory and
    /// notifier.
    pub fn for_skill(skill: &Skill, community: Option<Arc<dyn Community>>) -> Self {
        Self::new(
            skill.cfg.clone(),
            skill.client().clone(),
            skill.stores().clone(),
            skill.notifier().cloned(),
            community,
        )
    }

    /// Run one full sweep.
    pub async fn sweep(&self) -> SweepReport {
        info!("Heartbeat sweep started");
        let mut report = SweepReport::default();

        {
            let _process = self.stores.lock_user(PROCESS_SCOPE).await;

            match self.daily_post().await {
                Ok(posted) => report.daily_post = posted,
                Err(e) => {
                    warn!(error = %e, "Failed to publish daily post");
                    report.errors += 1;
                }
            }

            match self.reply_to_comments().await {
                Ok(n) => report.comment_replies = n,
                Err(e) => {
                    warn!(error = %e, "Failed to check community comments");
                    report.errors += 1;
                }
            }
        }

        let strong = self.strong_signal().await;

        let users = match self.stores.users().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to list users, skipping tracked markets");
                report.errors += 1;
                return report;
            }
        };

        for user_id in users {
            let _guard = self.stores.lock_user(&user_id).await;
            if let Err(e) = self.sweep_user(&user_id, strong.as_ref(), &mut report).await {
                warn!(user = %user_id, error = %e, "Heartbeat pass failed for user");
                report.errors += 1;
            }
            report.users += 1;
        }

        let held = self.stores.prune_idle_locks();
        debug!(held_locks = held, "Pruned idle user locks");

        info!(
            users = report.users,
            checked = report.markets_checked,
            failed = report.markets_failed,
            edge_alerts = report.edge_alerts,
            strong_alerts = report.strong_signal_alerts,
            daily_post = report.daily_post,
            replies = report.comment_replies,
            errors = report.errors,
            "Heartbeat sweep finished"
        );
        report
    }

    async fn notify(&self, user_id: &str, message: &str) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };
        match notifier.notify(user_id, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user = %user_id, error = %e, "Failed to deliver notification");
                false
            }
        }
    }

    // -- Per-user pass --

    async fn sweep_user(
        &self,
        user_id: &str,
        strong: Option<&Signal>,
        report: &mut SweepReport,
    ) -> ZigmaResult<()> {
        let memory = self.stores.user(user_id)?;

        let mut tracked = memory.tracked().await?;
        if !tracked.is_empty() {
            for market in tracked.iter_mut() {
                let analysis = match self.client.market_analysis(&market.market_id).await {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        warn!(user = %user_id, market_id = %market.market_id, error = %e, "Failed to check tracked market");
                        report.markets_failed += 1;
                        continue;
                    }
                };
                report.markets_checked += 1;

                let last_edge = market.last_edge.unwrap_or(0.0);
                let (edge, change) = edge_move(analysis.edge, market.last_edge);
                if change >= market.threshold {
                    let alert = format::edge_alert(&analysis, &market.market_id, last_edge, edge);
                    if self.notify(user_id, &alert).await {
                        report.edge_alerts += 1;
                    }
                }
                market.last_edge = Some(edge);
            }
            memory.set_tracked(&tracked).await?;
        }

        if let Some(signal) = strong {
            let last = memory.last_strong_signal().await?;
            if last.as_deref() != Some(signal.market_id.as_str())
                && self
                    .notify(user_id, &format::strong_signal_alert(signal))
                    .await
            {
                memory.set_last_strong_signal(&signal.market_id).await?;
                report.strong_signal_alerts += 1;
            }
        }
        Ok(())
    }

    /// The top signal, if it is a strong trade. Fetched once per sweep.
    async fn strong_signal(&self) -> Option<Signal> {
        if self.notifier.is_none() {
            return None;
        }
        let query = SignalQuery {
            limit: 1,
            min_edge: self.cfg.limits.strong_signal_min_edge,
            category: None,
        };
        match self.client.signals(&query).await {
            Ok(signals) => signals
                .into_iter()
                .next()
                .filter(|s| s.tier == SignalTier::StrongTrade),
            Err(e) => {
                warn!(error = %e, "Failed to check for strong signals");
                None
            }
        }
    }

    // -- Process-scope duties --

    /// Post the top signals once per local day. Returns whether a post was
    /// made.
    async fn daily_post(&self) -> Result<bool> {
        let Some(community) = self.community.as_ref().filter(|c| c.is_enabled()) else {
            return Ok(false);
        };

        let process = self.stores.process()?;
        let today = day_key(today());
        if process.last_daily_post().await?.as_deref() == Some(today.as_str()) {
            debug!(day = %today, "Daily post already published");
            return Ok(false);
        }

        let query = SignalQuery::from_percent(
            self.cfg.community.daily_post_signals,
            self.cfg.limits.default_min_edge,
            None,
        );
        let signals = self.client.signals(&query).await?;
        if signals.is_empty() {
            info!("No signals for the daily post");
            return Ok(false);
        }

        let date = format::date_label(Local::now());
        let post = NewPost {
            submolt: self.cfg.community.submolt.clone(),
            title: format::daily_post_title(&date),
            content: format::daily_post(&signals, &date),
        };

        match community.create_post(&post).await? {
            Some(post_id) => {
                process.set_last_daily_post(&today).await?;
                info!(post_id = %post_id, signals = signals.len(), "Published daily alpha");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reply once to each new top-level comment on the bot's recent posts.
    async fn reply_to_comments(&self) -> Result<usize> {
        let Some(community) = self.community.as_ref().filter(|c| c.is_enabled()) else {
            return Ok(0);
        };

        let process = self.stores.process()?;
        let mut replied = process.replied_comments().await?;
        let posts = community.my_posts(self.cfg.community.recent_posts).await?;
        let mut market_count = None;
        let mut sent = 0;

        for post in posts {
            let comments = match community.comments(&post.id).await {
                Ok(comments) => comments,
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "Failed to fetch comments");
                    continue;
                }
            };

            for comment in comments {
                if comment.parent_id.is_some() || replied.contains(&comment.id) {
                    continue;
                }

                let count = match market_count {
                    Some(count) => count,
                    None => {
                        let count = self.client.market_count().await;
                        market_count = Some(count);
                        count
                    }
                };
                let reply = format::comment_reply(&comment.author, &comment.content, count);

                match community.reply(&post.id, &comment.id, &reply).await {
                    Ok(true) => {
                        replied.push(comment.id.clone());
                        process.set_replied_comments(&replied).await?;
                        sent += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(post_id = %post.id, comment_id = %comment.id, error = %e, "Failed to reply to comment");
                    }
                }
            }
        }
        Ok(sent)
    }
}
