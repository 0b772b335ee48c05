//! Entitlements and daily usage.
//!
//! Resolves a user's tier from their connected wallet, keeps per-day usage
//! counters in user memory, and answers the quota questions the commands ask
//! before touching the oracle. Every check here runs before any fetch.

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AppConfig, GlobalLimits, TierTable};
use crate::store::UserMemory;
use crate::types::{
    AccessInfo, Denial, Limit, TierLimits, UsageDelta, UsageRecord, UserTier, ZigmaError,
    ZigmaResult,
};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Wallet → access info. Implemented by the oracle client; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TierLookup: Send + Sync {
    async fn lookup_access(&self, wallet: &str) -> ZigmaResult<AccessInfo>;
}

/// Calendar-day key in the process-local timezone.
pub fn day_key(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct EntitlementTracker {
    lookup: Arc<dyn TierLookup>,
    tiers: TierTable,
    limits: GlobalLimits,
}

impl EntitlementTracker {
    pub fn new(cfg: &AppConfig, lookup: Arc<dyn TierLookup>) -> Self {
        Self {
            lookup,
            tiers: cfg.tiers.clone(),
            limits: cfg.limits.clone(),
        }
    }

    pub fn tier_limits(&self, tier: UserTier) -> &TierLimits {
        self.tiers.get(tier)
    }

    // -- Tier resolution --

    /// Tier of the user's connected wallet. No wallet means `Free` without a
    /// lookup; a failed lookup also means `Free`.
    pub async fn resolve_tier(&self, memory: &UserMemory) -> UserTier {
        let wallet = match memory.wallet().await {
            Ok(Some(wallet)) => wallet,
            Ok(None) => return UserTier::Free,
            Err(e) => {
                warn!(error = %e, "Failed to read wallet, treating user as FREE");
                return UserTier::Free;
            }
        };

        match self.lookup.lookup_access(&wallet).await {
            Ok(access) => {
                let tier = access.tier();
                debug!(wallet = %wallet, tier = %tier, "Resolved tier");
                tier
            }
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "Tier lookup failed, treating user as FREE");
                UserTier::Free
            }
        }
    }

    // -- Usage --

    /// Today's usage, zeroed if nothing was recorded yet.
    pub async fn usage(&self, memory: &UserMemory) -> ZigmaResult<UsageRecord> {
        self.usage_on(memory, today()).await
    }

    pub async fn usage_on(&self, memory: &UserMemory, day: NaiveDate) -> ZigmaResult<UsageRecord> {
        let usage = memory.usage_map().await?;
        Ok(usage.get(&day_key(day)).copied().unwrap_or_default())
    }

    pub async fn record_usage(
        &self,
        memory: &UserMemory,
        delta: UsageDelta,
    ) -> ZigmaResult<UsageRecord> {
        self.record_usage_on(memory, delta, today()).await
    }

    /// Merge `delta` into the record for `day` and persist the whole map.
    /// Days outside the retention window are dropped on the way.
    pub async fn record_usage_on(
        &self,
        memory: &UserMemory,
        delta: UsageDelta,
        day: NaiveDate,
    ) -> ZigmaResult<UsageRecord> {
        let mut usage = memory.usage_map().await?;
        let record = usage.entry(day_key(day)).or_default();
        record.apply(delta);
        let updated = *record;

        let retention = u64::from(self.limits.usage_retention_days.max(1));
        if let Some(oldest) = day.checked_sub_days(Days::new(retention - 1)) {
            usage.retain(|key, _| {
                NaiveDate::parse_from_str(key, DAY_FORMAT).is_ok_and(|d| d >= oldest)
            });
        }

        memory.set_usage_map(&usage).await?;
        Ok(updated)
    }

    // -- Quota checks --

    pub fn check_signal_quota(&self, tier: UserTier, usage: &UsageRecord) -> ZigmaResult<()> {
        check(
            self.tier_limits(tier).signals_per_day,
            usage.signals_requested,
            |limit| Denial::SignalQuota { limit },
        )
    }

    pub fn check_wallet_quota(&self, tier: UserTier, usage: &UsageRecord) -> ZigmaResult<()> {
        check(
            self.tier_limits(tier).wallet_analysis_per_day,
            usage.wallet_analyses,
            |limit| Denial::WalletQuota { limit },
        )
    }

    /// Whether one more market may be tracked. The tier cap is checked first,
    /// then the absolute cap that applies to every tier.
    pub fn check_tracking_capacity(&self, tier: UserTier, tracked: usize) -> ZigmaResult<()> {
        let tracked = u32::try_from(tracked).unwrap_or(u32::MAX);
        check(self.tier_limits(tier).tracked_markets, tracked, |limit| {
            Denial::TierTrackingCap { limit }
        })?;
        check(
            Limit::Max(self.limits.max_tracked_markets),
            tracked,
            |limit| Denial::GlobalTrackingCap { limit },
        )
    }

    pub fn check_arbitrage(&self, tier: UserTier) -> ZigmaResult<()> {
        if self.tier_limits(tier).arbitrage {
            Ok(())
        } else {
            Err(ZigmaError::Quota(Denial::ArbitrageLocked { tier }))
        }
    }

    /// Requested signal count clamped to the tier's daily quota.
    pub fn effective_signal_limit(&self, tier: UserTier, requested: u32) -> u32 {
        self.tier_limits(tier).signals_per_day.clamp(requested)
    }
}

fn check(limit: Limit, used: u32, denial: impl FnOnce(u32) -> Denial) -> ZigmaResult<()> {
    match limit {
        Limit::Max(n) if limit.is_exhausted(used) => Err(ZigmaError::Quota(denial(n))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
