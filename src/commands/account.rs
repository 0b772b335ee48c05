//! Wallet commands: `connect`, `wallet`.

use serde::Deserialize;
use tracing::info;

use super::{Skill, SkillContext};
use crate::format;
use crate::types::{UsageDelta, ZigmaResult};
use crate::validate::validate_wallet_address;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct WalletParams {
    pub address: String,
}

impl Skill {
    /// Store the user's wallet and report the tier it unlocks. The access
    /// lookup is never cached.
    pub async fn connect(&self, ctx: &SkillContext, params: ConnectParams) -> ZigmaResult<String> {
        let address = params.address.trim();
        validate_wallet_address(address)?;

        ctx.memory.set_wallet(address).await?;
        let access = self.client.access(address).await?;
        let tier = access.tier();

        info!(user = %ctx.user_id, wallet = %address, tier = %tier, "Wallet connected");
        Ok(format::connected(
            tier,
            access.balance,
            self.tracker.tier_limits(tier),
        ))
    }

    /// Trader profile for any wallet, against the daily wallet quota.
    pub async fn wallet(&self, ctx: &SkillContext, params: WalletParams) -> ZigmaResult<String> {
        let address = params.address.trim();
        validate_wallet_address(address)?;

        let tier = self.tracker.resolve_tier(&ctx.memory).await;
        let usage = self.tracker.usage(&ctx.memory).await?;
        self.tracker.check_wallet_quota(tier, &usage)?;

        let analysis = self.client.wallet_analysis(address).await?;
        self.tracker
            .record_usage(&ctx.memory, UsageDelta::wallet_analysis())
            .await?;

        Ok(format::wallet(&analysis))
    }
}
