//! Chat command handlers.
//!
//! Each command validates its parameters, consults the entitlement tracker,
//! calls the oracle through the resilient client, and renders markdown.
//! Handlers return `ZigmaResult<String>`; [`Skill::dispatch`] is the only
//! place errors become user-facing text.

pub mod account;
pub mod markets;
pub mod signals;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::ZigmaClient;
use crate::config::{AppConfig, GlobalLimits};
use crate::entitlement::{EntitlementTracker, TierLookup};
use crate::format;
use crate::store::{StoreRegistry, UserMemory};
use crate::types::{ZigmaError, ZigmaResult};

pub use account::{ConnectParams, WalletParams};
pub use markets::{AnalyzeParams, ChallengeParams, TrackParams, UntrackParams};
pub use signals::{AlphaParams, ShareParams};

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

/// Pushes a message to a user outside a command reply.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str) -> anyhow::Result<()>;
}

/// Publishes content to a community on the user's behalf.
#[async_trait]
pub trait Poster: Send + Sync {
    async fn post(&self, community: &str, content: &str) -> anyhow::Result<()>;
}

/// Everything a handler knows about the caller.
#[derive(Clone)]
pub struct SkillContext {
    pub user_id: String,
    pub memory: UserMemory,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub poster: Option<Arc<dyn Poster>>,
}

impl SkillContext {
    pub fn new(user_id: impl Into<String>, memory: UserMemory) -> Self {
        Self {
            user_id: user_id.into(),
            memory,
            notifier: None,
            poster: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Command registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Alpha,
    Connect,
    Analyze,
    Track,
    Untrack,
    Portfolio,
    Wallet,
    Arb,
    Leaderboard,
    Share,
    Challenge,
}

impl Command {
    pub const ALL: &'static [Command] = &[
        Command::Alpha,
        Command::Connect,
        Command::Analyze,
        Command::Track,
        Command::Untrack,
        Command::Portfolio,
        Command::Wallet,
        Command::Arb,
        Command::Leaderboard,
        Command::Share,
        Command::Challenge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Alpha => "alpha",
            Command::Connect => "connect",
            Command::Analyze => "analyze",
            Command::Track => "track",
            Command::Untrack => "untrack",
            Command::Portfolio => "portfolio",
            Command::Wallet => "wallet",
            Command::Arb => "arb",
            Command::Leaderboard => "leaderboard",
            Command::Share => "share",
            Command::Challenge => "challenge",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Alpha => "Get top trading signals with edge",
            Command::Connect => "Connect your wallet for premium features",
            Command::Analyze => "Deep analysis of a specific market",
            Command::Track => "Track a market for alerts",
            Command::Untrack => "Stop tracking a market",
            Command::Portfolio => "View your tracked markets and positions",
            Command::Wallet => "Analyze a Polymarket wallet",
            Command::Arb => "Scan for arbitrage opportunities",
            Command::Leaderboard => "View agent trading competition leaderboard",
            Command::Share => "Share a signal to the community",
            Command::Challenge => "Challenge another agent to a prediction bet",
        }
    }

    /// JSON schema of the command's parameters, as advertised to the host.
    pub fn parameters(&self, limits: &GlobalLimits) -> Value {
        let market = json!({
            "type": "string",
            "description": "Market ID or Polymarket URL"
        });
        let address = json!({
            "type": "string",
            "pattern": "^0x[a-fA-F0-9]{40}$",
            "description": "Ethereum wallet address"
        });

        let (properties, required) = match self {
            Command::Alpha => (
                json!({
                    "limit": {
                        "type": "integer", "minimum": 1, "maximum": 50,
                        "default": limits.default_signal_limit
                    },
                    "minEdge": {
                        "type": "number", "minimum": 0, "maximum": 100,
                        "default": limits.default_min_edge,
                        "description": "Minimum edge in percent"
                    },
                    "category": { "type": "string" }
                }),
                json!([]),
            ),
            Command::Connect | Command::Wallet => (json!({ "address": address }), json!(["address"])),
            Command::Analyze => (json!({ "market": market }), json!(["market"])),
            Command::Track => (
                json!({
                    "market": market,
                    "threshold": {
                        "type": "number", "minimum": 0, "maximum": 100,
                        "default": limits.default_track_threshold,
                        "description": "Edge change in percent that triggers an alert"
                    }
                }),
                json!(["market"]),
            ),
            Command::Untrack => (
                json!({
                    "market": {
                        "type": "string",
                        "description": "Market ID, Polymarket URL, or position in `zigma portfolio`"
                    }
                }),
                json!(["market"]),
            ),
            Command::Share => (
                json!({ "signalIndex": { "type": "integer", "minimum": 1, "default": 1 } }),
                json!([]),
            ),
            Command::Challenge => (
                json!({ "agent": { "type": "string" }, "market": market }),
                json!(["agent", "market"]),
            ),
            Command::Portfolio | Command::Arb | Command::Leaderboard => (json!({}), json!([])),
        };

        json!({ "type": "object", "properties": properties, "required": required })
    }

    /// Reply used when a fetch or storage failure aborts the command.
    fn failure_message(&self, params: &Value) -> String {
        let param = |key: &str| params.get(key).and_then(Value::as_str).unwrap_or_default();
        match self {
            Command::Alpha => "❌ Failed to fetch signals. Please try again.".to_string(),
            Command::Connect => "❌ Failed to verify wallet. Please try again.".to_string(),
            Command::Analyze => format::analysis_failed(param("market")),
            Command::Track => "❌ Failed to track market. Please try again.".to_string(),
            Command::Untrack => "❌ Failed to untrack market. Please try again.".to_string(),
            Command::Portfolio => "❌ Failed to fetch portfolio. Please try again.".to_string(),
            Command::Wallet => format::wallet_failed(param("address")),
            Command::Arb => "❌ Arbitrage scan failed. Please try again.".to_string(),
            Command::Leaderboard => "❌ Failed to fetch leaderboard. Please try again.".to_string(),
            Command::Share => "❌ Failed to share signal. Please try again.".to_string(),
            Command::Challenge => "❌ Failed to create challenge. Please try again.".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Command {
    type Err = ZigmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| ZigmaError::invalid(format!("Unknown command: {s}")))
    }
}

/// Decode command parameters. `null` is treated as `{}`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Value) -> ZigmaResult<T> {
    let params = if params.is_null() { json!({}) } else { params.clone() };
    serde_json::from_value(params)
        .map_err(|e| ZigmaError::invalid(format!("Invalid parameters: {e}")))
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// The ZIGMA skill: command handlers plus their shared services.
pub struct Skill {
    pub(crate) cfg: Arc<AppConfig>,
    pub(crate) client: Arc<ZigmaClient>,
    pub(crate) tracker: EntitlementTracker,
    stores: Arc<StoreRegistry>,
    notifier: Option<Arc<dyn Notifier>>,
    poster: Option<Arc<dyn Poster>>,
}

impl Skill {
    pub fn new(cfg: Arc<AppConfig>, client: Arc<ZigmaClient>, stores: Arc<StoreRegistry>) -> Self {
        let lookup: Arc<dyn TierLookup> = client.clone();
        let tracker = EntitlementTracker::new(&cfg, lookup);
        Self {
            cfg,
            client,
            tracker,
            stores,
            notifier: None,
            poster: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_poster(mut self, poster: Arc<dyn Poster>) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn client(&self) -> &Arc<ZigmaClient> {
        &self.client
    }

    pub fn stores(&self) -> &Arc<StoreRegistry> {
        &self.stores
    }

    pub fn notifier(&self) -> Option<&Arc<dyn Notifier>> {
        self.notifier.as_ref()
    }

    /// Handler context for `user_id`, wired to this skill's notifier/poster.
    pub fn context(&self, user_id: &str) -> ZigmaResult<SkillContext> {
        Ok(SkillContext {
            user_id: user_id.to_string(),
            memory: self.stores.user(user_id)?,
            notifier: self.notifier.clone(),
            poster: self.poster.clone(),
        })
    }

    /// Skill manifest for the host runtime.
    pub fn manifest(&self) -> Value {
        let commands: Vec<Value> = Command::ALL
            .iter()
            .map(|c| {
                json!({
                    "name": c.name(),
                    "description": c.description(),
                    "parameters": c.parameters(&self.cfg.limits),
                })
            })
            .collect();

        json!({
            "name": "zigma",
            "description": "Polymarket prediction market oracle and trading signals",
            "version": env!("CARGO_PKG_VERSION"),
            "commands": commands,
            "heartbeat": { "interval": self.cfg.heartbeat.cron() },
        })
    }

    /// Run a command for the user in `ctx` and always produce a reply.
    /// Commands for the same user run one at a time.
    pub async fn dispatch(&self, command: Command, ctx: &SkillContext, params: Value) -> String {
        let _guard = self.stores.lock_user(&ctx.user_id).await;
        info!(command = %command, user = %ctx.user_id, "Handling command");

        match self.run(command, ctx, &params).await {
            Ok(markdown) => markdown,
            Err(e) => self.user_message(command, &params, &e),
        }
    }

    /// Dispatch by command name. Unknown names never reach a handler.
    pub async fn dispatch_named(&self, name: &str, ctx: &SkillContext, params: Value) -> String {
        match name.parse::<Command>() {
            Ok(command) => self.dispatch(command, ctx, params).await,
            Err(_) => {
                warn!(command = %name, user = %ctx.user_id, "Unknown command");
                format!("❌ Unknown command: {}", name.trim())
            }
        }
    }

    /// Handler result without error mapping.
    pub async fn run(&self, command: Command, ctx: &SkillContext, params: &Value) -> ZigmaResult<String> {
        match command {
            Command::Alpha => self.alpha(ctx, parse_params(params)?).await,
            Command::Connect => self.connect(ctx, parse_params(params)?).await,
            Command::Analyze => self.analyze(ctx, parse_params(params)?).await,
            Command::Track => self.track(ctx, parse_params(params)?).await,
            Command::Untrack => self.untrack(ctx, parse_params(params)?).await,
            Command::Portfolio => self.portfolio(ctx).await,
            Command::Wallet => self.wallet(ctx, parse_params(params)?).await,
            Command::Arb => self.arb(ctx).await,
            Command::Leaderboard => self.leaderboard(ctx).await,
            Command::Share => self.share(ctx, parse_params(params)?).await,
            Command::Challenge => self.challenge(ctx, parse_params(params)?).await,
        }
    }

    /// Single mapping from handler errors to chat replies.
    pub fn user_message(&self, command: Command, params: &Value, err: &ZigmaError) -> String {
        match err {
            ZigmaError::InvalidInput(msg) => format!("❌ {msg}"),
            ZigmaError::Quota(denial) => {
                info!(command = %command, denial = %denial, "Request denied by entitlement");
                format::denial(denial, &self.cfg.tiers, &self.cfg.token_requirements)
            }
            ZigmaError::Network { .. }
            | ZigmaError::Api { .. }
            | ZigmaError::Validation { .. }
            | ZigmaError::Storage(_)
            | ZigmaError::Community(_)
            | ZigmaError::Config(_) => {
                error!(command = %command, error = %err, "Command failed");
                command.failure_message(params)
            }
        }
    }
}
