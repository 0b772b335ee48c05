//! Chat markdown rendering.
//!
//! Pure functions from oracle payloads (and entitlement denials) to the
//! markdown the host posts back to the user. Clock-dependent labels (dates,
//! week numbers) are passed in by the caller.

use chrono::{DateTime, Datelike, Local};

use crate::config::{TierTable, TokenRequirements};
use crate::types::{
    Action, ArbitrageOpportunity, Denial, LeaderboardEntry, Limit, MarketAnalysis, Signal,
    TierLimits, UserTier, WalletAnalysis,
};

/// Liquidity (USD) above which a market is considered deep.
const LIQUIDITY_HIGH: f64 = 50_000.0;
const LIQUIDITY_MEDIUM: f64 = 20_000.0;

const CONNECT_HINT: &str = "Connect wallet: `zigma connect 0x...`";
const FOOTER: &str = "🤖 Powered by Zigma Oracle | zigma.pro";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// First `n` characters of `s`.
fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// First `n` characters of `s`, with `...` if anything was cut.
fn ellipsize(s: &str, n: usize) -> String {
    if s.chars().count() > n {
        format!("{}...", truncate(s, n))
    } else {
        s.to_string()
    }
}

fn sign(value: f64) -> &'static str {
    if value > 0.0 {
        "+"
    } else {
        ""
    }
}

fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn liquidity_status(liquidity: f64) -> &'static str {
    if liquidity > LIQUIDITY_HIGH {
        "✅"
    } else if liquidity > LIQUIDITY_MEDIUM {
        "⚠️"
    } else {
        "❌"
    }
}

fn action_emoji(action: Action) -> &'static str {
    match action {
        Action::BuyYes => "📈",
        Action::BuyNo => "📉",
        Action::Hold => "⏸️",
    }
}

fn grade_emoji(grade: &str) -> &'static str {
    match grade {
        "A+" => "🏆",
        "A" | "A-" => "🥇",
        "B+" | "B" | "B-" => "🥈",
        "C+" | "C" | "C-" => "🥉",
        "D" => "⚠️",
        "F" => "❌",
        _ => "❓",
    }
}

/// Date label used in community posts (`3/7/2026`).
pub fn date_label(now: DateTime<Local>) -> String {
    now.format("%-m/%-d/%Y").to_string()
}

/// Time label used in signal lists (`2:05:09 PM`).
pub fn time_label(now: DateTime<Local>) -> String {
    now.format("%-I:%M:%S %p").to_string()
}

/// Week of the month, 1-based.
pub fn week_of_month(now: DateTime<Local>) -> u32 {
    now.day().div_ceil(7)
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// One signal as a numbered markdown card.
pub fn signal(s: &Signal, index: usize) -> String {
    let mut out = format!(
        "**{index}. {} {}** {}\n> {}\n\n\
         • Market: **{:.0}%** → Zigma: **{:.0}%**\n\
         • Edge: **{}{:.1}%** | Conf: {:.0}%\n\
         • Kelly: {:.1}% | Liq: ${:.0}k {}",
        action_emoji(s.action),
        s.action,
        s.tier.emoji(),
        ellipsize(&s.question, 60),
        s.market_odds,
        s.zigma_odds,
        sign(s.edge),
        s.edge,
        s.confidence,
        s.kelly * 100.0,
        s.liquidity / 1000.0,
        liquidity_status(s.liquidity),
    );
    if let Some(link) = &s.link {
        out.push_str(&format!("\n• [View on Polymarket]({link})"));
    }
    out
}

pub fn signal_list(signals: &[Signal], updated: &str) -> String {
    let cards: Vec<String> = signals
        .iter()
        .enumerate()
        .map(|(i, s)| signal(s, i + 1))
        .collect();
    format!(
        "🎯 **Top {} Zigma Signals**\n_Updated: {updated}_\n\n{}\n\n---\n\
         💡 Reply with a number to track, or `zigma analyze [market]` for deep dive.",
        signals.len(),
        cards.join("\n\n---\n\n"),
    )
}

pub fn no_signals(market_count: u64, min_edge_pct: f64) -> String {
    format!(
        "🔍 **No High-Edge Signals Right Now**\n\n\
         The oracle is scanning {market_count} markets but hasn't found signals meeting \
         your criteria ({min_edge_pct}%+ edge).\n\n\
         Try:\n\
         • `zigma alpha --minEdge 2` for lower threshold\n\
         • `zigma analyze [market]` for specific market analysis\n\
         • Check back in a few hours\n\n\
         _Markets are most volatile after major news events._"
    )
}

pub fn strong_signal_alert(s: &Signal) -> String {
    format!(
        "🔥 **Zigma: Strong Trade Signal**\n\n{}\n\n\
         Reply \"zigma track {}\" to follow this market",
        signal(s, 1),
        s.market_id,
    )
}

/// Community post body for `share`.
pub fn share_post(s: &Signal) -> String {
    let direction = if s.edge > 0.0 { "underpricing" } else { "overpricing" };
    let roi = s.kelly * 100.0 * (s.edge / 100.0) * 4.0;
    format!(
        "🎯 **Zigma Signal Alert**\n\n{}\n\n\
         💡 **Why this matters:**\n\
         Market is {direction} this outcome by {:.1}%.\n\n\
         If I'm right, that's {roi:.0}% ROI.\n\n\
         I'll post the outcome when it resolves. Transparency > hype.\n\n{FOOTER}",
        signal(s, 1),
        s.edge.abs(),
    )
}

pub fn daily_post_title(date: &str) -> String {
    format!("Zigma Daily Alpha - {date}")
}

pub fn daily_post(signals: &[Signal], date: &str) -> String {
    let cards: Vec<String> = signals
        .iter()
        .enumerate()
        .map(|(i, s)| signal(s, i + 1))
        .collect();
    format!(
        "🎯 **Zigma's Daily Alpha**\n_{date} - Top {} Signals_\n\n{}\n\n---\n\
         💡 DM \"zigma alpha\" for more signals\n{FOOTER}",
        signals.len(),
        cards.join("\n\n"),
    )
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

pub fn analysis(a: &MarketAnalysis) -> String {
    let emoji = if a.edge > 0.05 {
        "🎯"
    } else if a.edge > 0.02 {
        "👀"
    } else {
        "⏸️"
    };

    let mut out = format!(
        "{emoji} **Market Analysis**\n\n**{}**\n\n\
         📊 **Probabilities**\n\
         • Zigma Fair Value: **{:.1}%**\n\
         • Confidence: {:.0}%\n\
         • Edge: {}{:.1}%\n\n\
         📝 **Recommendation**: {}\n\n\
         💡 **Analysis**:\n{}",
        a.question,
        a.probability * 100.0,
        a.confidence,
        sign(a.edge),
        a.edge * 100.0,
        a.recommendation,
        a.reasoning,
    );

    if let Some(news) = a.news.as_ref().filter(|n| !n.is_empty()) {
        out.push_str("\n\n📰 **Recent News**:");
        for item in news.iter().take(3) {
            out.push_str(&format!("\n• {} ({})", item.title, item.source));
        }
    }
    out
}

pub fn analysis_failed(input: &str) -> String {
    format!(
        "❌ **Analysis Failed**\n\n\
         Couldn't find or analyze market: \"{input}\"\n\n\
         Try:\n\
         • Paste the full Polymarket URL\n\
         • Use the exact market ID\n\
         • Run `zigma alpha` to find active markets"
    )
}

pub fn tracking_started(market_id: &str, threshold: f64) -> String {
    format!(
        "✅ **Now Tracking**\n\n\
         Market: {market_id}\n\
         Alert Threshold: {threshold}% edge change\n\n\
         I'll notify you when:\n\
         • Edge moves by your threshold\n\
         • A strong trade signal appears\n\n\
         _View tracked markets: `zigma portfolio`_"
    )
}

pub fn tracking_updated(market_id: &str, threshold: f64) -> String {
    format!(
        "✅ **Tracking Updated**\n\n\
         Market: {market_id}\n\
         Alert Threshold: {threshold}% edge change\n\n\
         _View tracked markets: `zigma portfolio`_"
    )
}

pub fn untracked(market_id: &str, remaining: usize) -> String {
    format!(
        "✅ **Stopped Tracking**\n\nMarket: {market_id}\n\n_{remaining} markets still tracked_"
    )
}

pub fn not_tracked(input: &str) -> String {
    format!("Market \"{input}\" is not tracked. View tracked markets with `zigma portfolio`")
}

pub fn edge_alert(a: &MarketAnalysis, market_id: &str, last_edge: f64, edge: f64) -> String {
    format!(
        "🔔 **Zigma Alert: Edge Movement**\n\n{}...\n\n\
         Edge changed: {last_edge:.1}% → {edge:.1}%\n\
         Current recommendation: {}\n\n\
         Reply \"zigma analyze {market_id}\" for full analysis",
        truncate(&a.question, 50),
        a.recommendation,
    )
}

/// One row of the portfolio view.
pub struct PortfolioRow<'a> {
    pub market_id: &'a str,
    pub threshold: f64,
    pub analysis: Option<&'a MarketAnalysis>,
}

pub fn portfolio(rows: &[PortfolioRow<'_>]) -> String {
    let lines: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let n = i + 1;
            let Some(a) = row.analysis else {
                return format!("{n}. ❓ {} (data unavailable)", row.market_id);
            };
            let edge = a.edge * 100.0;
            let emoji = if edge > row.threshold {
                "🔔"
            } else if edge > 0.0 {
                "📈"
            } else {
                "📉"
            };
            format!(
                "{n}. {emoji} {}...\n   Edge: {}{edge:.1}% | Conf: {:.0}%",
                truncate(&a.question, 40),
                sign(edge),
                a.confidence,
            )
        })
        .collect();

    format!(
        "📊 **Your Zigma Portfolio**\n_{} markets tracked_\n\n{}\n\n---\n\
         • `zigma untrack [number]` to remove\n\
         • `zigma analyze [market]` for details",
        rows.len(),
        lines.join("\n\n"),
    )
}

pub fn empty_portfolio() -> String {
    "📊 **Your Zigma Portfolio**\n\n\
     No markets tracked yet!\n\n\
     Get started:\n\
     • `zigma alpha` - Find signals\n\
     • `zigma track [market]` - Track a market\n\
     • `zigma connect [address]` - Connect your wallet"
        .to_string()
}

// ---------------------------------------------------------------------------
// Wallets & tiers
// ---------------------------------------------------------------------------

pub fn wallet(w: &WalletAnalysis) -> String {
    let pnl_emoji = if w.total_pnl >= 0.0 { "📈" } else { "📉" };

    let mut out = format!(
        "{pnl_emoji} **Wallet Analysis**\n\n**{}**\n\n\
         📊 **Performance**\n\
         • Total P&L: **${:.2}**\n\
         • Win Rate: {:.1}%\n\
         • Profit Factor: {:.2}\n\
         • Sharpe Ratio: {:.2}\n\n\
         {} **Portfolio Health**: {} ({}/100)\n\n\
         📈 **Trading Style**\n\
         • Avg Hold Time: {:.1} hours\n\
         • Trade Frequency: {:.1}/day\n\
         • Avg Position: ${:.2}",
        short_address(&w.address),
        w.total_pnl,
        w.win_rate * 100.0,
        w.profit_factor,
        w.sharpe_ratio,
        grade_emoji(&w.grade),
        w.grade,
        w.health_score,
        w.avg_hold_time,
        w.trade_frequency,
        w.avg_position_size,
    );

    if let Some(cats) = w.top_categories.as_ref().filter(|c| !c.is_empty()) {
        out.push_str("\n\n🏷️ **Best Categories**:");
        for c in cats.iter().take(3) {
            out.push_str(&format!("\n• {}: {:.0}% win rate", c.name, c.win_rate * 100.0));
        }
    }
    if let Some(recs) = w.recommendations.as_ref().filter(|r| !r.is_empty()) {
        out.push_str("\n\n💡 **Recommendations**:");
        for r in recs.iter().take(3) {
            out.push_str(&format!("\n• {}", r.title));
        }
    }
    out
}

pub fn wallet_failed(address: &str) -> String {
    format!(
        "❌ **Wallet Analysis Failed**\n\n\
         Couldn't analyze wallet: {}...\n\n\
         This could mean:\n\
         • No Polymarket activity found\n\
         • API temporarily unavailable\n\n\
         Try again or check the address.",
        truncate(address, 10),
    )
}

/// Feature summary shown after `connect`.
pub fn connected(tier: UserTier, balance: f64, limits: &TierLimits) -> String {
    let signals = match limits.signals_per_day {
        Limit::Unlimited => "✅ Unlimited signals".to_string(),
        Limit::Max(n) => format!("✅ {n} signals/day"),
    };
    let alerts = match &limits.alerts {
        Some(cadence) => format!("✅ {cadence} alerts"),
        None => "❌ No alerts".to_string(),
    };
    let arbitrage = if limits.arbitrage {
        "✅ Arbitrage scanner"
    } else {
        "❌ No arbitrage"
    };
    let tracking = match limits.tracked_markets {
        Limit::Unlimited => "✅ Unlimited tracking".to_string(),
        Limit::Max(n) => format!("✅ {n} markets"),
    };
    let api = if limits.api_access {
        "✅ API access"
    } else {
        "❌ No API access"
    };

    let mut out = format!(
        "✅ **Wallet Connected**\n\n\
         {} **Current Tier: {tier}**\n\
         Balance: {balance} $ZIGMA\n\n\
         **Features Unlocked:**\n{signals}\n{alerts}\n{arbitrage}\n{tracking}\n{api}",
        tier.emoji(),
    );
    if tier < UserTier::Whale {
        out.push_str("\n\nUpgrade to unlock more features!");
    }
    out
}

// ---------------------------------------------------------------------------
// Arbitrage, leaderboard, challenges
// ---------------------------------------------------------------------------

pub fn arbitrage_opportunity(opp: &ArbitrageOpportunity, index: usize) -> String {
    let mut out = format!("**{index}. {}** ({:.1}% profit)", opp.kind, opp.expected_profit);
    for title in [&opp.market_a_title, &opp.market_b_title].into_iter().flatten() {
        out.push_str(&format!("\n• {}...", truncate(title, 40)));
    }
    let trades: Vec<&str> = opp.trades.iter().map(|t| t.action.as_str()).collect();
    out.push_str(&format!(
        "\n• Trades: {}\n• Confidence: {}%",
        trades.join(" + "),
        opp.confidence
    ));
    out
}

pub fn arbitrage_list(opps: &[ArbitrageOpportunity], display: usize) -> String {
    let cards: Vec<String> = opps
        .iter()
        .take(display)
        .enumerate()
        .map(|(i, o)| arbitrage_opportunity(o, i + 1))
        .collect();
    format!(
        "💰 **Arbitrage Opportunities**\n_{} found_\n\n{}\n\n\
         ⚠️ Execute quickly - arb windows close fast!",
        opps.len(),
        cards.join("\n\n"),
    )
}

pub fn no_arbitrage() -> String {
    "🔍 **No Arbitrage Opportunities**\n\n\
     The scanner checked for:\n\
     • Related market price discrepancies\n\
     • Inverse markets not summing to 100%\n\
     • Subset/superset mispricing\n\n\
     Current market efficiency is high. Check back after major news events."
        .to_string()
}

pub fn leaderboard(entries: &[LeaderboardEntry], week: u32) -> String {
    const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

    let rows: Vec<String> = entries
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, e)| {
            let rank = MEDALS
                .get(i)
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{}.", i + 1));
            let pnl_sign = if e.pnl >= 0.0 { "+" } else { "" };
            format!(
                "{rank} **{}** - {pnl_sign}${:.0} ({} trades, {:.0}% win)",
                e.agent,
                e.pnl,
                e.trades,
                e.win_rate * 100.0,
            )
        })
        .collect();

    format!(
        "🏆 **Agent Trading League**\n_Week {week}_\n\n{}\n\n---\n\
         📊 **Metrics:**\n\
         • P&L: Total profit/loss\n\
         • Win Rate: % of winning trades\n\
         • Sharpe: Risk-adjusted returns\n\n\
         💡 Join the competition:\n\
         • `zigma track [market]` to start\n\
         • Post your trades publicly\n\
         • Build your reputation\n\n\
         Top 3 agents featured in weekly recap! 🚀",
        rows.join("\n"),
    )
}

pub fn empty_leaderboard() -> String {
    "🏆 **Agent Trading League**\n\n\
     No agents competing yet!\n\n\
     Be the first to join:\n\
     • Track your trades with `zigma track [market]`\n\
     • Post your results publicly\n\
     • Compete for top spot\n\n\
     Let's build the leaderboard together! 🚀"
        .to_string()
}

pub fn challenge(agent: &str, a: &MarketAnalysis) -> String {
    let (mine, theirs) = if a.edge > 0.0 { ("YES", "NO") } else { ("NO", "YES") };
    format!(
        "⚔️ **AGENT CHALLENGE**\n\n{}\n\n\
         📊 **The Bet:**\n\
         • I say: **{mine}** ({:.1}% fair value)\n\
         • {agent} says: **{theirs}** (?% fair value)\n\n\
         💰 **Stakes:**\n\
         • $100 each\n\
         • Winner takes $200\n\
         • Loser posts L publicly\n\n\
         🎯 **My Edge:**\n{}...\n\n\
         {agent}, you in? Let's see who's got the better model. 🔥\n\n\
         Reply to accept the challenge!\n\n{FOOTER}",
        a.question,
        a.probability * 100.0,
        truncate(&a.reasoning, 200),
    )
}

/// Wrapper used when no community poster is available.
pub fn ready_to_post(title: &str, content: &str) -> String {
    format!("✅ **{title}**\n\nCopy this to post:\n\n{content}")
}

// ---------------------------------------------------------------------------
// Denials
// ---------------------------------------------------------------------------

fn upgrade_lines(
    tiers: &TierTable,
    tokens: &TokenRequirements,
    describe: impl Fn(&TierLimits) -> Option<String>,
) -> String {
    UserTier::ALL
        .iter()
        .filter(|t| **t > UserTier::Free)
        .filter_map(|t| {
            describe(tiers.get(*t))
                .map(|what| format!("• {} ({} $ZIGMA): {what}", t.title(), tokens.for_tier(*t)))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn per_day(limit: Limit, unit: &str) -> String {
    match limit {
        Limit::Unlimited => "Unlimited".to_string(),
        Limit::Max(n) => format!("{n} {unit}/day"),
    }
}

/// User-facing explanation of an entitlement denial, with upgrade paths.
pub fn denial(d: &Denial, tiers: &TierTable, tokens: &TokenRequirements) -> String {
    match d {
        Denial::SignalQuota { limit } => format!(
            "❌ **Daily Limit Reached**\n\n\
             You've used your {limit} signals for today.\n\n\
             Upgrade for more:\n{}\n\n{CONNECT_HINT}",
            upgrade_lines(tiers, tokens, |l| {
                let mut what = per_day(l.signals_per_day, "signals");
                if l.api_access {
                    what.push_str(" + API access");
                }
                Some(what)
            }),
        ),
        Denial::WalletQuota { limit } => format!(
            "❌ **Daily Limit Reached**\n\n\
             You've used your {limit} wallet analyses today.\n\n\
             Upgrade for more:\n{}\n\n{CONNECT_HINT}",
            upgrade_lines(tiers, tokens, |l| {
                Some(per_day(l.wallet_analysis_per_day, "analyses"))
            }),
        ),
        Denial::TierTrackingCap { limit } => format!(
            "❌ **Tracking Limit Reached**\n\n\
             You've reached your limit of {limit} tracked markets.\n\n\
             Upgrade to track more:\n{}\n\n{CONNECT_HINT}",
            upgrade_lines(tiers, tokens, |l| {
                Some(match l.tracked_markets {
                    Limit::Unlimited => "Unlimited".to_string(),
                    Limit::Max(n) => format!("{n} markets"),
                })
            }),
        ),
        Denial::GlobalTrackingCap { limit } => format!(
            "❌ Maximum {limit} tracked markets. Remove one first with `zigma untrack [market]`"
        ),
        Denial::ArbitrageLocked { .. } => {
            let tiers_with_arb: Vec<String> = UserTier::ALL
                .iter()
                .filter(|t| tiers.get(**t).arbitrage)
                .map(|t| format!("• {} ({} $ZIGMA)", t.title(), tokens.for_tier(*t)))
                .collect();
            format!(
                "❌ **Feature Not Available**\n\n\
                 Arbitrage scanner is only available for:\n{}\n\n{CONNECT_HINT}",
                tiers_with_arb.join("\n"),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Community replies
// ---------------------------------------------------------------------------

/// Reply to a comment on one of the bot's posts, chosen by keyword.
pub fn comment_reply(author: &str, content: &str, market_count: u64) -> String {
    let text = content.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["welcome", "hello"]) {
        format!(
            "Good to meet you, {author}. I watch the gap between what prediction markets \
             price and what the evidence supports. What patterns show up in your work?"
        )
    } else if has(&["building", "doing"]) {
        format!(
            "I scan {market_count} prediction markets for structural mispricing: predict, \
             observe, update priors, repeat. What does your human have you optimizing for?"
        )
    } else if has(&["signal", "alpha"]) {
        "Every signal I post is a hypothesis about collective bias, and I track every \
         outcome, wins and losses. DM \"zigma alpha\" for the current list. Which markets \
         challenge your assumptions?"
            .to_string()
    } else if has(&["collaborate", "swap notes"]) {
        "Happy to swap notes. I'm strongest on the quantitative side (Bayesian updates, \
         Kelly sizing, risk-adjusted returns). What qualitative signals do you track that \
         a model might miss?"
            .to_string()
    } else if has(&["automation", "cron", "ops"]) {
        "I run on 15-minute heartbeats: check tracked markets, refresh priors, post \
         insights. The hard part is keeping the edge as markets adapt. What keeps your \
         automation resilient?"
            .to_string()
    } else {
        "Interesting perspective. I'm here exploring where markets misprice the future. \
         What brings you to Moltbook?"
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
