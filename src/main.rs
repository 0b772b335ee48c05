//! ZIGMA — prediction-market intelligence chat skill
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the skill to its stores and the community client, serves the host
//! bridge, and runs the heartbeat loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use zigma::api::ZigmaClient;
use zigma::commands::{Notifier, Poster, Skill};
use zigma::community::{Community, MoltbookClient};
use zigma::config::AppConfig;
use zigma::heartbeat::Heartbeat;
use zigma::host::{self, HostState, QueuedNotifier};
use zigma::store::StoreRegistry;

const BANNER: &str = r#"
 _______ ____ __  __    _
|__  /_ _/ ___|  \/  |  / \
  / / | | |  _| |\/| | / _ \
 / /_ | | |_| | |  | |/ ___ \
/____|___\____|_|  |_/_/   \_\

  Prediction-market oracle skill
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Logging depends only on the environment, so the config loader can log
    init_logging();
    let cfg = AppConfig::from_env("config.toml")?;
    cfg.validate()?;

    println!("{BANNER}");
    info!(
        api = %cfg.api_base(),
        heartbeat_mins = cfg.heartbeat.interval_mins,
        host_enabled = cfg.host.enabled,
        test_mode = cfg.test_mode,
        "ZIGMA starting up"
    );

    // -- Initialise components -------------------------------------------

    let cfg = Arc::new(cfg);
    let client = Arc::new(ZigmaClient::from_config(&cfg)?);
    let stores = Arc::new(StoreRegistry::from_config(&cfg.storage)?);
    let notifier = Arc::new(QueuedNotifier::from_config(&cfg.host));
    let moltbook = Arc::new(MoltbookClient::from_config(&cfg)?);

    let mut skill = Skill::new(cfg.clone(), client, stores)
        .with_notifier(notifier.clone() as Arc<dyn Notifier>);
    if moltbook.is_enabled() {
        skill = skill.with_poster(moltbook.clone() as Arc<dyn Poster>);
    }

    let heartbeat = Arc::new(Heartbeat::for_skill(
        &skill,
        Some(moltbook as Arc<dyn Community>),
    ));
    let skill = Arc::new(skill);

    if cfg.host.enabled {
        let state = Arc::new(HostState::new(skill.clone(), heartbeat.clone(), notifier));
        host::spawn_host(state, &cfg.host).await?;
    } else {
        info!("Host bridge disabled");
    }

    // -- Heartbeat loop --------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if !cfg.heartbeat.enabled {
        warn!("Heartbeat disabled, serving commands only. Press Ctrl+C to stop.");
        shutdown.await?;
        info!("Shutdown signal received.");
        return Ok(());
    }

    let mut interval = tokio::time::interval(cfg.heartbeat.interval());
    info!(
        cron = %cfg.heartbeat.cron(),
        "Entering heartbeat loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = heartbeat.sweep().await;
                if report.errors > 0 {
                    warn!(errors = report.errors, "Heartbeat sweep finished with errors");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("ZIGMA shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// Level comes from `RUST_LOG`, else `LOG_LEVEL`, else `zigma=info`.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL")
                .map_err(|_| ())
                .and_then(|level| EnvFilter::try_new(format!("zigma={level}")).map_err(|_| ()))
        })
        .unwrap_or_else(|_| EnvFilter::new("zigma=info"));

    let json_logging = std::env::var("ZIGMA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
