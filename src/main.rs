//! LHBOT: Lighthouse bundle watcher and one-shot auto-purchaser
//!
//! Entry point. Loads configuration and secrets, initialises structured
//! logging, restores the purchase marker, and runs the polling loop until
//! SIGINT/SIGTERM.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use lhbot::cloud::lighthouse::LighthouseClient;
use lhbot::config;
use lhbot::engine::decision::DecisionEngine;
use lhbot::engine::scheduler::{self, Scheduler};
use lhbot::notify::wecom::WeComNotifier;
use lhbot::storage::PurchaseMarker;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path =
        std::env::var("LHBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;
    let secrets = cfg.secrets()?;

    let marker = PurchaseMarker::new(cfg.agent.marker_path());
    info!(
        region = %cfg.lighthouse.region,
        bundles = ?cfg.lighthouse.bundle_ids,
        poll_interval_secs = cfg.agent.poll_interval_secs,
        heartbeat_interval_secs = cfg.agent.heartbeat_interval_secs,
        marker = %marker.path().display(),
        "LHBOT starting up"
    );

    let provider = LighthouseClient::new(&cfg.lighthouse, &secrets)?;
    let notifier = WeComNotifier::new(&cfg.webhook, &secrets)?;

    let engine = Arc::new(DecisionEngine::new(
        Arc::new(provider),
        Arc::new(notifier),
        marker,
        chrono::Duration::seconds(i64::try_from(cfg.agent.heartbeat_interval_secs)?),
    ));

    let (tx, rx) = scheduler::shutdown_channel();
    let _signals = scheduler::spawn_signal_listener(tx);

    let cycles = Scheduler::new(engine.clone(), Duration::from_secs(cfg.agent.poll_interval_secs))
        .run(rx)
        .await;

    info!(
        cycles,
        purchase_state = %engine.purchase_state(),
        "LHBOT shut down cleanly."
    );
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lhbot=info"));

    if std::env::var("LHBOT_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
