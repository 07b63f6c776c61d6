//! Locwatch Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - LOCWATCH_HOST: Bind address (default: 0.0.0.0)
//! - LOCWATCH_PORT: Port number (default: 8080)
//! - LOCWATCH_DATA_DIR: Directory for cursors, signal log, webhooks (default: monitoring_data)
//! - LOCWATCH_TARGETS_FILE: JSON array of monitored targets (default: targets.json)
//! - LOCWATCH_FAST_INTERVAL_SECS / LOCWATCH_SLOW_INTERVAL_SECS: Polling cadence
//! - LOCWATCH_MAX_CONCURRENT: Concurrent probe cap per cycle (default: 8)
//! - GITHUB_TOKEN: Repository API token (unauthenticated without it)
//! - SLACK_WEBHOOK: Optional chat relay for signal summaries
//! - RUST_LOG: Log level (default: info)

use std::path::Path;
use std::sync::Arc;

use locwatch::api::{run_server, AppState};
use locwatch::config::MonitorConfig;
use locwatch::cursor::CursorStore;
use locwatch::model::FileTargetSource;
use locwatch::net::{Fetcher, GithubClient, HttpFetcher};
use locwatch::scheduler::{Coordinator, MonitorWorker};
use locwatch::sink::{AlertSink, NotifyRelay, SignalLog, SignalStore, WebhookRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "locwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(MonitorConfig::from_env());

    let host = std::env::var("LOCWATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("LOCWATCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let targets_file = std::env::var("LOCWATCH_TARGETS_FILE")
        .unwrap_or_else(|_| "targets.json".to_string());

    let data_dir = Path::new(&config.data_dir);
    std::fs::create_dir_all(data_dir)?;

    // Durable state under the data directory
    let cursors = Arc::new(CursorStore::open(data_dir.join("cursors.json"))?);
    let store: Arc<dyn SignalStore> = Arc::new(SignalLog::open(data_dir.join("signals.jsonl"))?);
    let registry = Arc::new(WebhookRegistry::open(data_dir.join("webhooks.json"))?);

    let relay = NotifyRelay::from_env();
    let relay_enabled = relay.is_some();
    let sink = Arc::new(AlertSink::new(store.clone(), registry.clone(), relay));

    let targets = Arc::new(FileTargetSource::new(&targets_file));
    if !Path::new(&targets_file).exists() {
        tracing::warn!(
            file = %targets_file,
            "target file missing; cycles will fail until it exists"
        );
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.request_timeout));
    let github = Arc::new(GithubClient::new());

    let coordinator = Arc::new(Coordinator::with_default_probes(
        config.clone(),
        targets,
        fetcher,
        github,
        cursors,
        sink,
    ));

    tracing::info!("Locwatch configuration:");
    tracing::info!("  Host: {}:{}", host, port);
    tracing::info!("  Data dir: {}", config.data_dir);
    tracing::info!("  Targets file: {}", targets_file);
    tracing::info!(
        "  Fast interval: {}s (repositories)",
        config.fast_interval.as_secs()
    );
    tracing::info!(
        "  Slow interval: {}s (app stores, docs)",
        config.slow_interval.as_secs()
    );
    tracing::info!("  Max concurrent probes: {}", config.max_concurrent);
    tracing::info!(
        "  Chat relay: {}",
        if relay_enabled { "ENABLED" } else { "disabled" }
    );

    // Background polling loop; the API can also trigger cycles on demand
    let mut worker = MonitorWorker::new(coordinator.clone());
    worker.start();

    println!(
        r#"
  _                             _       _
 | |    ___   ___ __      ____ _| |_ ___| |__
 | |   / _ \ / __|\ \ /\ / / _` | __/ __| '_ \
 | |__| (_) | (__  \ V  V / (_| | || (__| | | |
 |_____\___/ \___|  \_/\_/ \__,_|\__\___|_| |_|

 Localization Launch Monitor
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    let state = Arc::new(AppState {
        coordinator,
        store,
        registry,
    });
    run_server(state, &host, port).await
}
