//! # ews
//!
//! Weather station backend binary: loads settings, opens the reading store,
//! starts the broadcast hub and WebSocket server, then subscribes to the
//! broker.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ews_ingest::{IngestAdapter, MqttConfig, MqttSubscriber};
use ews_server::{EwsServer, Hub, ShutdownCoordinator, shutdown_signal};
use ews_settings::{BrokerSettings, EwsSettings};
use ews_store::{ReadingStore, SqliteStore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Weather station telemetry backend.
#[derive(Parser, Debug)]
#[command(name = "ews", about = "Weather station telemetry backend")]
struct Cli {
    /// Settings file (defaults to `~/.ews/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long = "db")]
    db_path: Option<PathBuf>,

    /// MQTT broker address (overrides `MQTT_BROKER`).
    #[arg(long)]
    broker: Option<String>,
}

impl Cli {
    /// Command-line flags win over every other settings layer.
    fn apply(&self, settings: &mut EwsSettings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.db_path {
            settings.database.path.clone_from(path);
        }
        if let Some(ref broker) = self.broker {
            settings.broker.url = Some(broker.clone());
        }
    }
}

/// Start MQTT ingestion if a broker is configured.
///
/// Every failure here leaves the server running without ingestion.
async fn start_ingestion(
    settings: &BrokerSettings,
    store: Arc<dyn ReadingStore>,
    hub: Hub,
    cancel: CancellationToken,
) -> Option<JoinHandle<ews_ingest::Result<()>>> {
    let config = match MqttConfig::from_settings(settings) {
        Ok(Some(config)) => config,
        Ok(None) => {
            warn!("no MQTT broker configured, running without ingestion");
            return None;
        }
        Err(e) => {
            error!(error = %e, "invalid broker configuration, running without ingestion");
            return None;
        }
    };

    let subscriber = MqttSubscriber::new(config, IngestAdapter::new(store, hub));
    match subscriber.start(cancel).await {
        Ok(task) => Some(task),
        Err(e) => {
            error!(error = %e, "MQTT subscription failed, running without ingestion");
            None
        }
    }
}

/// Wait for sessions, ingestion and the accept loop, all against one deadline.
async fn drain(
    deadline: Instant,
    shutdown: &ShutdownCoordinator,
    ingestion: Option<JoinHandle<ews_ingest::Result<()>>>,
    server_task: JoinHandle<()>,
) {
    if !shutdown.graceful_shutdown_until(deadline).await {
        warn!("some sessions were still open at exit");
    }
    if let Some(task) = ingestion {
        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "ingestion had already stopped"),
            Ok(Err(e)) => error!(error = %e, "ingestion task failed"),
            Err(_) => warn!("ingestion did not stop in time"),
        }
    }
    if tokio::time::timeout_at(deadline, server_task).await.is_err() {
        warn!("accept loop did not stop in time");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ews_settings::settings_path);
    let mut settings = ews_settings::load_settings_from_path(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;
    cli.apply(&mut settings);

    ews_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;
    info!(config = %config_path.display(), "settings loaded");

    let store = SqliteStore::open(&settings.database).with_context(|| {
        format!(
            "Failed to open database {}",
            settings.database.path.display()
        )
    })?;
    info!(path = %settings.database.path.display(), "reading store ready");

    let (hub, hub_task) = Hub::spawn(&settings.hub);
    let server = EwsServer::new(settings.server.clone(), hub.clone());
    let (addr, server_task) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}:{}", settings.server.host, settings.server.port))?;
    info!(%addr, "ews ready");

    let ingestion = start_ingestion(
        &settings.broker,
        Arc::new(store),
        hub.clone(),
        server.shutdown().token(),
    )
    .await;

    shutdown_signal().await;
    info!("shutdown signal received");

    // Stop accepting and stop ingesting before closing client queues.
    server.shutdown().shutdown();
    hub.shutdown().await;

    let deadline = Instant::now() + settings.server.shutdown_grace();
    drain(deadline, server.shutdown(), ingestion, server_task).await;
    let _ = hub_task.await;

    info!("shutdown complete");
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
