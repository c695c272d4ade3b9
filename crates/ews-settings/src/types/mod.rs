//! Settings types.
//!
//! All sections deserialize with `#[serde(default)]`, so a settings file only
//! needs to name the values it changes.

mod broker;
mod server;

pub use broker::BrokerSettings;
pub use server::{HubSettings, ServerSettings};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EwsSettings {
    /// HTTP / WebSocket server.
    pub server: ServerSettings,
    /// Broadcast hub sizing.
    pub hub: HubSettings,
    /// MQTT ingestion.
    pub broker: BrokerSettings,
    /// Reading storage.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// SQLite storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file path.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: crate::loader::ews_home().join("ews.db"),
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
