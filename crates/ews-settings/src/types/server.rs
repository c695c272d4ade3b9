//! Server and hub settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP / WebSocket server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Deadline for a single outbound frame write, in seconds.
    pub write_timeout_secs: u64,
    /// How long a connection may stay silent before it is considered dead, in seconds.
    pub pong_wait_secs: u64,
    /// How long to wait for sessions to drain on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl ServerSettings {
    /// Outbound frame write deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Inbound silence deadline.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Keepalive ping period: nine tenths of the pong wait, so a ping always
    /// lands before the peer's deadline expires.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    /// Shutdown drain window.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_message_size: 512,
            write_timeout_secs: 10,
            pong_wait_secs: 60,
            shutdown_grace_secs: 10,
        }
    }
}

/// Broadcast hub sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Per-client outbound queue capacity. A client whose queue is full when
    /// a broadcast arrives is evicted.
    pub queue_capacity: usize,
    /// Capacity of the hub's command inbox.
    pub command_buffer: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            command_buffer: 1024,
        }
    }
}
