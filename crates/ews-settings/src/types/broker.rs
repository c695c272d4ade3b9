//! MQTT broker settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// MQTT subscription settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Broker address (`tcp://host:port`, `mqtt://host:port`, `host:port`
    /// or `host`). Ingestion is disabled when unset.
    pub url: Option<String>,
    /// MQTT client identifier.
    pub client_id: String,
    /// Topic the station publishes on.
    pub topic: String,
    /// Subscription quality of service (0, 1 or 2).
    pub qos: u8,
    /// MQTT keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// How long to wait for the initial `ConnAck`, in seconds.
    pub connect_timeout_secs: u64,
    /// Delay between reconnect attempts after the link drops, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Consecutive failed reconnects before ingestion gives up.
    pub max_reconnect_attempts: u32,
    /// Station location reported in status broadcasts.
    pub location: String,
    /// Calibration date reported in status broadcasts.
    pub calibration_date: String,
}

impl BrokerSettings {
    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Initial connect deadline.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Reconnect back-off.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: None,
            client_id: "ews-backend".to_string(),
            topic: "sensors/ewsbe".to_string(),
            qos: 0,
            keep_alive_secs: 30,
            connect_timeout_secs: 30,
            reconnect_delay_ms: 2_000,
            max_reconnect_attempts: 30,
            location: String::new(),
            calibration_date: String::new(),
        }
    }
}
