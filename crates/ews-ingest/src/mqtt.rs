//! MQTT subscription driver.
//!
//! Owns the rumqttc event loop. Startup waits for `ConnAck` and a granted
//! `SubAck` before handing the loop to a background task; after that the
//! client reconnects on its own and the subscription is re-issued on every
//! new `ConnAck`. Publishes are processed inline, in arrival order.

use std::time::Duration;

use chrono::Utc;
use ews_core::{DeviceStatus, StatusRecord};
use ews_settings::BrokerSettings;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapter::IngestAdapter;
use crate::errors::{IngestError, Result};

const DEFAULT_PORT: u16 = 1883;
const REQUEST_CAPACITY: usize = 64;

// ─── Broker address ─────────────────────────────────────────────────────────

/// Host and port of an MQTT broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Hostname or IP literal (IPv6 without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl BrokerAddress {
    /// Parse `tcp://host:port`, `mqtt://host:port`, `host:port` or `host`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| IngestError::InvalidBroker {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let rest = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "tcp" && scheme != "mqtt" {
                    return Err(invalid("unsupported scheme"));
                }
                rest
            }
            None => trimmed,
        };
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = match after {
                "" => None,
                p => Some(p.strip_prefix(':').ok_or_else(|| invalid("malformed port"))?),
            };
            (host, port)
        } else if authority.matches(':').count() > 1 {
            (authority, None)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = match port {
            None => DEFAULT_PORT,
            Some(p) => match p.parse::<u16>() {
                Ok(0) | Err(_) => return Err(invalid("malformed port")),
                Ok(port) => port,
            },
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Map a numeric QoS level onto rumqttc's enum.
pub fn qos_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

// ─── Config ─────────────────────────────────────────────────────────────────

/// Resolved subscription parameters.
#[derive(Clone, Debug)]
pub struct MqttConfig {
    /// Broker to connect to.
    pub address: BrokerAddress,
    /// MQTT client identifier.
    pub client_id: String,
    /// Topic to subscribe to; also the station's `sensorId`.
    pub topic: String,
    /// Subscription QoS.
    pub qos: QoS,
    /// Keep-alive interval (at least one second).
    pub keep_alive: Duration,
    /// Deadline for `ConnAck` plus `SubAck` at startup.
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Installation location for status records.
    pub location: String,
    /// Calibration date for status records.
    pub calibration_date: String,
}

impl MqttConfig {
    /// Resolve broker settings. `Ok(None)` means ingestion is disabled.
    pub fn from_settings(settings: &BrokerSettings) -> Result<Option<Self>> {
        let Some(url) = settings.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let address = BrokerAddress::parse(url)?;
        let qos = qos_level(settings.qos).ok_or_else(|| {
            IngestError::Subscription(format!("unsupported QoS level {}", settings.qos))
        })?;
        Ok(Some(Self {
            address,
            client_id: settings.client_id.clone(),
            topic: settings.topic.clone(),
            qos,
            keep_alive: settings.keep_alive().max(Duration::from_secs(1)),
            connect_timeout: settings.connect_timeout(),
            reconnect_delay: settings.reconnect_delay(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            location: settings.location.clone(),
            calibration_date: settings.calibration_date.clone(),
        }))
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(self.client_id.clone(), self.address.host.clone(), self.address.port);
        let _ = options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true);
        options
    }

    fn status(&self, status: DeviceStatus) -> StatusRecord {
        StatusRecord {
            sensor_id: self.topic.clone(),
            location: self.location.clone(),
            calibration_date: self.calibration_date.clone(),
            status,
            last_update: Utc::now(),
        }
    }
}

// ─── Subscriber ─────────────────────────────────────────────────────────────

/// Drives one broker subscription into an [`IngestAdapter`].
pub struct MqttSubscriber {
    config: MqttConfig,
    adapter: IngestAdapter,
}

impl MqttSubscriber {
    /// Create a subscriber; nothing connects until [`start`](Self::start).
    pub fn new(config: MqttConfig, adapter: IngestAdapter) -> Self {
        Self { config, adapter }
    }

    /// Connect and subscribe, then process messages in the background.
    ///
    /// Returns once the subscription is granted. The task ends with `Ok`
    /// when `cancel` fires, or with [`IngestError::Subscription`] after too
    /// many consecutive connection failures.
    #[instrument(skip_all, fields(broker = %self.config.address, topic = %self.config.topic))]
    pub async fn start(self, cancel: CancellationToken) -> Result<JoinHandle<Result<()>>> {
        let (client, mut eventloop) = AsyncClient::new(self.config.options(), REQUEST_CAPACITY);
        let deadline = Instant::now() + self.config.connect_timeout;

        match timeout_at(deadline, self.establish(&client, &mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(IngestError::Subscription(format!(
                    "no subscription within {:?}",
                    self.config.connect_timeout
                )));
            }
        }
        info!("subscribed to broker");
        self.announce(DeviceStatus::Online).await;

        Ok(tokio::spawn(async move {
            self.run(client, eventloop, cancel).await
        }))
    }

    /// Poll until the first subscription is granted.
    async fn establish(&self, client: &AsyncClient, eventloop: &mut EventLoop) -> Result<()> {
        loop {
            let event = eventloop
                .poll()
                .await
                .map_err(|e| IngestError::Subscription(format!("connect failed: {e}")))?;
            match event {
                Event::Incoming(Packet::ConnAck(_)) => self.subscribe(client)?,
                Event::Incoming(Packet::SubAck(ack)) => return granted(&ack.return_codes),
                Event::Incoming(Packet::Publish(publish)) => {
                    let _ = self.adapter.handle_payload(&publish.payload).await;
                }
                _ => {}
            }
        }
    }

    async fn run(
        self,
        client: AsyncClient,
        mut eventloop: EventLoop,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut failures: u32 = 0;
        loop {
            let polled = tokio::select! {
                () = cancel.cancelled() => break,
                polled = eventloop.poll() => polled,
            };

            match polled {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let _ = self.adapter.handle_payload(&publish.payload).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(after_failures = failures, "reconnected to broker");
                    failures = 0;
                    self.subscribe(&client)?;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => match granted(&ack.return_codes) {
                    Ok(()) => self.announce(DeviceStatus::Online).await,
                    Err(e) => return self.give_up(e).await,
                },
                Ok(_) => {}
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        warn!(error = %e, "broker connection lost");
                        self.announce(DeviceStatus::Offline).await;
                    } else {
                        debug!(error = %e, failures, "reconnect attempt failed");
                    }
                    if failures > self.config.max_reconnect_attempts {
                        return self
                            .give_up(IngestError::Subscription(format!(
                                "gave up after {failures} consecutive failures: {e}"
                            )))
                            .await;
                    }
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }

        debug!("ingestion cancelled");
        let _ = client.try_disconnect();
        Ok(())
    }

    fn subscribe(&self, client: &AsyncClient) -> Result<()> {
        client
            .try_subscribe(self.config.topic.clone(), self.config.qos)
            .map_err(|e| IngestError::Subscription(format!("subscribe request failed: {e}")))
    }

    async fn give_up(&self, err: IngestError) -> Result<()> {
        error!(error = %err, "ingestion stopped");
        self.announce(DeviceStatus::Error).await;
        Err(err)
    }

    async fn announce(&self, status: DeviceStatus) {
        if let Err(e) = self.adapter.broadcast_status(self.config.status(status)).await {
            debug!(error = %e, ?status, "status not broadcast");
        }
    }
}

fn granted(codes: &[SubscribeReasonCode]) -> Result<()> {
    if codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(IngestError::Subscription("broker rejected subscription".into()));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
