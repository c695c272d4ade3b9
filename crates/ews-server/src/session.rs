//! Client session lifecycle: one connected subscriber from upgrade through
//! disconnect.
//!
//! Two pumps run per session:
//! - the **write pump** drains the hub-fed outbound queue onto the socket and
//!   sends a keepalive ping whenever the connection has been idle for a ping
//!   period;
//! - the **read pump** consumes inbound frames only to notice liveness, close
//!   frames and errors. Clients never publish application data.
//!
//! Whichever pump ends first triggers teardown. Teardown runs once, here,
//! after the first pump exits: unregister from the hub, give the other pump a
//! write-timeout window to finish, then abort it.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use ews_core::ClientId;
use ews_settings::ServerSettings;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tracing::{debug, info, instrument, trace, warn};

use crate::hub::{Hub, OutboundQueue};

/// Session timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for writing a single frame.
    pub write_timeout: Duration,
    /// Longest the peer may stay silent before the connection is considered
    /// dead.
    pub pong_wait: Duration,
    /// Idle interval after which a keepalive ping is sent.
    pub ping_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for SessionConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            write_timeout: settings.write_timeout(),
            pong_wait: settings.pong_wait(),
            ping_period: settings.ping_period(),
        }
    }
}

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade done, registration with the hub in progress.
    Connecting,
    /// Registered; both pumps running.
    Open,
    /// A pump has ended; teardown in progress.
    Closing,
    /// Removed from the hub, connection released, both pumps gone.
    Closed,
}

/// Why a pump stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PumpExit {
    /// Peer sent a close frame or ended the stream.
    PeerClosed,
    /// Reading from the connection failed.
    ReadError(String),
    /// Nothing arrived within the pong wait.
    ReadTimeout,
    /// The hub closed the outbound queue (unregister, eviction or shutdown).
    QueueClosed,
    /// Writing to the connection failed.
    WriteError(String),
    /// A write did not complete within the write timeout.
    WriteTimeout,
    /// A pump task panicked or was cancelled.
    Aborted,
    /// The hub refused the registration.
    HubClosed,
}

struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    fn advance(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

/// Run one session to completion over an already-upgraded connection.
///
/// Returns the reason the first pump stopped.
#[instrument(skip_all, fields(client_id))]
pub async fn run_session<S, R, E>(
    mut sink: S,
    stream: R,
    hub: Hub,
    config: SessionConfig,
) -> PumpExit
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let mut lifecycle = Lifecycle {
        state: SessionState::Connecting,
    };

    let (client_id, queue) = match hub.register().await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(error = %e, "rejecting connection, hub unavailable");
            let _ = send_with_deadline(&mut sink, Message::Close(None), config.write_timeout).await;
            lifecycle.advance(SessionState::Closed);
            return PumpExit::HubClosed;
        }
    };
    let _ = tracing::Span::current().record("client_id", tracing::field::display(&client_id));
    lifecycle.advance(SessionState::Open);
    let opened = Instant::now();

    let mut writer = tokio::spawn(write_pump(sink, queue, config));
    let mut reader = tokio::spawn(read_pump(stream, config.pong_wait));

    let (joined, writer_first) = tokio::select! {
        res = &mut writer => (res, true),
        res = &mut reader => (res, false),
    };
    let exit = joined.unwrap_or(PumpExit::Aborted);
    lifecycle.advance(SessionState::Closing);
    debug!(
        pump = if writer_first { "write" } else { "read" },
        ?exit,
        "pump ended"
    );

    teardown(&hub, &client_id).await;

    let mut other = if writer_first { reader } else { writer };
    match timeout(config.write_timeout, &mut other).await {
        Ok(Ok(other_exit)) => trace!(?other_exit, "second pump ended"),
        Ok(Err(_)) => trace!("second pump aborted"),
        Err(_) => {
            debug!("second pump still running after grace period, aborting");
            other.abort();
        }
    }

    lifecycle.advance(SessionState::Closed);
    info!(
        client_id = %client_id,
        ?exit,
        connected_secs = opened.elapsed().as_secs(),
        "client disconnected"
    );
    exit
}

/// Leave the hub. A hub that is already gone has nothing left to remove.
async fn teardown(hub: &Hub, client_id: &ClientId) {
    if hub.unregister(client_id.clone()).await.is_err() {
        trace!(client_id = %client_id, "hub already closed during teardown");
    }
}

/// Drain the outbound queue onto the connection, pinging when idle.
pub async fn write_pump<S>(mut sink: S, mut queue: OutboundQueue, config: SessionConfig) -> PumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(frame) = next else {
                    // Hub closed the queue: say goodbye and stop.
                    let _ = send_with_deadline(&mut sink, Message::Close(None), config.write_timeout).await;
                    return PumpExit::QueueClosed;
                };
                let msg = Message::Text(frame.to_string().into());
                if let Err(exit) = send_with_deadline(&mut sink, msg, config.write_timeout).await {
                    return exit;
                }
                ping.reset();
            }
            _ = ping.tick() => {
                if let Err(exit) = send_with_deadline(&mut sink, Message::Ping(vec![].into()), config.write_timeout).await {
                    return exit;
                }
                trace!("sent ping");
            }
        }
    }
}

/// Consume inbound frames until the peer goes away or stays silent too long.
pub async fn read_pump<R, E>(mut stream: R, pong_wait: Duration) -> PumpExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = match timeout(pong_wait, stream.next()).await {
            Ok(next) => next,
            Err(_) => return PumpExit::ReadTimeout,
        };
        match next {
            None | Some(Ok(Message::Close(_))) => return PumpExit::PeerClosed,
            Some(Err(e)) => return PumpExit::ReadError(e.to_string()),
            Some(Ok(Message::Pong(_) | Message::Ping(_))) => trace!("keepalive"),
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "ignoring inbound text frame");
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "ignoring inbound binary frame");
            }
        }
    }
}

async fn send_with_deadline<S>(sink: &mut S, msg: Message, deadline: Duration) -> Result<(), PumpExit>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(deadline, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpExit::WriteError(e.to_string())),
        Err(_) => Err(PumpExit::WriteTimeout),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
