//! Broadcast hub: the single owner of live-client membership.
//!
//! The hub runs as one Tokio task that processes [`Command`]s from a bounded
//! inbox strictly in arrival order. It is the only code that inserts into or
//! removes from the membership map, and it holds the only `Sender` of each
//! client's outbound queue, so dropping that sender is how a queue is closed.
//!
//! Fan-out never blocks: each frame is offered to every member with
//! `try_send`. A member whose queue is full is evicted on the spot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use ews_core::{BroadcastEnvelope, ClientId, Frame};
use ews_settings::HubSettings;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{HubError, Result};

/// Receiving half of a client's outbound queue, drained by its write pump.
pub type OutboundQueue = mpsc::Receiver<Frame>;

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members that accepted the frame.
    pub delivered: usize,
    /// Members removed during this fan-out (queue full or already gone).
    pub evicted: usize,
}

enum Command {
    Register {
        reply: oneshot::Sender<(ClientId, OutboundQueue)>,
    },
    Unregister {
        id: ClientId,
    },
    Broadcast {
        frame: Frame,
        reply: oneshot::Sender<BroadcastReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the hub actor.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
    count: Arc<AtomicUsize>,
}

impl Hub {
    /// Spawn the hub actor on the current runtime.
    pub fn spawn(settings: &HubSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.command_buffer.max(1));
        let count = Arc::new(AtomicUsize::new(0));
        let actor = HubActor {
            rx,
            members: HashMap::new(),
            count: Arc::clone(&count),
            queue_capacity: settings.queue_capacity.max(1),
        };
        let handle = tokio::spawn(actor.run());
        (Self { tx, count }, handle)
    }

    /// Add a new member. Returns once the hub has applied the registration,
    /// so any broadcast submitted afterwards reaches the new member.
    pub async fn register(&self) -> Result<(ClientId, OutboundQueue)> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Register { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Remove a member and close its queue. Unknown ids are ignored.
    pub async fn unregister(&self, id: ClientId) -> Result<()> {
        self.send(Command::Unregister { id }).await
    }

    /// Encode `envelope` once and fan it out to every current member.
    pub async fn broadcast(&self, envelope: &BroadcastEnvelope) -> Result<BroadcastReport> {
        let frame = envelope.encode()?;
        let report = self.broadcast_frame(frame).await?;
        debug!(
            event = envelope.event_name(),
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast"
        );
        Ok(report)
    }

    /// Fan out an already-encoded frame.
    pub async fn broadcast_frame(&self, frame: Frame) -> Result<BroadcastReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Broadcast { frame, reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Number of live members, as last published by the actor.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Close every member queue and stop the actor.
    ///
    /// Calling this on an already stopped hub is not an error.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct Member {
    tx: mpsc::Sender<Frame>,
    since: Instant,
}

#[derive(Clone, Copy, Debug)]
enum Removal {
    Unregistered,
    Overflow,
    Disconnected,
    Shutdown,
}

struct HubActor {
    rx: mpsc::Receiver<Command>,
    members: HashMap<ClientId, Member>,
    count: Arc<AtomicUsize>,
    queue_capacity: usize,
}

impl HubActor {
    async fn run(mut self) {
        debug!(queue_capacity = self.queue_capacity, "hub started");
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::Register { reply } => {
                    let (id, queue) = self.register();
                    if reply.send((id.clone(), queue)).is_err() {
                        // Caller went away before seeing its id.
                        self.remove(&id, Removal::Disconnected);
                    }
                }
                Command::Unregister { id } => {
                    self.remove(&id, Removal::Unregistered);
                }
                Command::Broadcast { frame, reply } => {
                    let report = self.fan_out(&frame);
                    let _ = reply.send(report);
                }
                Command::Shutdown { reply } => {
                    self.close_all();
                    let _ = reply.send(());
                    break;
                }
            }
        }
        self.close_all();
        debug!("hub stopped");
    }

    fn register(&mut self) -> (ClientId, OutboundQueue) {
        let id = ClientId::new();
        let (tx, queue) = mpsc::channel(self.queue_capacity);
        let _ = self.members.insert(
            id.clone(),
            Member {
                tx,
                since: Instant::now(),
            },
        );
        self.publish_count();
        info!(client_id = %id, members = self.members.len(), "client registered");
        (id, queue)
    }

    fn fan_out(&mut self, frame: &Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dropped = Vec::new();

        for (id, member) in &self.members {
            match member.tx.try_send(Arc::clone(frame)) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped.push((id.clone(), Removal::Overflow));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dropped.push((id.clone(), Removal::Disconnected));
                }
            }
        }

        report.evicted = dropped.len();
        for (id, reason) in dropped {
            self.remove(&id, reason);
        }
        report
    }

    /// Remove, publish the new count, then close the queue.
    fn remove(&mut self, id: &ClientId, reason: Removal) {
        let Some(member) = self.members.remove(id) else {
            return;
        };
        self.publish_count();
        drop(member.tx);

        let connected_secs = member.since.elapsed().as_secs();
        match reason {
            Removal::Overflow => warn!(
                client_id = %id,
                connected_secs,
                members = self.members.len(),
                "outbound queue full, client evicted"
            ),
            _ => info!(
                client_id = %id,
                ?reason,
                connected_secs,
                members = self.members.len(),
                "client removed"
            ),
        }
    }

    fn close_all(&mut self) {
        if self.members.is_empty() {
            return;
        }
        let ids: Vec<ClientId> = self.members.keys().cloned().collect();
        for id in ids {
            self.remove(&id, Removal::Shutdown);
        }
    }

    fn publish_count(&self) {
        self.count.store(self.members.len(), Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
