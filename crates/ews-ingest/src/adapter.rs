//! Ingestion adapter: decode, persist, broadcast.
//!
//! Every failure here is local to one message. A payload that does not
//! decode is dropped; a reading that does not persist is not broadcast, so
//! the live stream never shows a reading the history lacks.

use std::sync::Arc;

use ews_core::{BroadcastEnvelope, Reading, StatusRecord, StoredReading, decode_reading};
use ews_server::{BroadcastReport, Hub, HubError};
use ews_store::ReadingStore;
use tracing::{debug, error, info, warn};

use crate::errors::{IngestError, Result};

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted under `id` and handed to the hub.
    Broadcast {
        /// Storage-assigned id.
        id: i64,
        /// Fan-out result.
        report: BroadcastReport,
    },
    /// Not broadcast.
    Dropped(DropReason),
}

/// Why a message was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Payload did not match the device schema.
    Decode,
    /// Storage rejected the reading.
    Persist,
    /// The stored reading could not be encoded.
    Encode,
    /// The hub has stopped.
    HubClosed,
}

impl DropReason {
    /// Attach this reason to the error that caused it.
    fn with(self, error: impl Into<IngestError>) -> Dropped {
        Dropped {
            reason: self,
            error: error.into(),
        }
    }

    /// A hub refusal is either a closed hub or an unencodable envelope.
    fn from_hub(error: HubError) -> Dropped {
        match error {
            HubError::Closed => Self::HubClosed.with(error),
            HubError::Encode(_) => Self::Encode.with(error),
        }
    }
}

/// A dropped message and the step that dropped it.
#[derive(Debug)]
struct Dropped {
    reason: DropReason,
    error: IngestError,
}

/// Bridges broker payloads to storage and the hub.
#[derive(Clone)]
pub struct IngestAdapter {
    store: Arc<dyn ReadingStore>,
    hub: Hub,
}

impl IngestAdapter {
    /// Create an adapter over a store and a running hub.
    pub fn new(store: Arc<dyn ReadingStore>, hub: Hub) -> Self {
        Self { store, hub }
    }

    /// Process one raw broker payload.
    pub async fn handle_payload(&self, payload: &[u8]) -> IngestOutcome {
        match self.ingest(payload).await {
            Ok((id, report)) => IngestOutcome::Broadcast { id, report },
            Err(Dropped { reason, error: err }) => {
                match reason {
                    DropReason::Decode => {
                        warn!(error = %err, bytes = payload.len(), "dropping malformed payload");
                    }
                    DropReason::HubClosed => debug!("hub closed, reading not broadcast"),
                    DropReason::Persist | DropReason::Encode => {
                        error!(error = %err, "reading not broadcast");
                    }
                }
                IngestOutcome::Dropped(reason)
            }
        }
    }

    async fn ingest(&self, payload: &[u8]) -> std::result::Result<(i64, BroadcastReport), Dropped> {
        let reading = decode_reading(payload).map_err(|e| DropReason::Decode.with(e))?;
        let stored = self
            .persist(reading)
            .await
            .map_err(|e| DropReason::Persist.with(e))?;
        let (id, temperature, humidity) = (
            stored.id,
            stored.reading.temperature,
            stored.reading.humidity,
        );
        let report = self
            .hub
            .broadcast(&BroadcastEnvelope::SensorUpdate(stored))
            .await
            .map_err(DropReason::from_hub)?;
        info!(
            id,
            temperature,
            humidity,
            delivered = report.delivered,
            evicted = report.evicted,
            "reading stored and broadcast"
        );
        Ok((id, report))
    }

    /// Store on the blocking pool; `SQLite` calls are synchronous.
    async fn persist(&self, reading: Reading) -> Result<StoredReading> {
        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || store.persist(&reading)).await??;
        Ok(stored)
    }

    /// Broadcast a device status record.
    pub async fn broadcast_status(&self, record: StatusRecord) -> Result<BroadcastReport> {
        Ok(self
            .hub
            .broadcast(&BroadcastEnvelope::SensorStatus(record))
            .await?)
    }
}
