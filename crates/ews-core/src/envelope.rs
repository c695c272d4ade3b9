//! Broadcast envelope and its wire codec.
//!
//! Every frame pushed to a subscriber is `{"event": <name>, "data": <payload>}`.
//! The set of events is closed: adding one means adding a variant here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::reading::StoredReading;
use crate::status::StatusRecord;

/// Serialized broadcast frame, shared read-only across every recipient queue.
pub type Frame = Arc<str>;

/// Event name for reading updates.
pub const SENSOR_UPDATE: &str = "sensor:update";
/// Event name for device status updates.
pub const SENSOR_STATUS: &str = "sensor:status";

/// Tagged broadcast payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum BroadcastEnvelope {
    /// A freshly persisted reading.
    #[serde(rename = "sensor:update")]
    SensorUpdate(StoredReading),
    /// A device status change.
    #[serde(rename = "sensor:status")]
    SensorStatus(StatusRecord),
}

impl BroadcastEnvelope {
    /// Wire event name of this envelope.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SensorUpdate(_) => SENSOR_UPDATE,
            Self::SensorStatus(_) => SENSOR_STATUS,
        }
    }

    /// Serialize once into a shareable frame.
    pub fn encode(&self) -> Result<Frame, CodecError> {
        let json = serde_json::to_string(self)?;
        Ok(Arc::from(json))
    }
}
