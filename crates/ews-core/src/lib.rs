//! # ews-core
//!
//! Shared domain types for the weather station backend.
//!
//! - [`Reading`] / [`StoredReading`]: one canonical telemetry sample, before
//!   and after persistence
//! - [`DevicePayload`]: the microcontroller's wire vocabulary and its mapping
//!   onto the canonical schema
//! - [`StatusRecord`]: device status metadata
//! - [`BroadcastEnvelope`]: the tagged frame pushed to WebSocket subscribers
//! - [`ClientId`]: opaque subscriber identity

#![deny(unsafe_code)]

pub mod device;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod reading;
pub mod status;

pub use device::{DevicePayload, decode_reading};
pub use envelope::{BroadcastEnvelope, Frame};
pub use errors::CodecError;
pub use ids::ClientId;
pub use reading::{Reading, StoredReading};
pub use status::{DeviceStatus, StatusRecord};
