//! # ews-ingest
//!
//! Turns broker messages into stored readings and live broadcasts.
//!
//! - [`adapter`]: decode, persist, then broadcast one payload
//! - [`mqtt`]: broker address parsing and the subscription driver

#![deny(unsafe_code)]

pub mod adapter;
pub mod errors;
pub mod mqtt;

pub use adapter::{DropReason, IngestAdapter, IngestOutcome};
pub use errors::{IngestError, Result};
pub use mqtt::{BrokerAddress, MqttConfig, MqttSubscriber};
