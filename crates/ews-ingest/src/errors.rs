//! Ingestion error types.

use ews_core::CodecError;
use ews_server::HubError;
use ews_store::StoreError;
use thiserror::Error;

/// Errors raised while turning broker messages into broadcasts.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload did not match the device schema.
    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),
    /// The reading could not be stored.
    #[error("persist failed: {0}")]
    Persist(#[from] StoreError),
    /// The blocking persistence task panicked or was cancelled.
    #[error("persist task failed: {0}")]
    PersistTask(#[from] tokio::task::JoinError),
    /// The stored reading could not be encoded for broadcast.
    #[error("encode failed: {0}")]
    Encode(CodecError),
    /// The hub has stopped.
    #[error("hub is closed")]
    HubClosed,
    /// The broker address is not usable.
    #[error("invalid broker address {address:?}: {reason}")]
    InvalidBroker {
        /// Address as configured.
        address: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The broker subscription could not be established or was lost for good.
    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<HubError> for IngestError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Closed => Self::HubClosed,
            HubError::Encode(e) => Self::Encode(e),
        }
    }
}

/// Convenience type alias for ingestion results.
pub type Result<T> = std::result::Result<T, IngestError>;
