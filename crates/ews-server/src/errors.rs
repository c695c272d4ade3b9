//! Server error types.

use ews_core::CodecError;
use thiserror::Error;

/// Errors returned by [`Hub`](crate::hub::Hub) operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub actor has stopped (shutdown or all handles dropped).
    #[error("hub is closed")]
    Closed,
    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] CodecError),
}

/// Convenience type alias for hub results.
pub type Result<T> = std::result::Result<T, HubError>;
