//! Codec error types.

use thiserror::Error;

/// Errors raised while decoding device payloads or encoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid JSON for the expected schema.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed as JSON but is not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// The device timestamp cannot be represented as a UTC instant.
    #[error("timestamp out of range: {0} ms")]
    TimestampOutOfRange(i64),
}
