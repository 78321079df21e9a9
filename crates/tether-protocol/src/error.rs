//! Protocol error types

use thiserror::Error;

/// Errors produced while encoding or decoding protocol frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame body was not valid JSON or did not match the envelope shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload for a known message kind did not match its expected shape
    #[error("Invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
