//! Error types for frame encoding and decoding.

use thiserror::Error;

/// Errors produced while turning frames into events and back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a JSON object matching any known event.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A binary frame arrived; the broker only speaks text frames.
    #[error("binary frames are not supported")]
    BinaryFrame,
}
