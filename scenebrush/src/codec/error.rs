//! Error types for image encode/decode operations.

use thiserror::Error;

/// Errors that can occur while encoding or decoding image payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    EncodeFailed(String),

    /// The byte stream is not a decodable image.
    #[error("Image decoding failed: {0}")]
    DecodeFailed(String),

    /// The payload is not valid base64.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// The pixel source could not produce a readable RGBA copy.
    #[error("Unreadable pixel source: {0}")]
    UnreadableSource(String),
}
