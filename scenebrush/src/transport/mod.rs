//! HTTP transport abstraction for testability.
//!
//! The pipeline never talks to reqwest directly; it hands a
//! [`WireRequest`] to a [`Transport`] and classifies the [`WireReply`]
//! that comes back. This seam allows dependency injection and easier
//! testing: unit tests substitute a mock transport with canned replies
//! and a call counter, so error classification and the no-network-call
//! guarantees are all assertable offline.

mod http;
mod pending;

pub use http::HttpTransport;
pub use pending::PendingExchange;

#[cfg(test)]
pub(crate) use mock::MockTransport;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;

/// Errors raised while setting a transport up.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// HTTP method of a wire request. Only the two verbs the API needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully specified API call, ready for a [`Transport`].
#[derive(Clone, Debug)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    /// Sent as the `x-goog-api-key` header.
    pub api_key: String,
    /// JSON document sent with a `Content-Type: application/json` header;
    /// `None` for bodyless requests.
    pub body: Option<Vec<u8>>,
    /// Transport-level timeout for the whole exchange.
    pub timeout: Duration,
}

/// Outcome of a wire exchange.
///
/// `error` is `None` exactly when the exchange succeeded (a 2xx response
/// was fully read). Protocol failures keep the status code and body;
/// connection-level failures have `status == 0` and an empty body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WireReply {
    /// HTTP status, or 0 if no response was received.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: Vec<u8>,
    /// Transport-level error description, if the exchange failed.
    pub error: Option<String>,
}

impl WireReply {
    /// A successful 2xx reply.
    pub fn ok(status: u16, body: Vec<u8>) -> Self {
        WireReply {
            status,
            body,
            error: None,
        }
    }

    /// A reply for a non-2xx status.
    pub fn http_error(status: u16, reason: &str, body: Vec<u8>) -> Self {
        WireReply {
            status,
            body,
            error: Some(format!("HTTP {} {}", status, reason)),
        }
    }

    /// A reply for a connection-level failure (no HTTP response).
    pub fn unreachable(message: impl Into<String>) -> Self {
        WireReply {
            status: 0,
            body: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Whether the exchange succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The body as (lossy) text, for diagnostics and error bodies.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking HTTP client seam.
///
/// `execute` performs the whole exchange synchronously, publishing
/// byte-level completion through `progress` as it goes. Implementations
/// must not panic; every failure mode is expressed as a [`WireReply`].
pub trait Transport: Send + Sync {
    fn execute(&self, request: &WireRequest, progress: &TransferProgress) -> WireReply;
}

/// Fraction of a wire exchange completed so far, shared between the
/// transport worker and the polling task.
///
/// Stored as `f32` bits in an atomic so no locking is needed across the
/// worker-thread boundary.
#[derive(Debug, Default)]
pub struct TransferProgress {
    bits: AtomicU32,
}

impl TransferProgress {
    /// Publishes a completion fraction, clamped to `[0.0, 1.0]`.
    pub fn set(&self, fraction: f32) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// The most recently published fraction.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}
