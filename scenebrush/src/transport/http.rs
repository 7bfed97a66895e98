//! Real HTTP transport implementation using reqwest.

use std::io::Read;
use std::time::Duration;

use tracing::debug;

use super::{Method, Transport, TransferProgress, TransportError, WireReply, WireRequest};

/// Read chunk size for streaming response bodies.
const READ_CHUNK: usize = 8 * 1024;

/// Blocking reqwest-backed [`Transport`].
///
/// Timeouts are taken per request from [`WireRequest::timeout`], so the
/// same client serves both the multi-minute generation call and the
/// short validation probe. The response body is streamed in chunks so
/// byte-level progress can be published while a large payload downloads.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Creates a transport with default client configuration.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &WireRequest, progress: &TransferProgress) -> WireReply {
        progress.set(0.0);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder
            .header("x-goog-api-key", &request.api_key)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let mut response = match builder.send() {
            Ok(response) => response,
            Err(e) => {
                progress.set(1.0);
                return WireReply::unreachable(e.to_string());
            }
        };

        // Headers are in: the request body is fully uploaded and the
        // download half begins.
        progress.set(0.5);

        let status = response.status();
        let total = response.content_length();
        let mut body = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match response.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    body.extend_from_slice(&chunk[..n]);
                    if let Some(total) = total.filter(|t| *t > 0) {
                        let fraction = body.len() as f32 / total as f32;
                        progress.set(0.5 + 0.5 * fraction);
                    }
                }
                Err(e) => {
                    progress.set(1.0);
                    return WireReply::unreachable(format!("Failed to read response: {}", e));
                }
            }
        }
        progress.set(1.0);

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            url = %request.url,
            "wire exchange finished"
        );

        if status.is_success() {
            WireReply::ok(status.as_u16(), body)
        } else {
            WireReply::http_error(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
                body,
            )
        }
    }
}
