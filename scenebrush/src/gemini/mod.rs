//! Gemini image generation pipeline.
//!
//! Two task bodies for the [`crate::runner`]: [`GenerateTask`] performs a
//! full `generateContent` exchange (request assembly, suspendable POST
//! with progress, response extraction, failure classification) and
//! [`ValidateKeyTask`] probes the models endpoint to check a key.
//!
//! ```text
//! GenerationRequest ──► GenerateTask ──► Transport (worker thread)
//!        │                  │ resume per tick        │
//!        │                  │◄── poll reply/progress ┘
//!        │                  ▼
//!        │            GenerationResult ──► completion callback
//!        └── ProgressBus ◄── staged fractions (0.1 … 1.0)
//! ```

mod generate;
mod request;
mod response;
mod validate;
pub(crate) mod wire;

pub use generate::{CompletionCallback, GenerateTask};
pub use request::{encode_request, GenerationRequest, RequestBuildError};
pub use response::GenerationResult;
pub use validate::{ValidateKeyTask, ValidationCallback};

use std::time::Duration;

use crate::config::{Model, BASE_URL};

/// Transport timeout for a generation exchange. Image generation can
/// take minutes.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport timeout for the key validation probe.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

/// URL of the `generateContent` endpoint for a model.
pub fn generate_url(model: Model) -> String {
    format!("{}/models/{}:generateContent", BASE_URL, model.id())
}

/// URL of the models-listing endpoint used for key validation.
pub fn models_url() -> String {
    format!("{}/models", BASE_URL)
}
