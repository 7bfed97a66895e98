//! Response interpretation and failure classification.
//!
//! Everything a generation can produce funnels into a
//! [`GenerationResult`]: a decoded image on success, a specific
//! human-readable message on every failure path. Nothing in here raises;
//! malformed documents, blocked prompts and transport failures all
//! become results.

use image::RgbaImage;
use tracing::{debug, error, warn};

use crate::codec;
use crate::transport::WireReply;

use super::wire::GenerateContentResponse;

/// Outcome of one generation run.
///
/// `success` is true exactly when `image` is present.
#[derive(Default)]
pub struct GenerationResult {
    pub success: bool,
    /// The generated image; owned by the caller once the completion
    /// callback hands the result over.
    pub image: Option<RgbaImage>,
    /// Text the model returned alongside (or instead of) the image,
    /// newline-joined in its original order.
    pub text: Option<String>,
    /// Raw response body, kept for diagnostics.
    pub raw_response: Option<String>,
    /// Human-readable description of what went wrong.
    pub error_message: Option<String>,
}

impl GenerationResult {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        GenerationResult {
            success: false,
            error_message: Some(message.into()),
            ..GenerationResult::default()
        }
    }
}

impl std::fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationResult")
            .field("success", &self.success)
            .field(
                "image",
                &self.image.as_ref().map(|i| (i.width(), i.height())),
            )
            .field("text", &self.text)
            .field("error_message", &self.error_message)
            .finish()
    }
}

/// Interprets a finished wire exchange into a result.
pub(crate) fn interpret_reply(reply: &WireReply) -> GenerationResult {
    let raw = reply.body_text();

    let mut result = if reply.is_success() {
        debug!(status = reply.status, bytes = reply.body.len(), "interpreting response");
        match serde_json::from_slice::<GenerateContentResponse>(&reply.body) {
            Ok(response) => extract(response),
            Err(e) => GenerationResult::failure(format!("Failed to parse response: {}", e)),
        }
    } else {
        error!(
            status = reply.status,
            error = reply.error.as_deref().unwrap_or(""),
            "generation request failed"
        );
        GenerationResult::failure(classify_failure(reply))
    };

    result.raw_response = Some(raw);
    result
}

/// Builds the error message for a failed exchange, preferring structured
/// detail from the body over the transport's own description.
fn classify_failure(reply: &WireReply) -> String {
    let transport_error = reply.error.as_deref().unwrap_or("unknown transport error");
    let generic = format!("Request failed (HTTP {}): {}", reply.status, transport_error);

    match serde_json::from_slice::<GenerateContentResponse>(&reply.body) {
        Ok(response) => {
            if let Some(error) = response.error.filter(|e| e.is_meaningful()) {
                format!("API Error ({}): {}", error.code, error.message)
            } else if let Some(reason) = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
            {
                format!(
                    "Content blocked: {}. Please modify your prompt or scene.",
                    reason
                )
            } else {
                generic
            }
        }
        Err(_) => format!("{}\n{}", generic, reply.body_text()),
    }
}

/// Runs the extraction algorithm over a decoded response document.
fn extract(response: GenerateContentResponse) -> GenerationResult {
    if let Some(error) = response.error.as_ref().filter(|e| e.is_meaningful()) {
        return GenerationResult::failure(format!(
            "API Error ({}): {}",
            error.code, error.message
        ));
    }

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return GenerationResult::failure(format!("Content blocked: {}", reason));
    }

    if response.candidates.is_empty() {
        return GenerationResult::failure("No candidates in response");
    }

    let candidate = &response.candidates[0];
    let parts = match candidate.content.as_ref() {
        Some(content) if !content.parts.is_empty() => &content.parts,
        _ => return GenerationResult::failure("No content parts in response"),
    };

    let mut image: Option<RgbaImage> = None;
    let mut texts: Vec<&str> = Vec::new();

    for part in parts {
        // A part carrying inline data is consumed as an image candidate;
        // only the first non-thought part that decodes is kept.
        if let Some(data) = part
            .inline_data
            .as_ref()
            .and_then(|inline| inline.data.as_deref())
            .filter(|data| !data.is_empty())
        {
            if part.thought || image.is_some() {
                continue;
            }
            match codec::decode_base64_image(data) {
                Ok(decoded) => image = Some(decoded),
                Err(e) => warn!("failed to decode inline image part: {}", e),
            }
            continue;
        }

        if let Some(text) = part.text.as_deref().filter(|text| !text.is_empty()) {
            texts.push(text);
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    match image {
        Some(image) => GenerationResult {
            success: true,
            image: Some(image),
            text,
            ..GenerationResult::default()
        },
        None => GenerationResult {
            success: false,
            text,
            error_message: Some("No image found in response".to_string()),
            ..GenerationResult::default()
        },
    }
}
