//! Serde types for the `generateContent` wire format.
//!
//! The request and response halves are asymmetric on purpose: requests
//! use snake_case keys for inline data (`inline_data`, `mime_type`) while
//! responses come back camelCase (`inlineData`, `mimeType`). Response
//! types default every field so a partially populated or unknown-shaped
//! document still decodes; classification of what is missing happens in
//! [`crate::gemini::response`], not here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<RequestPart>,
}

/// One request part: prompt text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

// ---------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CandidateContent {
    pub parts: Vec<ResponsePart>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<ResponseInlineData>,
    /// Marks interim output the provider considers discardable.
    pub thought: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseInlineData {
    pub mime_type: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SafetyRating {
    pub category: Option<String>,
    pub probability: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: i64,
    pub candidates_token_count: i64,
    pub total_token_count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    pub status: String,
}

impl ApiError {
    /// Whether this error object carries meaningful content.
    ///
    /// The wire format cannot distinguish an absent error from a
    /// present-but-zeroed one, so only a non-zero code or a non-empty
    /// message counts as an actual error.
    pub fn is_meaningful(&self) -> bool {
        self.code != 0 || !self.message.is_empty()
    }
}
