pub mod gemini;
pub mod speech;

use async_trait::async_trait;
use serde::Serialize;

use super::types::ImagePayload;

// =============================================================================
// UpstreamError: normalized failure record from any upstream HTTP API
// =============================================================================

/// A failure reported by (or on the way to) an upstream API.
///
/// Upstream error shapes are not under our control, so this keeps the three
/// things the classifier looks at: an optional HTTP status, a human-readable
/// message, and the raw response body when one arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", display_upstream(.status, .message))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<String>,
}

fn display_upstream(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("[{}] {}", code, message),
        None => message.to_string(),
    }
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Transport-level failure (DNS, refused connection, timeout, decode).
    /// The URL is stripped so the request key never ends up in logs.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            body: None,
        }
    }

    /// JSON serialization of the whole record, as inspected by the classifier.
    pub fn serialized(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// =============================================================================
// Multimodal request / response
// =============================================================================

/// One piece of model input.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(image: &ImagePayload) -> Self {
        Part::InlineImage {
            mime_type: image.mime_type().to_string(),
            data: image.base64_data().to_string(),
        }
    }
}

/// Output modalities a generation request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

/// A single-shot generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<Part>,
    /// Empty means the provider default (text only).
    pub response_modalities: Vec<Modality>,
}

/// Parts of the first candidate of a generation response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub parts: Vec<Part>,
}

impl GenerateResponse {
    /// All text parts concatenated in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// First inline image part, as a browser-ready payload.
    pub fn first_image(&self) -> Option<ImagePayload> {
        self.parts.iter().find_map(|p| match p {
            Part::InlineImage { mime_type, data } => Some(ImagePayload::from_inline(mime_type, data)),
            _ => None,
        })
    }
}

// =============================================================================
// LanguageModel trait
// =============================================================================

/// Abstraction over a generation-capable model endpoint.
///
/// Single request/response, no streaming. Errors are returned untouched so the
/// caller decides how to classify them.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier for logs.
    fn model_name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, UpstreamError>;
}
