use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, GenerateResponse, LanguageModel, Modality, Part, UpstreamError};
use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: Vec<&'a str>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ============================================================================
// Body mapping
// ============================================================================

fn to_wire_part(part: &Part) -> GeminiPart {
    match part {
        Part::Text(text) => GeminiPart {
            text: Some(text.clone()),
            inline_data: None,
        },
        Part::InlineImage { mime_type, data } => GeminiPart {
            text: None,
            inline_data: Some(InlineData {
                mime_type: Some(mime_type.clone()),
                data: data.clone(),
            }),
        },
    }
}

fn build_body(request: &GenerateRequest) -> GeminiBody<'static> {
    let system_instruction = request.system_instruction.as_ref().map(|s| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(s.clone()),
            inline_data: None,
        }],
    });

    let generation_config = if request.response_modalities.is_empty() {
        None
    } else {
        Some(GenerationConfig {
            response_modalities: request
                .response_modalities
                .iter()
                .map(|m| match m {
                    Modality::Text => "TEXT",
                    Modality::Image => "IMAGE",
                })
                .collect(),
        })
    };

    GeminiBody {
        system_instruction,
        contents: vec![GeminiContent {
            role: Some("user".into()),
            parts: request.parts.iter().map(to_wire_part).collect(),
        }],
        generation_config,
    }
}

/// Keep only the parts of the first candidate, in order.
fn parse_response(response: GeminiResponse) -> GenerateResponse {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| {
                    if let Some(inline) = p.inline_data {
                        Some(Part::InlineImage {
                            mime_type: inline.mime_type.unwrap_or_else(|| "image/png".into()),
                            data: inline.data,
                        })
                    } else {
                        p.text.map(Part::Text)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    GenerateResponse { parts }
}

/// Build an [`UpstreamError`] from a non-success HTTP response.
///
/// Google's error envelope carries both a numeric code and a status token such as
/// `RESOURCE_EXHAUSTED`; both end up in the message so string matching sees them.
fn parse_error(status: u16, body: &str) -> UpstreamError {
    let message = match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => {
            let err = envelope.error;
            let code = err.code.unwrap_or(status);
            match (err.status, err.message) {
                (Some(s), Some(m)) => format!("{} {}: {}", code, s, m),
                (None, Some(m)) => format!("{}: {}", code, m),
                (Some(s), None) => format!("{} {}", code, s),
                (None, None) => format!("Gemini API error {}", code),
            }
        }
        Err(_) => format!("Gemini API error {}", status),
    };
    UpstreamError::new(Some(status), message).with_body(body)
}

// ============================================================================
// GeminiClient
// ============================================================================

/// `generateContent` client for one Gemini model.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for `model`. The underlying `reqwest::Client` gets `timeout`.
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Point the client at another host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, UpstreamError> {
        let body = build_body(&request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = parse_error(status.as_u16(), &text);
            tracing::warn!(model = %self.model, status = status.as_u16(), "Gemini request failed: {}", err.message);
            return Err(err);
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;

        Ok(parse_response(parsed))
    }
}
