use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::classifier::DEFAULT_RETRY_AFTER_SECS;
use crate::engine::types::{AnalysisRequest, AssistantTurn, ErrorState};
use crate::error::AppError;

/// Delivers one turn to the backend and maps every failure to an [`ErrorState`].
#[async_trait]
pub trait TurnTransport: Send + Sync {
    async fn send_turn(&self, request: &AnalysisRequest) -> Result<AssistantTurn, ErrorState>;
}

/// Fetches synthesized speech (base64 MP3) for a piece of text.
#[async_trait]
pub trait CloudSpeech: Send + Sync {
    async fn fetch_audio(&self, text: &str) -> Result<String, ErrorState>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureBody {
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioBody {
    audio_content: String,
}

/// Map a non-success HTTP status (and its body, if any) to the client error state.
pub fn error_state_for_status(status: u16, body: &str) -> ErrorState {
    if status == 429 {
        let retry = serde_json::from_str::<FailureBody>(body)
            .ok()
            .and_then(|b| b.retry_after)
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s.ceil() as u64)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        ErrorState::rate_limit(retry)
    } else {
        ErrorState::general()
    }
}

/// reqwest-backed transport for a running backend.
pub struct HttpTurnTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTurnTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl TurnTransport for HttpTurnTransport {
    async fn send_turn(&self, request: &AnalysisRequest) -> Result<AssistantTurn, ErrorState> {
        let response = self
            .http
            .post(self.url("/api/analyze"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Turn request failed: {}", e.without_url());
                ErrorState::connection()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Turn rejected: {}", body);
            return Err(error_state_for_status(status.as_u16(), &body));
        }

        response.json::<AssistantTurn>().await.map_err(|e| {
            tracing::warn!("Turn response unreadable: {}", e.without_url());
            ErrorState::connection()
        })
    }
}

#[async_trait]
impl CloudSpeech for HttpTurnTransport {
    async fn fetch_audio(&self, text: &str) -> Result<String, ErrorState> {
        let response = self
            .http
            .post(self.url("/api/tts"))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|_| ErrorState::connection())?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_state_for_status(status.as_u16(), ""));
        }
        let body: AudioBody = response.json().await.map_err(|_| ErrorState::general())?;
        Ok(body.audio_content)
    }
}
