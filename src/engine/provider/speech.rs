//! Google Cloud Text-to-Speech client.
//!
//! Voice and pacing are tuned for elderly listeners: Latin American Spanish
//! neural voice, slightly slower than normal speech.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::UpstreamError;
use crate::error::AppError;

pub const TTS_API_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

const LANGUAGE_CODE: &str = "es-US";
const VOICE_NAME: &str = "es-US-Neural2-A";
const SPEAKING_RATE: f32 = 0.9;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection {
    language_code: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
    pitch: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

fn build_body(text: &str) -> SynthesizeBody<'_> {
    SynthesizeBody {
        input: SynthesisInput { text },
        voice: VoiceSelection {
            language_code: LANGUAGE_CODE,
            name: VOICE_NAME,
        },
        audio_config: AudioConfig {
            audio_encoding: "MP3",
            speaking_rate: SPEAKING_RATE,
            pitch: 0.0,
        },
    }
}

/// Text-to-speech backend returning base64-encoded MP3 audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<String, UpstreamError>;
}

/// HTTP client for `text:synthesize`.
pub struct SpeechClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl SpeechClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: TTS_API_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str) -> Result<String, UpstreamError> {
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_body(text))
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Google TTS API error: {}", body);
            return Err(UpstreamError::new(Some(status.as_u16()), "TTS API error").with_body(body));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(UpstreamError::from_transport)?;
        Ok(parsed.audio_content)
    }
}
