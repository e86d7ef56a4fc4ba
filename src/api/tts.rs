use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::{error_response, AppState, API_KEY_MISSING};
use crate::validation::require_non_empty;

const TTS_NOT_ENABLED: &str = "TTS API not enabled. Enable it at: https://console.cloud.google.com/apis/library/texttospeech.googleapis.com";

/// POST /api/tts: `{ text }` to `{ audioContent }` (base64 MP3).
pub async fn handle_tts(
    AxumState(state): AxumState<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(raw) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(status = rejection.status().as_u16(), "Rejected /api/tts body: {}", rejection.body_text());
            return error_response(rejection.status(), &rejection.body_text());
        }
    };
    let text = raw.get("text").and_then(Value::as_str).unwrap_or_default().trim();
    if require_non_empty("text", text).is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Text is required");
    }

    let Some(speech) = state.speech.as_ref() else {
        tracing::error!("TTS request rejected: speech key missing");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, API_KEY_MISSING);
    };

    match speech.synthesize(text).await {
        Ok(audio_content) => {
            tracing::debug!(chars = text.chars().count(), "Synthesized speech");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "audioContent": audio_content })),
            )
                .into_response()
        }
        Err(e) => match e.status {
            Some(403) => error_response(StatusCode::FORBIDDEN, TTS_NOT_ENABLED),
            Some(code) => {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error_response(status, "TTS API error")
            }
            None => {
                tracing::error!("Error in /api/tts: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        },
    }
}
