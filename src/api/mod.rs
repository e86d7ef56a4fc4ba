pub mod analyze;
pub mod tts;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::engine::image_synth::ImageSynthesizer;
use crate::engine::orchestrator::ConversationOrchestrator;
use crate::engine::provider::gemini::GeminiClient;
use crate::engine::provider::speech::{SpeechClient, SpeechSynthesizer};
use crate::error::AppError;

pub const API_KEY_MISSING: &str = "API key not configured";

/// Request body cap. Camera photos arrive base64-encoded inside the JSON body.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for the HTTP server. A `None` service means its credential
/// was not configured.
#[derive(Clone, Default)]
pub struct AppState {
    pub orchestrator: Option<Arc<ConversationOrchestrator>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let orchestrator = match config.gemini_api_key.as_deref() {
            Some(key) => {
                let chat = GeminiClient::new(key, &config.chat_model, config.upstream_timeout)?;
                let painter = GeminiClient::new(key, &config.image_model, config.upstream_timeout)?;
                let orchestrator = ConversationOrchestrator::new(Arc::new(chat))
                    .with_synthesizer(ImageSynthesizer::new(Arc::new(painter)));
                Some(Arc::new(orchestrator))
            }
            None => {
                tracing::error!("GEMINI_API_KEY is not set; /api/analyze will reject requests");
                None
            }
        };

        let speech = match config.speech_api_key.as_deref() {
            Some(key) => {
                let client: Arc<dyn SpeechSynthesizer> =
                    Arc::new(SpeechClient::new(key, config.upstream_timeout)?);
                Some(client)
            }
            None => {
                tracing::warn!("No speech API key; /api/tts will reject requests");
                None
            }
        };

        Ok(Self { orchestrator, speech })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze::handle_analyze))
        .route("/api/tts", post(tts::handle_tts))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the API until `shutdown_rx` changes.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("API server shutting down");
        })
        .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "nieto-tech" }))
}

/// `{ "error": message }` with the given status.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::provider::{GenerateRequest, GenerateResponse, LanguageModel, Part, UpstreamError};
    use base64::Engine as _;

    struct PhotoModel;

    #[async_trait::async_trait]
    impl LanguageModel for PhotoModel {
        fn model_name(&self) -> &str {
            "photo"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, UpstreamError> {
            Ok(GenerateResponse {
                parts: vec![Part::text(r#"{"reply": "Veo la foto"}"#)],
            })
        }
    }

    /// Serve `router(state)` on an ephemeral port and return its base URL.
    async fn spawn_router(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{addr}")
    }

    fn photo_state() -> AppState {
        AppState {
            orchestrator: Some(Arc::new(ConversationOrchestrator::new(Arc::new(PhotoModel)))),
            speech: None,
        }
    }

    #[tokio::test]
    async fn test_router_accepts_large_photo_body() {
        let base = spawn_router(photo_state()).await;
        let photo = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 1_800_000]);
        let body = serde_json::json!({
            "message": "Mire la pantalla",
            "image": format!("data:image/jpeg;base64,{photo}"),
            "conversationHistory": [],
        });
        let raw = serde_json::to_vec(&body).unwrap();
        assert!(raw.len() > 2 * 1024 * 1024);

        let response = reqwest::Client::new()
            .post(format!("{base}/api/analyze"))
            .header("content-type", "application/json")
            .body(raw)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let turn: serde_json::Value = response.json().await.unwrap();
        assert_eq!(turn["reply"], "Veo la foto");
    }

    #[tokio::test]
    async fn test_router_keeps_rejection_status() {
        let base = spawn_router(photo_state()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/analyze"))
            .header("content-type", "text/plain")
            .body("hola")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 415);

        let response = client
            .post(format!("{base}/api/analyze"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_health_body() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "nieto-tech");
    }

    #[test]
    fn test_state_without_keys_has_no_services() {
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::from_config(&config).unwrap();
        assert!(state.orchestrator.is_none());
        assert!(state.speech.is_none());
    }

    #[test]
    fn test_state_with_key_builds_services() {
        let config = Config::from_lookup(|keys| {
            keys.contains(&"GEMINI_API_KEY").then(|| "test-key".to_string())
        })
        .unwrap();
        let state = AppState::from_config(&config).unwrap();
        assert!(state.orchestrator.is_some());
        assert!(state.speech.is_some());
    }
}
