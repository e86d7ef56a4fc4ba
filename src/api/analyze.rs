use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State as AxumState},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::Instrument;

use super::{error_response, AppState, API_KEY_MISSING};
use crate::engine::classifier::{classify_app_error, FailureClass};
use crate::error::AppError;
use crate::validation::validate_analysis_request;

/// POST /api/analyze: run one assistant turn over the supplied transcript.
pub async fn handle_analyze(
    AxumState(state): AxumState<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("analyze", %request_id);
    analyze(state, payload).instrument(span).await
}

async fn analyze(state: Arc<AppState>, payload: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(raw) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(status = rejection.status().as_u16(), "Rejected /api/analyze body: {}", rejection.body_text());
            return error_response(rejection.status(), &rejection.body_text());
        }
    };

    let request = match validate_analysis_request(&raw) {
        Ok(req) => req,
        Err(AppError::Validation(msg)) => return error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let Some(orchestrator) = state.orchestrator.as_ref() else {
        tracing::error!("Analyze request rejected: model key missing");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, API_KEY_MISSING);
    };

    match orchestrator.handle_turn(&request).await {
        Ok(turn) => {
            tracing::info!(
                needs_image = turn.needs_image,
                is_solution = turn.is_solution,
                icons = turn.icons.len(),
                generated_image = turn.generated_image.is_some(),
                "Turn completed"
            );
            (StatusCode::OK, Json(turn)).into_response()
        }
        Err(AppError::Validation(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => failure_response(&e),
    }
}

/// Map a failed turn to the client-facing failure body.
pub(crate) fn failure_response(err: &AppError) -> Response {
    match classify_app_error(err) {
        FailureClass::RateLimit { retry_after_secs } => {
            tracing::warn!(retry_after_secs, "Upstream rate limited: {}", err);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(serde_json::json!({
                    "error": "rate_limit",
                    "retryAfter": retry_after_secs,
                })),
            )
                .into_response()
        }
        FailureClass::General => {
            tracing::error!(kind = err.kind(), "Error in /api/analyze: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "general")
        }
    }
}
