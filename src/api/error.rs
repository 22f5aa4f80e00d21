use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::dto::ErrorResponse;
use crate::orchestrator::OrchestratorError;

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] OrchestratorError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::Core(err) => match err {
                OrchestratorError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
                OrchestratorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                OrchestratorError::StoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
                OrchestratorError::ContextUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "context_unavailable")
                }
                OrchestratorError::Completion(e) if e.is_timeout() => {
                    (StatusCode::GATEWAY_TIMEOUT, "completion_timeout")
                }
                OrchestratorError::Completion(_) => (StatusCode::BAD_GATEWAY, "completion"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();

        if status.is_server_error() {
            tracing::error!("{} error: {}", kind, self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            kind: kind.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
