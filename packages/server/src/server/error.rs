//! HTTP mapping of engine errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::common::EngineError;

/// Engine error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            EngineError::Authorization(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::TransientExternal(_)
            | EngineError::Integrity(_)
            | EngineError::Database(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match &self.0 {
            EngineError::Validation(_) => "validation_error",
            EngineError::AuthenticationRequired => "unauthenticated",
            EngineError::Authorization(_) => "forbidden",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Conflict(_) => "already_recorded",
            EngineError::TransientExternal(_)
            | EngineError::Integrity(_)
            | EngineError::Database(_)
            | EngineError::Internal(_) => "internal_error",
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorResponse {
            code: self.error_code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
