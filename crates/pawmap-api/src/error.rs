use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pawmap_core::models::ValidationError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Rejected by store: {0}")]
    ValidationRejected(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationRejected(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(error) => error.code(),
            Self::BadRequest(_) => "bad-request",
            Self::StoreUnavailable(_) => "store-unavailable",
            Self::ValidationRejected(_) => "validation-rejected",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<pawmap_core::Error> for AppError {
    fn from(error: pawmap_core::Error) -> Self {
        match error {
            pawmap_core::Error::Validation(error) => Self::Validation(error),
            pawmap_core::Error::InvalidInput(message) => Self::BadRequest(message),
            pawmap_core::Error::StoreUnavailable(message) => Self::StoreUnavailable(message),
            pawmap_core::Error::ValidationRejected(message) => Self::ValidationRejected(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
