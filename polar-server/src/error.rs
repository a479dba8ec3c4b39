use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use polar_engine::{PolarError, StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP API. Each maps to one status code and a `{ "error": .. }`
/// body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PolarError> for ApiError {
    fn from(e: PolarError) -> Self {
        match &e {
            PolarError::LookupMiss(_) => Self::NotFound(e.to_string()),
            PolarError::Import { .. } | PolarError::InvalidConfig(_) => Self::BadRequest(e.to_string()),
            _ => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("API error: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
