//! Mapping of manager errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hm_core::ManagerError;
use serde_json::json;

/// A [`ManagerError`] rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(pub ManagerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ManagerError::Validation(_) | ManagerError::Conflict(_) | ManagerError::Exhausted(_) => {
                StatusCode::BAD_REQUEST
            }
            ManagerError::Protected(_) => StatusCode::FORBIDDEN,
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::Tool(_) | ManagerError::Persistence(_) | ManagerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}
