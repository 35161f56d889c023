//! Error type for the web surface.
//!
//! Every variant renders as `{"error": "<generic message>"}`.  The detailed
//! cause goes to the log only.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use blockpreview_assets::AssetError;
use blockpreview_sandbox::SandboxError;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Asset(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Sandbox(SandboxError::Render(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Sandbox(SandboxError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Sandbox(
                SandboxError::SessionClosed
                | SandboxError::HandshakeTimeout { .. }
                | SandboxError::UnexpectedMessage { .. },
            ) => StatusCode::CONFLICT,
        }
    }

    /// Text safe to show to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Asset(e) => e.public_message(),
            Self::Sandbox(SandboxError::Render(_)) => "preview unavailable",
            Self::Sandbox(SandboxError::SessionNotFound { .. }) => "session not found",
            Self::Sandbox(_) => "session closed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
