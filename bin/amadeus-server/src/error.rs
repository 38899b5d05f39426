//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the form
//! `{"error": "..."}` with an appropriate status code.
//!
//! Internal errors are logged with full detail and answered generically so
//! store URLs, keys or file paths never reach the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the amadeus-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A credential the route depends on is missing. The message names it
    /// and is shown to the caller.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// A collaborator (vector store, embedder) failed; `details` is
    /// returned alongside `error`.
    #[error("{error}: {details}")]
    Upstream { error: String, details: String },

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match self {
            ServerError::BadRequest(m) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response();
            }
            ServerError::NotConfigured(m) => {
                error!(message = %m, "request rejected: server not configured");
                json!({ "error": m })
            }
            ServerError::Upstream { error, details } => {
                error!(error = %error, details = %details, "upstream failure");
                json!({ "error": error, "details": details })
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                json!({ "error": "internal server error" })
            }
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
