//! REST surface for authors and readers.
//!
//! Reads are public. Mutations require `Authorization: Bearer <token>`
//! resolved against `gateway.auth.authors`, unless auth mode is `none`.
//! Every mutation commits to the store first and only then tells the live
//! dispatcher; the response never depends on the broadcast.

pub mod comments;
pub mod health;
pub mod notifications;
pub mod posts;

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use miniblog_content::ContentError;
use miniblog_core::config::AuthMode;
use serde::Serialize;
use tracing::error;

use crate::app::AppState;

/// Author name used for every request when auth mode is `none`.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
}

/// Map a store error onto an HTTP status.
pub fn content_failure(e: ContentError) -> ApiFailure {
    match e {
        ContentError::PostNotFound { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        ContentError::Invalid(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        ContentError::Database(ref db) => {
            error!(error = %db, "content store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "database error")
        }
    }
}

/// Resolve the calling author, or reject with 401.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiFailure> {
    let auth = &state.config.gateway.auth;
    let author = match auth.mode {
        AuthMode::None => Some(ANONYMOUS),
        AuthMode::Token => extract_bearer(headers).and_then(|t| auth.author_for_token(t)),
    };
    author.map(str::to_string).ok_or_else(|| {
        api_error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized. Set 'Authorization: Bearer <your-token>' header.",
        )
    })
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
