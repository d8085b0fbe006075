use crate::state::{ActiveDownloadInfo, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Body of the 400 reply for any metadata failure
pub const INVALID_MEDIA_MESSAGE: &str = "Invalid URL or Private Video";

/// Custom error response for relay operations
#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    /// Metadata could not be resolved; the cause is never sent to clients
    InvalidMedia,
    Busy,
    InternalError(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            HttpError::InvalidMedia => (StatusCode::BAD_REQUEST, INVALID_MEDIA_MESSAGE.to_string()),
            HttpError::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many concurrent downloads".to_string(),
            ),
            HttpError::InternalError(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };

        (status, message).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Version information endpoint
pub async fn version_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "ytdlp": state.ytdlp_version,
    }))
}

/// Debug endpoint: in-flight downloads
pub async fn active_downloads(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ActiveDownloadInfo>> {
    Json(state.active_downloads())
}
