//! HTTP surface: the upload page, its form actions and a small JSON API.

pub mod handlers;
pub mod page;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::components::{Recognizer, SessionStore, ShareTarget};
use crate::error::Error;
use crate::utils::time::Clock;
use handlers::{
    calendar_api_handler, download_handler, health_handler, index_handler, process_handler,
    session_api_handler, share_handler, upload_handler,
};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "notecal_session";

#[derive(Clone)]
pub struct AppState {
    /// Sessions of all connected browsers
    pub sessions: Arc<SessionStore>,
    /// Reads events from images
    pub recognizer: Arc<dyn Recognizer>,
    /// Where shared calendars go
    pub share: Arc<dyn ShareTarget>,
    /// Current time for date normalization
    pub clock: Arc<dyn Clock>,
}

/// Build the router
pub fn router(state: AppState, upload_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/process", post(process_handler))
        .route("/calendar.ics", get(download_handler))
        .route("/share", post(share_handler))
        .route("/api/session", get(session_api_handler))
        .route("/api/calendar", post(calendar_api_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Upload(_) | Error::InvalidEvent(_) | Error::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Session(_) => StatusCode::CONFLICT,
            Error::ShareUnsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Recognition(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, self.to_string()).into_response()
    }
}
