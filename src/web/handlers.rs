use axum::{
    extract::{Multipart, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rust_i18n::t;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{page, AppState, SESSION_COOKIE};
use crate::components::calendar::{build_calendar_file, CalendarEvent, CalendarFile};
use crate::components::session::SessionState;
use crate::components::upload::{ImageFile, UploadSource};
use crate::error::{upload_error, AppResult, Error};

/// Get the session id from the cookie, or start a new session
fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        return (jar, id);
    }

    let id = Uuid::new_v4();
    debug!("Starting session {}", id);
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build();
    (jar.add(cookie), id)
}

/// Calendar file as a response. `attachment` makes browsers save it.
fn calendar_response(file: CalendarFile, attachment: bool) -> Response {
    let disposition = if attachment { "attachment" } else { "inline" };
    (
        [
            (
                header::CONTENT_TYPE,
                format!("{}; charset=utf-8", CalendarFile::MIME_TYPE),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", disposition, file.file_name),
            ),
        ],
        file.content,
    )
        .into_response()
}

/// Handler for the main page
pub async fn index_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let now = state.clock.now();
    let html = state
        .sessions
        .update(id, |session| page::render(session, now))
        .await;
    (jar, Html(html))
}

/// Handler for image selection, from the picker or a drop
pub async fn upload_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let (jar, id) = session_id(jar);
    let mut source = UploadSource::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(&format!("Invalid upload: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "source" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| upload_error(&format!("Invalid source field: {}", e)))?;
                source = UploadSource::from_field(&value);
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| upload_error(&format!("Failed to read image: {}", e)))?;

                // An empty file input still sends a nameless, empty part
                file = if file_name.is_empty() && data.is_empty() {
                    None
                } else {
                    Some(ImageFile::new(file_name, content_type.as_deref(), data))
                };
            }
            other => debug!("Ignoring form field {}", other),
        }
    }

    let outcome = state
        .sessions
        .update(id, |session| session.select_image(source, file))
        .await;
    info!("Upload for session {}: {:?}", id, outcome);

    Ok((jar, Redirect::to("/")))
}

/// Handler for the "send for processing" button
pub async fn process_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);

    match state.sessions.recognize(id, state.recognizer.as_ref()).await {
        Ok(true) => info!("Recognition finished for session {}", id),
        Ok(false) => {}
        Err(e) => warn!("Recognition not started for session {}: {}", id, e),
    }

    (jar, Redirect::to("/"))
}

/// Handler for downloading the calendar
pub async fn download_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    let now = state.clock.now();

    match state.sessions.read(id, |session| session.calendar_file(now)).await {
        Ok(file) => {
            info!("Session {} downloads {}", id, file.file_name);
            (jar, calendar_response(file, true)).into_response()
        }
        Err(e) => {
            warn!("Download failed for session {}: {}", id, e);
            let message = e.user_message();
            state
                .sessions
                .update(id, |session| session.set_notice(message))
                .await;
            (jar, Redirect::to("/")).into_response()
        }
    }
}

/// Handler for the share button
pub async fn share_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let now = state.clock.now();

    let notice = if !state.share.is_available() {
        t!("share_unsupported").to_string()
    } else {
        match state.sessions.read(id, |session| session.calendar_file(now)).await {
            Err(e) => e.user_message(),
            Ok(file) => match state.share.share(&file, now).await {
                Ok(shared) => {
                    let location = shared.location;
                    t!("shared", location = location).to_string()
                }
                Err(Error::ShareUnsupported(reason)) => {
                    warn!("Share unsupported: {}", reason);
                    t!("share_unsupported").to_string()
                }
                Err(e) => {
                    error!("Failed to share calendar: {}", e);
                    t!("share_unsupported").to_string()
                }
            },
        }
    };

    state
        .sessions
        .update(id, |session| session.set_notice(notice))
        .await;
    (jar, Redirect::to("/"))
}

/// Session snapshot for scripts
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub file_name: Option<String>,
    pub events: Vec<CalendarEvent>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Handler for the JSON session view
pub async fn session_api_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let view = state
        .sessions
        .read(id, |session| SessionView {
            state: session.state(),
            file_name: session.image().map(|image| image.file_name.clone()),
            events: session.events().to_vec(),
            error: session.error().map(str::to_string),
            success: session.success().map(str::to_string),
        })
        .await;
    (jar, Json(view))
}

#[derive(Debug, Deserialize)]
pub struct CalendarRequest {
    pub events: Vec<CalendarEvent>,
}

/// Handler that turns posted events into a calendar file
pub async fn calendar_api_handler(
    State(state): State<AppState>,
    Json(request): Json<CalendarRequest>,
) -> AppResult<Response> {
    let file = build_calendar_file(&request.events, state.clock.now())?;
    Ok(calendar_response(file, false))
}

// Handler for API health check
pub async fn health_handler() -> &'static str {
    "OK"
}
