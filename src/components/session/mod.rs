//! Per-browser state: the selected image, the recognition request and its
//! results.

use chrono::{DateTime, Local};
use rust_i18n::t;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::components::calendar::{build_calendar_file, CalendarEvent, CalendarFile};
use crate::components::recognition::Recognizer;
use crate::components::upload::{ImageFile, ImageUploader, UploadOutcome, UploadSource};
use crate::error::{session_error, AppResult};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No image selected
    Idle,
    /// Image selected, nothing recognized yet
    FileSelected,
    /// A recognition request for the current image is in flight
    Recognizing,
    /// Recognition finished
    ResultsReady,
    /// Recognition failed
    Failed,
}

/// Proof that a recognition was started for a particular selection.
///
/// The session counts as recognizing only while the ticket is alive, so a
/// request whose future is dropped mid-flight releases the session.
#[derive(Debug, Clone)]
pub struct RecognitionTicket {
    pub selection: Uuid,
    pub image: ImageFile,
    in_flight: Arc<()>,
}

/// The request a session is waiting for
#[derive(Debug)]
struct PendingRecognition {
    selection: Uuid,
    ticket: Weak<()>,
}

#[derive(Debug)]
pub struct Session {
    uploader: ImageUploader,
    /// Changes every time a new image is accepted
    selection: Option<Uuid>,
    /// The in-flight request, if any
    pending: Option<PendingRecognition>,
    events: Vec<CalendarEvent>,
    error: Option<String>,
    success: Option<String>,
    notice: Option<String>,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            uploader: ImageUploader::new(),
            selection: None,
            pending: None,
            events: Vec::new(),
            error: None,
            success: None,
            notice: None,
            last_seen: Instant::now(),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.is_recognizing() {
            SessionState::Recognizing
        } else if self.uploader.file().is_none() {
            SessionState::Idle
        } else if self.error.is_some() {
            SessionState::Failed
        } else if self.success.is_some() {
            SessionState::ResultsReady
        } else {
            SessionState::FileSelected
        }
    }

    /// Select (or clear) the image
    pub fn select_image(&mut self, source: UploadSource, file: Option<ImageFile>) -> UploadOutcome {
        let outcome = self.uploader.handle(source, file);
        match outcome {
            UploadOutcome::Accepted => {
                self.selection = Some(Uuid::new_v4());
                self.reset_results();
            }
            UploadOutcome::Cleared => {
                self.selection = None;
                self.reset_results();
            }
            UploadOutcome::Ignored => {}
        }
        outcome
    }

    /// Move into the recognizing state for the current image
    pub fn begin_recognition(&mut self) -> AppResult<RecognitionTicket> {
        if self.is_recognizing() {
            return Err(session_error(&t!("recognition_in_progress")));
        }

        let (Some(image), Some(selection)) = (self.uploader.file(), self.selection) else {
            let message = t!("upload_first").to_string();
            self.error = Some(message.clone());
            return Err(session_error(&message));
        };

        let ticket = RecognitionTicket {
            selection,
            image: image.clone(),
            in_flight: Arc::new(()),
        };
        self.pending = Some(PendingRecognition {
            selection,
            ticket: Arc::downgrade(&ticket.in_flight),
        });
        self.error = None;
        self.success = None;
        self.notice = None;
        Ok(ticket)
    }

    /// Apply the outcome of a recognition request.
    ///
    /// Returns false when the request belonged to an image that is no
    /// longer selected; its result is dropped.
    pub fn complete_recognition(
        &mut self,
        ticket: &RecognitionTicket,
        result: AppResult<Vec<CalendarEvent>>,
    ) -> bool {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| Arc::downgrade(&ticket.in_flight).ptr_eq(&pending.ticket))
        {
            self.pending = None;
        }
        if self.selection != Some(ticket.selection) {
            return false;
        }

        match result {
            Ok(events) => {
                self.events = events;
                self.error = None;
                self.success = Some(t!("recognized").to_string());
            }
            Err(e) => {
                self.events.clear();
                self.success = None;
                let message = e.user_message();
                self.error = Some(t!("recognition_error", message = message).to_string());
            }
        }
        true
    }

    /// Build the calendar file for the recognized events
    pub fn calendar_file(&self, now: DateTime<Local>) -> AppResult<CalendarFile> {
        if self.events.is_empty() {
            return Err(session_error(&t!("no_events")));
        }
        build_calendar_file(&self.events, now)
    }

    /// Show a one-off message on the next page render
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn image(&self) -> Option<&ImageFile> {
        self.uploader.file()
    }

    pub fn preview(&self) -> Option<&str> {
        self.uploader.preview()
    }

    pub fn selection(&self) -> Option<Uuid> {
        self.selection
    }

    /// A live request exists for the current selection
    fn is_recognizing(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            Some(pending.selection) == self.selection && pending.ticket.strong_count() > 0
        })
    }

    fn reset_results(&mut self) {
        self.events.clear();
        self.error = None;
        self.success = None;
        self.notice = None;
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

/// In-memory sessions keyed by the session cookie
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the session, creating it if needed
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_default();
        session.touch();
        f(session)
    }

    /// Run `f` on the session, or on an empty one if it does not exist
    pub async fn read<R>(&self, id: Uuid, f: impl FnOnce(&Session) -> R) -> R {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(session) => f(session),
            None => f(&Session::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions not used for `max_idle`
    pub async fn prune(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen.elapsed() < max_idle);
        before - sessions.len()
    }

    /// Recognize the session's current image.
    ///
    /// The lock is released while the recognizer runs. Returns whether the
    /// result was applied (false if another image was selected meanwhile).
    pub async fn recognize(&self, id: Uuid, recognizer: &dyn Recognizer) -> AppResult<bool> {
        let ticket = self.update(id, |session| session.begin_recognition()).await?;

        info!(
            "Recognizing {} for session {}",
            ticket.image.file_name, id
        );
        let result = recognizer.recognize(&ticket.image).await;
        if let Err(e) = &result {
            error!("Recognition failed for session {}: {}", id, e);
        }

        let applied = self
            .update(id, |session| session.complete_recognition(&ticket, result))
            .await;
        if !applied {
            warn!("Discarding stale recognition result for session {}", id);
        }
        Ok(applied)
    }
}
