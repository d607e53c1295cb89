use serde::{Deserialize, Serialize};

/// An event read from the handwritten notes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// The date of the event (YYYY-MM-DD)
    pub date: String,
    /// What the note says; empty when the model left it out
    #[serde(default)]
    pub title: String,
    /// Start time if one was written down (HH:MM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl CalendarEvent {
    /// The start time, treating blank strings as missing
    pub fn start_time(&self) -> Option<&str> {
        self.time
            .as_deref()
            .map(str::trim)
            .filter(|time| !time.is_empty())
    }
}

/// A generated calendar file ready for download or sharing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFile {
    pub file_name: String,
    pub content: String,
}

impl CalendarFile {
    pub const MIME_TYPE: &'static str = "text/calendar";
}
