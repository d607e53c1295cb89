//! iCalendar generation for recognized events.
//!
//! Every event becomes one `VEVENT` with a fifteen minute window. Dates are
//! moved into the future relative to the supplied "now", so the same input
//! and instant always produce the same file.

pub mod models;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::utils::time::{adjust_event_date, compact_time, shift_time};
pub use models::{CalendarEvent, CalendarFile};

/// Product identifier written into every calendar
pub const PRODID: &str = "-//Calendar App//EN";

/// Domain part of generated event UIDs
pub const UID_DOMAIN: &str = "calendar-app.local";

/// File name used for downloads and shares
pub const CALENDAR_FILE_NAME: &str = "calendar.ics";

/// Length of every generated event
pub const EVENT_LENGTH_MINUTES: i64 = 15;

/// Window used when the note has no usable time
const DEFAULT_START: &str = "1200";
const DEFAULT_END: &str = "1215";

/// Maximum line length in octets before folding
const MAX_LINE_OCTETS: usize = 75;

/// Generate the calendar text for a list of events
pub fn generate_ics(events: &[CalendarEvent], now: DateTime<Local>) -> AppResult<String> {
    let local_now = now.naive_local();
    let dtstamp = now.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string();
    let epoch_ms = now.timestamp_millis();

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
    ];

    for (index, event) in events.iter().enumerate() {
        let date = adjust_event_date(&event.date, local_now)?;
        let (start, end) = event_window(event);

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:event-{}-{}@{}", index, epoch_ms, UID_DOMAIN));
        lines.push(format!("DTSTAMP:{}", dtstamp));
        lines.push(format!("DTSTART:{}T{}00", date, start));
        lines.push(format!("DTEND:{}T{}00", date, end));
        lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());

    debug!("Generated calendar with {} events", events.len());

    let mut ics = String::new();
    for line in &lines {
        ics.push_str(&fold_line(line));
        ics.push_str("\r\n");
    }
    Ok(ics)
}

/// Generate a named calendar file
pub fn build_calendar_file(events: &[CalendarEvent], now: DateTime<Local>) -> AppResult<CalendarFile> {
    Ok(CalendarFile {
        file_name: CALENDAR_FILE_NAME.to_string(),
        content: generate_ics(events, now)?,
    })
}

/// Start and end (HHMM) for an event
fn event_window(event: &CalendarEvent) -> (String, String) {
    if let Some(time) = event.start_time() {
        match (compact_time(time), shift_time(time, EVENT_LENGTH_MINUTES)) {
            (Ok(start), Ok(end)) => return (start, end),
            _ => warn!(
                "Event '{}' has an unreadable time '{}', using the default window",
                event.title, time
            ),
        }
    }
    (DEFAULT_START.to_string(), DEFAULT_END.to_string())
}

/// Escape TEXT property values
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Fold a content line so no physical line exceeds 75 octets
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            // Continuation lines start with a single space
            folded.push_str("\r\n ");
            width = 1;
        }
        folded.push(ch);
        width += len;
    }
    folded
}
