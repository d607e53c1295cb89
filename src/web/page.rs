//! Server-side rendering of the single page.

use chrono::{DateTime, Local};
use rust_i18n::t;

use crate::components::calendar::CalendarEvent;
use crate::components::session::{Session, SessionState};
use crate::utils::time::normalize_event_date;

const TEMPLATE: &str = include_str!("../../assets/index.html");

/// Render the page for a session. Consumes the pending notice.
pub fn render(session: &mut Session, now: DateTime<Local>) -> String {
    let notice = session.take_notice();

    TEMPLATE
        .replace("{{LANG}}", &escape_html(&rust_i18n::locale()))
        .replace("{{TITLE}}", &escape_html(&t!("page_title")))
        .replace("{{UPLOADER}}", &uploader(session))
        .replace("{{ACTIONS}}", &actions(session))
        .replace("{{MESSAGES}}", &messages(session, notice.as_deref()))
        .replace("{{EVENTS}}", &events(session.events(), now))
}

fn uploader(session: &Session) -> String {
    let content = match session.preview() {
        // A picker post without a file clears the selection
        Some(preview) => format!(
            r#"<img src="{}" alt="{}">
        <form action="/upload" method="post" enctype="multipart/form-data">
            <input type="hidden" name="source" value="picker">
            <button class="button secondary" type="submit">{}</button>
        </form>"#,
            escape_html(preview),
            escape_html(&t!("preview_alt")),
            escape_html(&t!("clear_file"))
        ),
        None => format!(
            r#"<p>{}</p><p class="hint">{}</p>"#,
            escape_html(&t!("drop_hint")),
            escape_html(&t!("formats_hint"))
        ),
    };

    format!(
        r#"<div id="dropzone" class="dropzone">
        {content}
        <form id="upload-form" action="/upload" method="post" enctype="multipart/form-data">
            <input type="hidden" name="source" value="picker">
            <input type="file" name="image" accept="image/*" id="file-upload" class="hidden">
            <label for="file-upload" class="button secondary">{choose}</label>
        </form>
    </div>"#,
        content = content,
        choose = escape_html(&t!("choose_file")),
    )
}

fn actions(session: &Session) -> String {
    if session.image().is_none() {
        return String::new();
    }

    let processing = escape_html(&t!("processing"));
    let button = if session.state() == SessionState::Recognizing {
        format!(r#"<button class="button" type="submit" disabled>{}</button>"#, processing)
    } else {
        format!(
            r#"<button class="button" type="submit" data-busy-label="{}">{}</button>"#,
            processing,
            escape_html(&t!("process"))
        )
    };

    format!(
        r#"<div class="actions"><form id="process-form" action="/process" method="post">{}</form></div>"#,
        button
    )
}

fn messages(session: &Session, notice: Option<&str>) -> String {
    let mut html = String::new();
    if let Some(error) = session.error() {
        html.push_str(&message("error", error));
    }
    if let Some(success) = session.success() {
        html.push_str(&message("success", success));
    }
    if let Some(notice) = notice {
        html.push_str(&message("notice", notice));
    }
    html
}

fn message(kind: &str, text: &str) -> String {
    format!(
        r#"<div class="message {}" role="alert">{}</div>"#,
        kind,
        escape_html(text)
    )
}

fn events(events: &[CalendarEvent], now: DateTime<Local>) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut items = String::new();
    for event in events {
        // Show the date the calendar will use; fall back to the raw text
        let date = normalize_event_date(&event.date, now.naive_local())
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| event.date.clone());

        let time = match event.start_time() {
            Some(time) => {
                let time = time.to_string();
                format!(" {}", escape_html(&t!("at_time", time = time)))
            }
            None => String::new(),
        };

        items.push_str(&format!(
            r#"<li><strong>{}</strong> <span class="date">{}{}</span></li>"#,
            escape_html(&event.title),
            escape_html(&date),
            time
        ));
    }

    format!(
        r#"<section class="events">
        <h2>{heading}</h2>
        <ul>{items}</ul>
        <div class="actions">
            <form action="/share" method="post" style="display:inline">
                <button class="button secondary" type="submit">{share}</button>
            </form>
            <a class="button" href="/calendar.ics" download>{download}</a>
        </div>
    </section>"#,
        heading = escape_html(&t!("recognized_events")),
        items = items,
        share = escape_html(&t!("share")),
        download = escape_html(&t!("download")),
    )
}

/// Escape text for HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
