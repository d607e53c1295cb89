//! Turns a photo of handwritten notes into calendar events using Gemini.

pub mod models;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::from_str;
use std::fmt;
use tracing::{debug, error, info};
use url::Url;

use crate::components::calendar::CalendarEvent;
use crate::components::upload::ImageFile;
use crate::config::Config;
use crate::error::{config_error, recognition_error, AppResult};
use models::{
    Content, EventsEnvelope, GenerateContentRequest, GenerateContentResponse, InlineData, Part,
};

/// Instruction sent along with every image
pub const PROMPT: &str = r#"The image contains handwritten dates and tasks. Recognize them and return them as JSON.

Response format:
{
  "events": [
    {
      "date": "YYYY-MM-DD",
      "title": "Event title",
      "time": "HH:mm (if specified)"
    }
  ]
}

If no events are found, return an empty array."#;

/// Anything that can read events from an image
#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    /// Recognize the events written on the image
    async fn recognize(&self, image: &ImageFile) -> AppResult<Vec<CalendarEvent>>;
}

/// Recognizer backed by the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiRecognizer {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiRecognizer")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiRecognizer {
    /// Create a recognizer; the API key must not be empty
    pub fn new(api_key: &str, model: &str, endpoint: &str) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(config_error("Gemini API key is empty"));
        }
        let endpoint = Url::parse(endpoint)
            .map_err(|e| config_error(&format!("Invalid Gemini endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create a recognizer from the loaded configuration
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            &config.gemini_api_key,
            &config.gemini_model,
            &config.gemini_endpoint,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// URL of the generateContent call, without the key
    pub fn request_url(&self) -> AppResult<Url> {
        self.endpoint
            .join(&format!("models/{}:generateContent", self.model))
            .map_err(|e| config_error(&format!("Invalid Gemini model {}: {}", self.model, e)))
    }
}

#[async_trait]
impl Recognizer for GeminiRecognizer {
    async fn recognize(&self, image: &ImageFile) -> AppResult<Vec<CalendarEvent>> {
        info!(
            "Sending {} ({} bytes) to Gemini model {}",
            image.file_name,
            image.data.len(),
            self.model
        );

        let url = self.request_url()?;
        let body = build_request(image);

        // Errors are stripped of the URL so the key never reaches the logs
        let res = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                recognition_error(&format!("Failed to send request to Gemini: {}", e.without_url()))
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            recognition_error(&format!("Failed to read Gemini response: {}", e.without_url()))
        })?;

        if !status.is_success() {
            let message = from_str::<GenerateContentResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(text);
            error!("Gemini returned {}: {}", status, message);
            return Err(recognition_error(&format!(
                "Gemini returned status {}: {}",
                status, message
            )));
        }

        let events = parse_response(&text)?;
        info!("Gemini recognized {} events", events.len());
        Ok(events)
    }
}

/// Build the request body for an image
pub fn build_request(image: &ImageFile) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![
                Part::Text {
                    text: PROMPT.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.content_type.clone(),
                        data: image.to_base64(),
                    },
                },
            ],
        }],
    }
}

/// Read the events out of a raw `generateContent` response body
pub fn parse_response(body: &str) -> AppResult<Vec<CalendarEvent>> {
    let response: GenerateContentResponse = from_str(body)
        .map_err(|e| recognition_error(&format!("Gemini response is not valid JSON: {}", e)))?;

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| recognition_error("Gemini could not recognize the image"))?;

    let text = candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.iter().find_map(|part| part.text.as_deref()))
        .ok_or_else(|| recognition_error("Gemini returned a candidate without text"))?;

    debug!("Gemini answered: {}", text);
    extract_events(text)
}

/// Pull the `{"events": [...]}` object out of free text.
///
/// The model likes to wrap its JSON in prose or code fences, so everything
/// outside the first `{` and the last `}` is ignored.
pub fn extract_events(text: &str) -> AppResult<Vec<CalendarEvent>> {
    let unparseable = || recognition_error(&format!("Failed to parse Gemini response: {}", text));

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(unparseable());
    };
    if start > end {
        return Err(unparseable());
    }

    let json_part = &text[start..=end];
    match from_str::<EventsEnvelope>(json_part) {
        Ok(envelope) => Ok(envelope.events.unwrap_or_default()),
        Err(e) => {
            error!("Found JSON-like structure but couldn't parse it: {}", e);
            Err(unparseable())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use bytes::Bytes;
    use serde_json::{json, Value};

    fn response_with_text(text: &str) -> String {
        json!({
            "candidates": [
                { "content": { "role": "model", "parts": [ { "text": text } ] } }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_fenced_empty_events() {
        let body = response_with_text("```json\n{\"events\":[]}\n```");
        assert_eq!(parse_response(&body).unwrap(), Vec::<CalendarEvent>::new());
    }

    #[test]
    fn test_events_in_prose() {
        let body = response_with_text(
            "Here is what I found:\n{\"events\":[{\"date\":\"2025-03-24\",\"title\":\"Dentist\",\"time\":\"14:30\"},{\"date\":\"2025-03-25\",\"title\":\"Call mom\"}]}\nHope this helps!",
        );
        let events = parse_response(&body).unwrap();
        assert_eq!(
            events,
            vec![
                CalendarEvent {
                    date: "2025-03-24".to_string(),
                    title: "Dentist".to_string(),
                    time: Some("14:30".to_string()),
                },
                CalendarEvent {
                    date: "2025-03-25".to_string(),
                    title: "Call mom".to_string(),
                    time: None,
                },
            ]
        );
    }

    #[test]
    fn test_null_time_and_missing_events() {
        let body = response_with_text(
            r#"{"events":[{"date":"2025-03-24","title":"Gym","time":null}]}"#,
        );
        assert_eq!(parse_response(&body).unwrap()[0].time, None);

        assert!(extract_events("{}").unwrap().is_empty());
        assert!(extract_events(r#"{"events":null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_title_keeps_the_batch() {
        let events = extract_events(
            r#"{"events":[{"date":"2025-07-01","title":"Gym"},{"date":"2025-07-02"}]}"#,
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Gym");
        assert_eq!(events[1].date, "2025-07-02");
        assert_eq!(events[1].title, "");
    }

    #[test]
    fn test_empty_candidates_is_an_error() {
        let result = parse_response(r#"{"candidates":[]}"#);
        assert!(matches!(result, Err(Error::Recognition(_))));

        let result = parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(result, Err(Error::Recognition(_))));
    }

    #[test]
    fn test_candidate_without_text_is_an_error() {
        let result = parse_response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(result, Err(Error::Recognition(_))));
    }

    #[test]
    fn test_unparseable_text_is_an_error() {
        assert!(matches!(
            extract_events("I could not find any events."),
            Err(Error::Recognition(_))
        ));
        assert!(matches!(
            extract_events("} backwards {"),
            Err(Error::Recognition(_))
        ));
        assert!(matches!(
            extract_events("{\"events\": [ {\"date\": ] }"),
            Err(Error::Recognition(_))
        ));
        assert!(matches!(parse_response("not json"), Err(Error::Recognition(_))));
    }

    #[test]
    fn test_build_request_shape() {
        let image = ImageFile::new("notes.jpg", Some("image/jpeg"), Bytes::from_static(b"abc"));
        let value: Value = serde_json::to_value(build_request(&image)).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], PROMPT);
        assert_eq!(
            value["contents"][0]["parts"][1]["inline_data"],
            json!({ "mime_type": "image/jpeg", "data": "YWJj" })
        );
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiRecognizer::new("", "gemini-1.5-flash", crate::config::DEFAULT_GEMINI_ENDPOINT);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_request_url() {
        let recognizer = GeminiRecognizer::new(
            "secret",
            "gemini-1.5-flash",
            crate::config::DEFAULT_GEMINI_ENDPOINT,
        )
        .unwrap();
        let url = recognizer.request_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(!url.as_str().contains("secret"));
    }
}
