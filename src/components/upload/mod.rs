use base64::engine::{general_purpose::STANDARD, Engine};
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{upload_error, AppResult};

const OCTET_STREAM: &str = "application/octet-stream";

/// An uploaded file with its resolved content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Name of the file as sent by the browser
    pub file_name: String,
    /// MIME type, declared by the browser or sniffed from the bytes
    pub content_type: String,
    /// Raw file contents
    pub data: Bytes,
}

impl ImageFile {
    /// Create a file, sniffing the type from the bytes when none is declared
    pub fn new(file_name: impl Into<String>, declared_type: Option<&str>, data: Bytes) -> Self {
        let content_type = resolve_content_type(declared_type, &data);
        Self {
            file_name: file_name.into(),
            content_type,
            data,
        }
    }

    /// Whether the content type marks this file as an image
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Base64 encoding of the contents
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Inline data URL used for the preview
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.to_base64())
    }
}

fn resolve_content_type(declared_type: Option<&str>, data: &[u8]) -> String {
    let declared = declared_type
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case(OCTET_STREAM));

    match declared {
        Some(t) => t.to_ascii_lowercase(),
        None => match image::guess_format(data) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => OCTET_STREAM.to_string(),
        },
    }
}

/// How the file reached the uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadSource {
    /// The file input control
    #[default]
    Picker,
    /// Drag and drop onto the drop zone
    Drop,
}

impl UploadSource {
    /// Parse the `source` form field; anything unknown counts as the picker
    pub fn from_field(value: &str) -> Self {
        match value.trim() {
            "drop" => UploadSource::Drop,
            _ => UploadSource::Picker,
        }
    }
}

/// What happened to a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new image replaced the previous one
    Accepted,
    /// The picker was emptied, so the image was removed
    Cleared,
    /// Nothing changed
    Ignored,
}

/// Make sure a file is an image
pub fn check_image(file: &ImageFile) -> AppResult<()> {
    if file.is_image() {
        Ok(())
    } else {
        Err(upload_error(&format!(
            "{} is not an image ({})",
            file.file_name, file.content_type
        )))
    }
}

/// Holds the single selected image and its preview
#[derive(Debug, Clone, Default)]
pub struct ImageUploader {
    file: Option<ImageFile>,
    preview: Option<String>,
}

impl ImageUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a selection from the picker or the drop zone
    pub fn handle(&mut self, source: UploadSource, file: Option<ImageFile>) -> UploadOutcome {
        let Some(file) = file else {
            return match source {
                UploadSource::Picker => {
                    self.clear();
                    UploadOutcome::Cleared
                }
                UploadSource::Drop => UploadOutcome::Ignored,
            };
        };

        if let Err(e) = check_image(&file) {
            // Non-images are dropped without telling the user
            debug!("Ignoring upload: {}", e);
            return UploadOutcome::Ignored;
        }

        info!(
            "Accepted image {} ({}, {} bytes)",
            file.file_name,
            file.content_type,
            file.data.len()
        );
        self.preview = Some(file.data_url());
        self.file = Some(file);
        UploadOutcome::Accepted
    }

    /// Forget the current image
    pub fn clear(&mut self) {
        self.file = None;
        self.preview = None;
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }
}
