// Export components
pub mod calendar;
pub mod recognition;
pub mod session;
pub mod share;
pub mod upload;

pub use calendar::{CalendarEvent, CalendarFile};
pub use recognition::{GeminiRecognizer, Recognizer};
pub use session::{Session, SessionState, SessionStore};
pub use share::{share_target_from_config, DirectoryShare, NoShare, ShareTarget, SharedFile};
pub use upload::{ImageFile, ImageUploader, UploadOutcome, UploadSource};
