use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(notecal::config),
        help("check the environment, .env and config/notecal.toml")
    )]
    Config(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(notecal::environment))]
    Environment(String),

    #[error("Upload error: {0}")]
    #[diagnostic(code(notecal::upload))]
    Upload(String),

    #[error("Recognition error: {0}")]
    #[diagnostic(code(notecal::recognition))]
    Recognition(String),

    #[error("Sharing is not supported: {0}")]
    #[diagnostic(code(notecal::share_unsupported))]
    ShareUnsupported(String),

    #[error("Session error: {0}")]
    #[diagnostic(code(notecal::session))]
    Session(String),

    #[error("Invalid event: {0}")]
    #[diagnostic(code(notecal::invalid_event))]
    InvalidEvent(String),

    #[error(transparent)]
    #[diagnostic(code(notecal::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(notecal::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(notecal::other))]
    Other(String),
}

impl Error {
    /// The message without the category prefix, for showing to users
    pub fn user_message(&self) -> String {
        match self {
            Error::Config(msg)
            | Error::Environment(msg)
            | Error::Upload(msg)
            | Error::Recognition(msg)
            | Error::ShareUnsupported(msg)
            | Error::Session(msg)
            | Error::InvalidEvent(msg)
            | Error::Serialization(msg)
            | Error::Other(msg) => msg.clone(),
            Error::Io(err) => err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create upload errors
pub fn upload_error(message: &str) -> Error {
    Error::Upload(message.to_string())
}

/// Helper to create recognition errors
pub fn recognition_error(message: &str) -> Error {
    Error::Recognition(message.to_string())
}

/// Helper to create session errors
pub fn session_error(message: &str) -> Error {
    Error::Session(message.to_string())
}

/// Helper to create invalid event errors
pub fn invalid_event_error(message: &str) -> Error {
    Error::InvalidEvent(message.to_string())
}
