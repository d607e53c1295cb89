use crate::error::{config_error, env_error, AppResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use url::Url;

/// Default Gemini model used for recognition
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default base URL of the Gemini REST API
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Default port for the web server
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (10MB)
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Default locale for user-facing messages
pub const DEFAULT_LOCALE: &str = "en";

/// Optional configuration file with non-secret settings
pub const CONFIG_FILE: &str = "config/notecal.toml";

/// Main configuration structure for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API key
    pub gemini_api_key: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Base URL of the Gemini API, always ending with a slash
    pub gemini_endpoint: String,
    /// Address to bind the web server to
    pub host: IpAddr,
    /// Port to bind the web server to
    pub port: u16,
    /// Maximum accepted request body size
    pub upload_limit_bytes: usize,
    /// Folder that shared calendar files are written to
    pub share_dir: Option<PathBuf>,
    /// Locale for user-facing messages
    pub locale: String,
}

/// Settings that may come from `config/notecal.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gemini_model: Option<String>,
    pub gemini_endpoint: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upload_limit_bytes: Option<usize>,
    pub share_dir: Option<PathBuf>,
    pub locale: Option<String>,
}

impl FileConfig {
    /// Read the file if it exists
    pub fn read(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = FileConfig::read(Path::new(CONFIG_FILE))?;
        Self::from_sources(|key| env::var(key).ok(), file)
    }

    /// Build the configuration from a variable lookup and file settings.
    /// Variables win over the file.
    pub fn from_sources<F>(lookup: F, file: FileConfig) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // The only required value
        let gemini_api_key = var("GEMINI_API_KEY")
            .ok_or_else(|| config_error("GEMINI_API_KEY is not set"))?;

        let gemini_model = var("GEMINI_MODEL")
            .or(file.gemini_model)
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_endpoint = normalize_endpoint(
            &var("GEMINI_ENDPOINT")
                .or(file.gemini_endpoint)
                .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
        )?;

        let host = match var("HOST").or(file.host) {
            Some(host) => host
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| env_error("HOST"))?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let port = match var("PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|_| env_error("PORT"))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let upload_limit_bytes = match var("UPLOAD_LIMIT_BYTES") {
            Some(limit) => limit
                .trim()
                .parse::<usize>()
                .map_err(|_| env_error("UPLOAD_LIMIT_BYTES"))?,
            None => file.upload_limit_bytes.unwrap_or(DEFAULT_UPLOAD_LIMIT_BYTES),
        };

        let share_dir = var("SHARE_DIR").map(PathBuf::from).or(file.share_dir);

        let locale = var("APP_LOCALE")
            .or(file.locale)
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        Ok(Config {
            gemini_api_key,
            gemini_model,
            gemini_endpoint,
            host,
            port,
            upload_limit_bytes,
            share_dir,
            locale,
        })
    }

    /// Socket address the web server binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Validate the endpoint and make sure relative joins append to its path
fn normalize_endpoint(raw: &str) -> AppResult<String> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| config_error(&format!("Invalid GEMINI_ENDPOINT {}: {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url.to_string())
}
