use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use std::sync::Arc;
use tracing::info;

use crate::components::calendar::CalendarFile;
use crate::config::Config;
use crate::error::{AppResult, Error};

/// Where a shared file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub location: String,
}

/// The host's share facility
#[async_trait]
pub trait ShareTarget: Send + Sync + 'static {
    /// Whether sharing can work at all
    fn is_available(&self) -> bool;

    /// Hand the calendar file over; `shared_at` stamps the result
    async fn share(&self, file: &CalendarFile, shared_at: DateTime<Local>) -> AppResult<SharedFile>;
}

/// Shares by writing into a folder, such as one synced to a phone
#[derive(Debug, Clone)]
pub struct DirectoryShare {
    dir: PathBuf,
}

impl DirectoryShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ShareTarget for DirectoryShare {
    fn is_available(&self) -> bool {
        true
    }

    async fn share(&self, file: &CalendarFile, shared_at: DateTime<Local>) -> AppResult<SharedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = file.file_name.trim_end_matches(".ics");
        let stamp = shared_at.timestamp_millis();

        // Never overwrite an earlier share from the same millisecond
        let mut attempt = 0u32;
        let (path, mut handle) = loop {
            let name = match attempt {
                0 => format!("{}-{}.ics", stem, stamp),
                n => format!("{}-{}-{}.ics", stem, stamp, n),
            };
            let path = self.dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(handle) => break (path, handle),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        };
        handle.write_all(file.content.as_bytes()).await?;
        handle.flush().await?;

        info!("Shared calendar to {}", path.display());
        Ok(SharedFile {
            location: path.display().to_string(),
        })
    }
}

/// Used when no share facility is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShare;

#[async_trait]
impl ShareTarget for NoShare {
    fn is_available(&self) -> bool {
        false
    }

    async fn share(&self, _file: &CalendarFile, _shared_at: DateTime<Local>) -> AppResult<SharedFile> {
        Err(Error::ShareUnsupported(
            "no share folder is configured".to_string(),
        ))
    }
}

/// Pick the share target for the configuration
pub fn share_target_from_config(config: &Config) -> Arc<dyn ShareTarget> {
    match &config.share_dir {
        Some(dir) => {
            info!("Sharing calendars to {}", dir.display());
            Arc::new(DirectoryShare::new(dir.clone()))
        }
        None => {
            info!("SHARE_DIR is not set, sharing is disabled");
            Arc::new(NoShare)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file() -> CalendarFile {
        CalendarFile {
            file_name: "calendar.ics".to_string(),
            content: "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".to_string(),
        }
    }

    fn shared_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("notecal-share-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_no_share_is_unsupported() {
        let target = NoShare;
        assert!(!target.is_available());
        assert!(matches!(
            target.share(&file(), shared_at()).await,
            Err(Error::ShareUnsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_share_writes_file() {
        let dir = temp_dir();
        let target = DirectoryShare::new(&dir);
        assert!(target.is_available());

        let shared = target.share(&file(), shared_at()).await.unwrap();
        let written = tokio::fs::read_to_string(&shared.location).await.unwrap();
        assert_eq!(written, file().content);
        assert!(shared
            .location
            .ends_with(&format!("calendar-{}.ics", shared_at().timestamp_millis())));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_instant_does_not_overwrite() {
        let dir = temp_dir();
        let target = DirectoryShare::new(&dir);

        let mut second = file();
        second.content = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n".to_string();

        let first_shared = target.share(&file(), shared_at()).await.unwrap();
        let second_shared = target.share(&second, shared_at()).await.unwrap();
        assert_ne!(first_shared.location, second_shared.location);

        let first_written = tokio::fs::read_to_string(&first_shared.location).await.unwrap();
        let second_written = tokio::fs::read_to_string(&second_shared.location).await.unwrap();
        assert_eq!(first_written, file().content);
        assert_eq!(second_written, second.content);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
