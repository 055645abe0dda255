//! Outbound collaborators other than the remote store.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("media library authentication failed: {0}")]
    Auth(String),

    #[error("media library returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("media library transport error: {0}")]
    Transport(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid notification address: {0}")]
    Address(String),

    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

/// Secondary publication target, e.g. a photo-library album per shoot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Upload `local` and add it to the album titled `album`, creating the
    /// album when it does not exist yet.
    async fn upload_to_album(&self, local: &Path, album: &str) -> Result<(), LibraryError>;
}

/// Operator alerts for failures that need attention.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Library used when no photo-library credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLibrary;

#[async_trait]
impl MediaLibrary for NoopLibrary {
    async fn upload_to_album(&self, local: &Path, album: &str) -> Result<(), LibraryError> {
        info!(
            path = %local.display(),
            album = %album,
            "Media library disabled; skipping album upload"
        );
        Ok(())
    }
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        warn!(subject = %subject, body = %body, "Notification");
        Ok(())
    }
}
