use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::backoff::is_quota_exhausted;

/// Failures raised by a [`RemoteStore`](crate::store::RemoteStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("remote object not found: {0}")]
    NotFound(String),

    #[error("remote store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("remote store authentication failed: {0}")]
    Auth(String),

    #[error("remote store transport error: {0}")]
    Transport(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the store reported that its storage capacity is used up.
    pub fn is_quota_exceeded(&self) -> bool {
        is_quota_exhausted(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
