//! Remote object store port.
//!
//! The worker only ever needs flat listings of a folder, whole-object
//! uploads and downloads, deletes, and a modification-time touch used as a
//! lease heartbeat. [`TimedStore`] bounds every call with a deadline.

pub mod memory;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub use memory::MemoryStore;

/// Mime type the store uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One child of a remote folder as returned by [`RemoteStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: "application/octet-stream".to_string(),
            modified_at: None,
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            modified_at: None,
        }
    }

    pub fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type.contains("folder")
    }
}

/// Result of [`RemoteStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object did not exist and was created with this id.
    Created(String),
    /// An object with the same name was already present.
    Existing(RemoteEntry),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All non-trashed children of `folder_id`, across every page.
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String>;

    /// Upload `local` into `folder_id` under the local file name.
    async fn upload(&self, local: &Path, folder_id: &str, mime_type: &str) -> Result<String>;

    async fn download(&self, id: &str, local: &Path) -> Result<()>;

    /// Delete an object. Deleting an id that no longer exists succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Bump the modification timestamp of an object.
    async fn touch(&self, id: &str) -> Result<()>;

    /// Create the object only when no child of `folder_id` already has the
    /// same name.
    ///
    /// The default lists then uploads, which leaves a window where two
    /// workers can both create. Callers that need exclusivity verify the
    /// result afterwards.
    async fn create_if_absent(
        &self,
        local: &Path,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<CreateOutcome> {
        let name = file_name_of(local)?;
        if let Some(existing) = self
            .list(folder_id)
            .await?
            .into_iter()
            .find(|entry| entry.name == name)
        {
            return Ok(CreateOutcome::Existing(existing));
        }
        let id = self.upload(local, folder_id, mime_type).await?;
        Ok(CreateOutcome::Created(id))
    }
}

/// File name component of a local path, as used for the remote object name.
pub fn file_name_of(local: &Path) -> Result<String> {
    local
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Internal(format!("no usable file name in {}", local.display())))
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        (**self).list(folder_id).await
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        (**self).create_folder(name, parent_id).await
    }

    async fn upload(&self, local: &Path, folder_id: &str, mime_type: &str) -> Result<String> {
        (**self).upload(local, folder_id, mime_type).await
    }

    async fn download(&self, id: &str, local: &Path) -> Result<()> {
        (**self).download(id, local).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }

    async fn touch(&self, id: &str) -> Result<()> {
        (**self).touch(id).await
    }

    async fn create_if_absent(
        &self,
        local: &Path,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<CreateOutcome> {
        (**self).create_if_absent(local, folder_id, mime_type).await
    }
}

/// Wraps a store so every call fails with [`StoreError::Timeout`] once
/// `limit` elapses.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(&self, call: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.limit)),
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for TimedStore<S> {
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        self.bounded(self.inner.list(folder_id)).await
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        self.bounded(self.inner.create_folder(name, parent_id)).await
    }

    async fn upload(&self, local: &Path, folder_id: &str, mime_type: &str) -> Result<String> {
        self.bounded(self.inner.upload(local, folder_id, mime_type))
            .await
    }

    async fn download(&self, id: &str, local: &Path) -> Result<()> {
        self.bounded(self.inner.download(id, local)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.bounded(self.inner.delete(id)).await
    }

    async fn touch(&self, id: &str) -> Result<()> {
        self.bounded(self.inner.touch(id)).await
    }

    async fn create_if_absent(
        &self,
        local: &Path,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<CreateOutcome> {
        self.bounded(self.inner.create_if_absent(local, folder_id, mime_type))
            .await
    }
}
