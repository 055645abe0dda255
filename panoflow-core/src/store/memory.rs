use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use super::{CreateOutcome, FOLDER_MIME_TYPE, RemoteEntry, RemoteStore, file_name_of};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
struct StoredObject {
    entry: RemoteEntry,
    parent: String,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    /// Insertion order, so listings are stable like a real folder.
    order: Vec<String>,
    upload_failure: Option<String>,
    uploads: u64,
    deletes: u64,
}

/// In-process store used by tests and local experiments.
///
/// `create_if_absent` runs under a single lock, so it is a true conditional
/// create. Timestamps start at construction time and advance by one
/// millisecond per write, so ordering by `modified_at` is deterministic.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    ids: Arc<AtomicU64>,
    clock: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            ids: Arc::default(),
            clock: Arc::default(),
            epoch: Utc::now(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        format!("obj-{}", self.ids.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn tick(&self) -> DateTime<Utc> {
        let step = self.clock.fetch_add(1, Ordering::Relaxed) as i64;
        self.epoch + TimeDelta::milliseconds(step)
    }

    fn insert_locked(
        &self,
        inner: &mut Inner,
        parent: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> String {
        let id = self.next_id();
        let entry = RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            modified_at: Some(self.tick()),
        };
        inner.objects.insert(
            id.clone(),
            StoredObject {
                entry,
                parent: parent.to_string(),
                content,
            },
        );
        inner.order.push(id.clone());
        id
    }

    /// Seed a folder under `parent` and return its id.
    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, parent, name, FOLDER_MIME_TYPE, Vec::new())
    }

    /// Seed a file under `parent` and return its id.
    pub fn insert_file(&self, parent: &str, name: &str, content: &[u8]) -> String {
        let mut inner = self.inner.lock();
        self.insert_locked(
            &mut inner,
            parent,
            name,
            "application/octet-stream",
            content.to_vec(),
        )
    }

    /// Names of the children of `parent`, in insertion order.
    pub fn names_in(&self, parent: &str) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.objects.get(id))
            .filter(|object| object.parent == parent)
            .map(|object| object.entry.name.clone())
            .collect()
    }

    pub fn contains(&self, parent: &str, name: &str) -> bool {
        self.names_in(parent).iter().any(|existing| existing == name)
    }

    pub fn content_of(&self, id: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .objects
            .get(id)
            .map(|object| object.content.clone())
    }

    pub fn id_of(&self, parent: &str, name: &str) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .objects
            .values()
            .find(|object| object.parent == parent && object.entry.name == name)
            .map(|object| object.entry.id.clone())
    }

    /// Override the modification timestamp of an object.
    pub fn set_modified_at(&self, id: &str, modified_at: DateTime<Utc>) {
        if let Some(object) = self.inner.lock().objects.get_mut(id) {
            object.entry.modified_at = Some(modified_at);
        }
    }

    /// Make every subsequent plain upload fail with an API error carrying
    /// `message`. Conditional creates, which carry markers, still succeed.
    pub fn fail_uploads_with(&self, message: impl Into<String>) {
        self.inner.lock().upload_failure = Some(message.into());
    }

    pub fn clear_upload_failure(&self) {
        self.inner.lock().upload_failure = None;
    }

    pub fn upload_count(&self) -> u64 {
        self.inner.lock().uploads
    }

    pub fn delete_count(&self) -> u64 {
        self.inner.lock().deletes
    }

    async fn read_local(local: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(local)
            .await
            .map_err(|source| StoreError::io(local, source))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.objects.get(id))
            .filter(|object| object.parent == folder_id)
            .map(|object| object.entry.clone())
            .collect())
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        Ok(self.add_folder(parent_id, name))
    }

    async fn upload(&self, local: &Path, folder_id: &str, mime_type: &str) -> Result<String> {
        let name = file_name_of(local)?;
        let content = Self::read_local(local).await?;

        let mut inner = self.inner.lock();
        if let Some(message) = inner.upload_failure.clone() {
            return Err(StoreError::Api {
                status: 403,
                message,
            });
        }
        inner.uploads += 1;
        Ok(self.insert_locked(&mut inner, folder_id, &name, mime_type, content))
    }

    async fn download(&self, id: &str, local: &Path) -> Result<()> {
        let content = self
            .content_of(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        tokio::fs::write(local, content)
            .await
            .map_err(|source| StoreError::io(local, source))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.objects.remove(id).is_some() {
            inner.order.retain(|existing| existing != id);
            inner.deletes += 1;
        }
        Ok(())
    }

    async fn touch(&self, id: &str) -> Result<()> {
        let now = self.tick();
        let mut inner = self.inner.lock();
        let object = inner
            .objects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        object.entry.modified_at = Some(now);
        Ok(())
    }

    async fn create_if_absent(
        &self,
        local: &Path,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<CreateOutcome> {
        let name = file_name_of(local)?;
        let content = Self::read_local(local).await?;

        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .objects
            .values()
            .find(|object| object.parent == folder_id && object.entry.name == name)
        {
            return Ok(CreateOutcome::Existing(existing.entry.clone()));
        }
        inner.uploads += 1;
        let id = self.insert_locked(&mut inner, folder_id, &name, mime_type, content);
        Ok(CreateOutcome::Created(id))
    }
}
