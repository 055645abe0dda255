//! Read-only folder summaries for operators.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assets::{JobFolder, right_eye_name};
use crate::classify::{FolderInventory, classify};
use crate::error::Result;
use crate::store::RemoteStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderStatus {
    pub folder: String,
    pub pending_pairs: usize,
    pub pending_photos: usize,
    pub orphans: Vec<String>,
    pub processing_live: usize,
    pub processing_stale: usize,
    pub done: usize,
    pub broken: usize,
    pub ignored: usize,
}

impl FolderStatus {
    pub fn from_inventory(
        folder: &JobFolder,
        inventory: &FolderInventory,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> Self {
        let mut status = FolderStatus {
            folder: folder.name.clone(),
            done: inventory.done.len(),
            broken: inventory.broken.len(),
            ignored: inventory.ignored,
            ..FolderStatus::default()
        };

        for markers in inventory.processing.values() {
            for marker in markers {
                if marker.is_stale(now, lease_ttl) {
                    status.processing_stale += 1;
                } else {
                    status.processing_live += 1;
                }
            }
        }

        for left in &inventory.left_videos {
            let paired = inventory
                .right_videos
                .contains_key(&right_eye_name(&left.file_name));
            if !paired {
                if !inventory.has_any_marker(&left.file_name) {
                    status.orphans.push(left.file_name.clone());
                }
            } else if !inventory.is_blocked(&left.file_name, now, lease_ttl) {
                status.pending_pairs += 1;
            }
        }

        status.pending_photos = inventory
            .left_photos
            .iter()
            .filter(|photo| !inventory.is_blocked(&photo.file_name, now, lease_ttl))
            .count();

        status.orphans.sort();
        status
    }

    pub fn pending(&self) -> usize {
        self.pending_pairs + self.pending_photos
    }
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pairs and {} photos pending, {} processing ({} stale), {} done, {} broken",
            self.folder,
            self.pending_pairs,
            self.pending_photos,
            self.processing_live + self.processing_stale,
            self.processing_stale,
            self.done,
            self.broken
        )?;
        if !self.orphans.is_empty() {
            write!(f, ", orphans: {}", self.orphans.join(", "))?;
        }
        Ok(())
    }
}

/// List `folder` and summarise what the selector would see.
pub async fn inspect_folder(
    store: &dyn RemoteStore,
    folder: &JobFolder,
    lease_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<FolderStatus> {
    let listing = store.list(&folder.remote_id).await?;
    Ok(FolderStatus::from_inventory(
        folder,
        &classify(&listing),
        now,
        lease_ttl,
    ))
}
