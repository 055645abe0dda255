//! Marker-file leases.
//!
//! A lease is nothing more than the existence of a
//! `<asset>.auto_processing` object in the job folder. Claims go through the
//! store's conditional create and are then verified against a fresh listing
//! so that two workers racing on a non-atomic store converge on one winner.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assets::{JobFolder, MARKER_MIME_TYPE, MarkerState, is_local_file_name, marker_name};
use crate::error::StoreError;
use crate::select::Candidate;
use crate::store::{CreateOutcome, RemoteEntry, RemoteStore};

/// Shortest renewal period a heartbeat will run with.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Proof that this worker holds the processing marker for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub marker_id: String,
    pub marker_name: String,
    pub asset_name: String,
    pub folder: JobFolder,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("asset {asset} is already claimed by another worker")]
    Contended { asset: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("asset name {name:?} is not usable as a local file name")]
    UnsafeName { name: String },

    #[error("failed to write marker scratch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LeaseError {
    pub fn is_contended(&self) -> bool {
        matches!(self, LeaseError::Contended { .. })
    }
}

#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn RemoteStore>,
    scratch_dir: PathBuf,
}

impl std::fmt::Debug for LeaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseManager")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl LeaseManager {
    pub fn new(store: Arc<dyn RemoteStore>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Local path used to stage the marker for `asset_name` in `state`.
    ///
    /// Fails for names that would land outside the scratch directory.
    pub fn scratch_path(&self, asset_name: &str, state: MarkerState) -> Result<PathBuf, LeaseError> {
        let name = marker_name(asset_name, state);
        if !is_local_file_name(&name) {
            return Err(LeaseError::UnsafeName {
                name: asset_name.to_string(),
            });
        }
        Ok(self.scratch_dir.join(name))
    }

    /// Claim `candidate` inside `folder`.
    ///
    /// Expired processing markers listed on the candidate are removed first.
    /// If verification finds more than one processing marker, the one with
    /// the earliest `modified_at` (then lowest id) keeps the lease and every
    /// other claimant deletes its own marker.
    pub async fn acquire(&self, folder: &JobFolder, candidate: &Candidate) -> Result<Lease, LeaseError> {
        let asset = candidate.asset_name();
        let started = Instant::now();

        for stale in &candidate.stale_leases {
            info!(
                target: "panoflow::lease",
                folder = %folder.name,
                asset = %asset,
                marker_id = %stale.remote_id,
                "Reclaiming expired lease"
            );
            self.store.delete(&stale.remote_id).await?;
        }

        let local = self.stage_marker(asset, MarkerState::Processing).await?;
        let created = self
            .store
            .create_if_absent(&local, &folder.remote_id, MARKER_MIME_TYPE)
            .await;
        discard_scratch(&local).await;

        let marker_id = match created? {
            CreateOutcome::Created(id) => id,
            CreateOutcome::Existing(entry) => {
                debug!(
                    target: "panoflow::lease",
                    folder = %folder.name,
                    asset = %asset,
                    marker_id = %entry.id,
                    "Processing marker already present"
                );
                return Err(LeaseError::Contended {
                    asset: asset.to_string(),
                });
            }
        };

        let name = marker_name(asset, MarkerState::Processing);
        let listing = self.store.list(&folder.remote_id).await?;
        if let Some(winner) = claim_winner(&listing, &name)
            && winner.id != marker_id
        {
            warn!(
                target: "panoflow::lease",
                folder = %folder.name,
                asset = %asset,
                winner = %winner.id,
                "Lost claim race, withdrawing marker"
            );
            self.store.delete(&marker_id).await?;
            return Err(LeaseError::Contended {
                asset: asset.to_string(),
            });
        }

        info!(
            target: "panoflow::lease",
            folder = %folder.name,
            asset = %asset,
            marker_id = %marker_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lease acquired"
        );

        Ok(Lease {
            marker_id,
            marker_name: name,
            asset_name: asset.to_string(),
            folder: folder.clone(),
            acquired_at: Utc::now(),
        })
    }

    /// Heartbeat: bump the marker's modification time.
    pub async fn renew(&self, lease: &Lease) -> Result<(), LeaseError> {
        self.store.touch(&lease.marker_id).await?;
        debug!(
            target: "panoflow::lease",
            asset = %lease.asset_name,
            "Lease renewed"
        );
        Ok(())
    }

    /// Delete the processing marker. Releasing twice is fine.
    pub async fn release(&self, lease: &Lease) -> Result<(), LeaseError> {
        match self.store.delete(&lease.marker_id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                debug!(
                    target: "panoflow::lease",
                    folder = %lease.folder.name,
                    asset = %lease.asset_name,
                    "Lease released"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Upload a terminal marker (`done` or `broken`) for `asset_name`.
    pub async fn mark(
        &self,
        folder: &JobFolder,
        asset_name: &str,
        state: MarkerState,
    ) -> Result<String, LeaseError> {
        let local = self.stage_marker(asset_name, state).await?;
        let created = self
            .store
            .create_if_absent(&local, &folder.remote_id, MARKER_MIME_TYPE)
            .await;
        discard_scratch(&local).await;

        let id = match created? {
            CreateOutcome::Created(id) => id,
            CreateOutcome::Existing(entry) => entry.id,
        };
        info!(
            target: "panoflow::lease",
            folder = %folder.name,
            asset = %asset_name,
            state = %state,
            "Marker written"
        );
        Ok(id)
    }

    /// Renew `lease` every `interval` until the returned handle is stopped.
    ///
    /// Intervals below [`MIN_HEARTBEAT_INTERVAL`] are raised to it.
    pub fn spawn_heartbeat(&self, lease: Lease, interval: Duration) -> Heartbeat {
        let manager = self.clone();
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the lease is fresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = manager.renew(&lease).await {
                    warn!(
                        target: "panoflow::lease",
                        asset = %lease.asset_name,
                        error = %err,
                        "Lease heartbeat failed"
                    );
                }
            }
        });
        Heartbeat { handle }
    }

    async fn stage_marker(&self, asset_name: &str, state: MarkerState) -> Result<PathBuf, LeaseError> {
        let path = self.scratch_path(asset_name, state)?;
        tokio::fs::write(&path, b"")
            .await
            .map_err(|source| LeaseError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Background lease renewal; aborted when stopped or dropped.
#[derive(Debug)]
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The processing marker that keeps the lease when several exist.
fn claim_winner<'a>(listing: &'a [RemoteEntry], marker_name: &str) -> Option<&'a RemoteEntry> {
    listing
        .iter()
        .filter(|entry| entry.name == marker_name)
        .min_by(|a, b| {
            let a_key = (a.modified_at.unwrap_or(DateTime::<Utc>::MAX_UTC), &a.id);
            let b_key = (b.modified_at.unwrap_or(DateTime::<Utc>::MAX_UTC), &b.id);
            a_key.cmp(&b_key)
        })
}

async fn discard_scratch(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await
        && err.kind() != std::io::ErrorKind::NotFound
    {
        debug!(
            target: "panoflow::lease",
            path = %path.display(),
            error = %err,
            "Could not remove marker scratch file"
        );
    }
}
