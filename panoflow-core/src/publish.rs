//! Republication of a finished artifact.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::assets::MarkerState;
use crate::error::StoreError;
use crate::job::ConversionJob;
use crate::lease::{LeaseError, LeaseManager};
use crate::ports::{LibraryError, MediaLibrary};
use crate::store::RemoteStore;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("artifact upload failed: {0}")]
    Upload(#[source] StoreError),

    #[error("failed to write done marker: {0}")]
    Finalize(#[source] LeaseError),
}

impl PublishError {
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            PublishError::Upload(err) => err.is_quota_exceeded(),
            PublishError::Finalize(LeaseError::Store(err)) => err.is_quota_exceeded(),
            PublishError::Finalize(_) => false,
        }
    }
}

#[derive(Debug)]
pub struct PublishReport {
    pub artifact_id: String,
    /// Album publication is best effort; its failure is reported, not fatal.
    pub library_error: Option<LibraryError>,
}

pub struct PublishStep {
    store: Arc<dyn RemoteStore>,
    library: Arc<dyn MediaLibrary>,
    leases: LeaseManager,
}

impl std::fmt::Debug for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishStep")
            .field("leases", &self.leases)
            .finish_non_exhaustive()
    }
}

impl PublishStep {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        library: Arc<dyn MediaLibrary>,
        leases: LeaseManager,
    ) -> Self {
        Self {
            store,
            library,
            leases,
        }
    }

    /// Upload `artifact` next to the raw files, then add it to the album
    /// named after the job folder.
    pub async fn publish(&self, job: &ConversionJob, artifact: &Path) -> Result<PublishReport, PublishError> {
        let started = Instant::now();

        let artifact_id = self
            .store
            .upload(artifact, &job.folder.remote_id, job.kind.stitched_mime_type())
            .await
            .map_err(PublishError::Upload)?;

        info!(
            target: "panoflow::cycle",
            folder = %job.folder.name,
            asset = %job.asset_name(),
            artifact = %job.output_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Artifact uploaded"
        );

        let library_error = match self.library.upload_to_album(artifact, &job.folder.name).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    target: "panoflow::cycle",
                    folder = %job.folder.name,
                    asset = %job.asset_name(),
                    error = %err,
                    "Album publication failed"
                );
                Some(err)
            }
        };

        Ok(PublishReport {
            artifact_id,
            library_error,
        })
    }

    /// Write the done marker; after this the asset is never selected again.
    pub async fn finalize(&self, job: &ConversionJob) -> Result<String, PublishError> {
        self.leases
            .mark(&job.folder, job.asset_name(), MarkerState::Done)
            .await
            .map_err(PublishError::Finalize)
    }
}
