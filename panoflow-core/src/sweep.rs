//! End-of-cycle cleanup.
//!
//! Runs after every cycle whatever happened before it. Local files are
//! removed best effort and the lease is given back once the job reached a
//! state that no longer needs it.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::job::CycleContext;
use crate::lease::{LeaseError, LeaseManager};

#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub crash_dumps_removed: usize,
    pub lease_released: bool,
    pub release_error: Option<LeaseError>,
}

#[derive(Debug, Clone)]
pub struct ReconciliationSweep {
    leases: LeaseManager,
}

impl ReconciliationSweep {
    pub fn new(leases: LeaseManager) -> Self {
        Self { leases }
    }

    pub async fn run(&self, ctx: &CycleContext) -> SweepReport {
        let mut report = SweepReport::default();

        for path in ctx.paths.iter() {
            if remove_if_present(path).await {
                report.removed.push(path.clone());
            }
        }

        report.crash_dumps_removed = remove_crash_dumps(&ctx.work_dir).await;

        if let Some(job) = ctx.job.as_ref()
            && job.status.releases_lease()
            && let Some(lease) = job.lease.as_ref()
        {
            match self.leases.release(lease).await {
                Ok(()) => report.lease_released = true,
                Err(err) => {
                    warn!(
                        target: "panoflow::cycle",
                        folder = %lease.folder.name,
                        asset = %lease.asset_name,
                        error = %err,
                        "Failed to release lease"
                    );
                    report.release_error = Some(err);
                }
            }
        }

        debug!(
            target: "panoflow::cycle",
            removed = report.removed.len(),
            crash_dumps = report.crash_dumps_removed,
            lease_released = report.lease_released,
            "Sweep finished"
        );
        report
    }
}

async fn remove_if_present(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!(
                target: "panoflow::cycle",
                path = %path.display(),
                error = %err,
                "Could not remove local file"
            );
            false
        }
    }
}

/// Core dumps left by a crashing stitcher: `core` or `core.<pid>`.
fn is_crash_dump(name: &str) -> bool {
    name == "core" || name.starts_with("core.")
}

async fn remove_crash_dumps(work_dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(
                target: "panoflow::cycle",
                dir = %work_dir.display(),
                error = %err,
                "Work directory not readable"
            );
            return 0;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if is_crash_dump(&name.to_string_lossy()) && remove_if_present(&entry.path()).await {
            removed += 1;
        }
    }
    removed
}
