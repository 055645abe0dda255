use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assets::{AssetKind, JobFolder, MarkerState, RawAsset, converted_name, output_name};
use crate::lease::Lease;
use crate::select::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Claimed,
    Converted,
    Published,
    Done,
    Broken,
    /// Gave up for this cycle without a terminal marker; the lease is
    /// released so the asset can be retried.
    Abandoned,
}

impl JobStatus {
    pub fn releases_lease(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Broken | JobStatus::Abandoned)
    }
}

/// One claimed unit of work. Lives for a single cycle.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub left: RawAsset,
    pub right: Option<RawAsset>,
    pub folder: JobFolder,
    pub lease: Option<Lease>,
    pub kind: AssetKind,
    pub convert_name: String,
    pub output_name: String,
    pub status: JobStatus,
}

impl ConversionJob {
    pub fn claimed(candidate: Candidate, folder: JobFolder, lease: Lease) -> Self {
        let kind = candidate.left.kind;
        Self {
            convert_name: converted_name(&candidate.left.file_name, kind),
            output_name: output_name(&candidate.left.file_name, kind),
            left: candidate.left,
            right: candidate.right,
            folder,
            lease: Some(lease),
            kind,
            status: JobStatus::Claimed,
        }
    }

    pub fn asset_name(&self) -> &str {
        &self.left.file_name
    }
}

/// Every local path a cycle can touch, resolved before any stage runs.
///
/// Paths that do not apply to the current job stay `None`, so cleanup can
/// walk the whole set unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPaths {
    pub left_input: Option<PathBuf>,
    pub right_input: Option<PathBuf>,
    pub converted: Option<PathBuf>,
    /// Backup copy left behind by exiftool (`<converted>_original`).
    pub metadata_sidecar: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub marker_scratch: Vec<PathBuf>,
}

impl JobPaths {
    pub fn for_job(work_dir: &Path, job: &ConversionJob) -> Self {
        let converted = work_dir.join(&job.convert_name);
        let sidecar = work_dir.join(format!("{}_original", job.convert_name));
        Self {
            left_input: Some(work_dir.join(&job.left.file_name)),
            right_input: job.right.as_ref().map(|right| work_dir.join(&right.file_name)),
            converted: Some(converted),
            metadata_sidecar: Some(sidecar),
            output: Some(work_dir.join(&job.output_name)),
            marker_scratch: MarkerState::ALL
                .iter()
                .map(|state| work_dir.join(crate::assets::marker_name(job.asset_name(), *state)))
                .collect(),
        }
    }

    /// All resolved paths, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.left_input
            .iter()
            .chain(self.right_input.iter())
            .chain(self.converted.iter())
            .chain(self.metadata_sidecar.iter())
            .chain(self.output.iter())
            .chain(self.marker_scratch.iter())
    }
}

/// Per-cycle state threaded through every stage.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub work_dir: PathBuf,
    pub job: Option<ConversionJob>,
    pub paths: JobPaths,
}

impl CycleContext {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            job: None,
            paths: JobPaths::default(),
        }
    }

    /// Install the claimed job and resolve its paths.
    pub fn attach(&mut self, job: ConversionJob) {
        self.paths = JobPaths::for_job(&self.work_dir, &job);
        self.job = Some(job);
    }

    pub fn set_status(&mut self, status: JobStatus) {
        if let Some(job) = self.job.as_mut() {
            job.status = status;
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|job| job.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RemoteEntry;
    use chrono::Utc;

    fn job(left: &str, right: Option<&str>) -> ConversionJob {
        let folder = JobFolder::new("f", "shoot");
        let candidate = Candidate {
            left: RawAsset::parse(&RemoteEntry::file("l", left)).unwrap(),
            right: right.map(|name| RawAsset::parse(&RemoteEntry::file("r", name)).unwrap()),
            stale_leases: Vec::new(),
        };
        let lease = Lease {
            marker_id: "m".into(),
            marker_name: format!("{left}.auto_processing"),
            asset_name: left.into(),
            folder: folder.clone(),
            acquired_at: Utc::now(),
        };
        ConversionJob::claimed(candidate, folder, lease)
    }

    #[test]
    fn paths_cover_every_artifact_of_a_pair() {
        let job = job("s_00_x.insv", Some("s_10_x.insv"));
        let paths = JobPaths::for_job(Path::new("/work"), &job);

        assert_eq!(paths.converted.as_deref(), Some(Path::new("/work/s_00_x_convert.mp4")));
        assert_eq!(
            paths.metadata_sidecar.as_deref(),
            Some(Path::new("/work/s_00_x_convert.mp4_original"))
        );
        assert_eq!(paths.output.as_deref(), Some(Path::new("/work/s_00_x.mp4")));
        assert_eq!(paths.iter().count(), 5 + MarkerState::ALL.len());
    }

    #[test]
    fn photo_has_no_right_input() {
        let job = job("p_00_y.insp", None);
        let paths = JobPaths::for_job(Path::new("/work"), &job);
        assert!(paths.right_input.is_none());
        assert_eq!(job.output_name, "p_00_y.jpg");
    }

    #[test]
    fn empty_context_has_no_paths() {
        let ctx = CycleContext::new("/work");
        assert_eq!(ctx.paths.iter().count(), 0);
        assert!(ctx.status().is_none());
    }
}
