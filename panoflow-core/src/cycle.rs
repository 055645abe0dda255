//! The worker's poll cycle.
//!
//! One cycle claims at most one job across all shoot folders, carries it
//! through download, conversion and publication, and always finishes with
//! the reconciliation sweep. Failures are collected per stage instead of
//! aborting the loop.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::assets::{JobFolder, MarkerState};
use crate::backoff::{BackoffScheduler, is_quota_exhausted};
use crate::classify::classify;
use crate::convert::{ConversionOrchestrator, ConverterSettings};
use crate::error::StoreError;
use crate::inspect::{FolderStatus, inspect_folder};
use crate::job::{ConversionJob, CycleContext, JobStatus};
use crate::lease::{Heartbeat, LeaseManager};
use crate::ports::{MediaLibrary, Notifier};
use crate::publish::{PublishError, PublishStep};
use crate::select::JobSelector;
use crate::store::RemoteStore;
use crate::sweep::{ReconciliationSweep, SweepReport};

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    ListFolders,
    /// Local work directory setup.
    Prepare,
    Inspect,
    Claim,
    Download,
    Convert,
    Metadata,
    Upload,
    Library,
    Finalize,
    Sweep,
}

impl Stage {
    /// Whether failures in this stage are worth an operator notification.
    ///
    /// Listing and claim failures are transient and simply retried next
    /// cycle.
    pub fn notifies(self) -> bool {
        !matches!(
            self,
            Stage::ListFolders | Stage::Inspect | Stage::Claim | Stage::Sweep
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ListFolders => "list-folders",
            Stage::Prepare => "prepare",
            Stage::Inspect => "inspect",
            Stage::Claim => "claim",
            Stage::Download => "download",
            Stage::Convert => "convert",
            Stage::Metadata => "metadata",
            Stage::Upload => "upload",
            Stage::Library => "library",
            Stage::Finalize => "finalize",
            Stage::Sweep => "sweep",
        };
        f.write_str(name)
    }
}

/// A failure recorded during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub folder: Option<String>,
    pub asset: Option<String>,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            stage,
            folder: None,
            asset: None,
            message: err.to_string(),
        }
    }

    pub fn in_folder(mut self, folder: &JobFolder) -> Self {
        self.folder = Some(folder.name.clone());
        self
    }

    pub fn for_asset(mut self, asset: &str) -> Self {
        self.asset = Some(asset.to_string());
        self
    }

    pub fn is_quota_exceeded(&self) -> bool {
        is_quota_exhausted(&self.message)
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.stage)?;
        if let Some(folder) = &self.folder {
            write!(f, " in {folder}")?;
        }
        if let Some(asset) = &self.asset {
            write!(f, " for {asset}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for StageError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    /// Nothing claimable anywhere.
    #[default]
    Idle,
    /// A job was published and marked done.
    Completed,
    /// A job was marked broken.
    Broken,
    /// A job was claimed and given up; it will be retried.
    Abandoned,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub folder: Option<String>,
    pub asset: Option<String>,
    /// Last stage entered; attributed to panics.
    pub reached: Option<Stage>,
    pub errors: Vec<StageError>,
    /// Left videos that can never pair, across all scanned folders.
    pub orphans: Vec<String>,
    pub sweep: Option<SweepReport>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record(&mut self, err: StageError) {
        warn!(
            target: "panoflow::cycle",
            stage = %err.stage,
            folder = err.folder.as_deref().unwrap_or("-"),
            asset = err.asset.as_deref().unwrap_or("-"),
            error = %err.message,
            "Stage failed"
        );
        self.errors.push(err);
    }
}

/// Tunables for the worker, independent of where they were loaded from.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Remote folder whose child folders are scanned for jobs.
    pub root_folder_id: String,
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    pub quota_cooldown: Duration,
    pub lease_ttl: Duration,
    pub heartbeat_interval: Duration,
    pub converter: ConverterSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            root_folder_id: String::new(),
            work_dir: std::env::temp_dir().join("panoflow"),
            poll_interval: Duration::from_secs(3),
            quota_cooldown: Duration::from_secs(86_400),
            lease_ttl: Duration::from_secs(6 * 3600),
            heartbeat_interval: Duration::from_secs(10 * 60),
            converter: ConverterSettings::default(),
        }
    }
}

/// Owns every collaborator the cycle needs. There is no global state; two
/// workers in one process are fully independent.
pub struct Worker {
    settings: WorkerSettings,
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    selector: JobSelector,
    leases: LeaseManager,
    orchestrator: ConversionOrchestrator,
    publisher: PublishStep,
    sweep: ReconciliationSweep,
    backoff: BackoffScheduler,
    rng: StdRng,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("settings", &self.settings)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        settings: WorkerSettings,
        store: Arc<dyn RemoteStore>,
        library: Arc<dyn MediaLibrary>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let leases = LeaseManager::new(store.clone(), settings.work_dir.clone());
        Self {
            selector: JobSelector::new(settings.lease_ttl),
            orchestrator: ConversionOrchestrator::new(settings.converter.clone()),
            publisher: PublishStep::new(store.clone(), library, leases.clone()),
            sweep: ReconciliationSweep::new(leases.clone()),
            backoff: BackoffScheduler::new(settings.poll_interval, settings.quota_cooldown),
            leases,
            store,
            notifier,
            settings,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replace the shuffle source, e.g. with a seeded generator in tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Poll until `shutdown` resolves. A running cycle is always finished
    /// before the loop exits.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        info!(
            target: "panoflow::cycle",
            root = %self.settings.root_folder_id,
            work_dir = %self.settings.work_dir.display(),
            "Worker started"
        );

        loop {
            let report = self.run_cycle().await;
            self.backoff.observe(&report);
            let delay = self.backoff.next_delay();

            tokio::select! {
                _ = &mut shutdown => {
                    info!(target: "panoflow::cycle", "Shutdown requested; worker stopping");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One full poll cycle. Never fails; problems end up in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut ctx = CycleContext::new(&self.settings.work_dir);
        let mut report = CycleReport::default();

        let driven = AssertUnwindSafe(self.drive_cycle(&mut ctx, &mut report))
            .catch_unwind()
            .await;
        if let Err(panic) = driven {
            let stage = report.reached.unwrap_or(Stage::ListFolders);
            error!(
                target: "panoflow::cycle",
                stage = %stage,
                "Cycle panicked"
            );
            report.record(StageError::new(
                stage,
                format!("panic: {}", panic_message(panic.as_ref())),
            ));
            if ctx.job.is_some() {
                ctx.set_status(JobStatus::Abandoned);
                report.outcome = CycleOutcome::Abandoned;
            }
        }

        let sweep = self.sweep.run(&ctx).await;
        if let Some(err) = &sweep.release_error {
            report.record(StageError::new(Stage::Sweep, err));
        }
        report.sweep = Some(sweep);

        self.notify_failures(&report).await;

        report.elapsed = started.elapsed();
        info!(
            target: "panoflow::cycle",
            outcome = ?report.outcome,
            folder = report.folder.as_deref().unwrap_or("-"),
            asset = report.asset.as_deref().unwrap_or("-"),
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle finished"
        );
        report
    }

    /// Summaries of every job folder under the root.
    pub async fn status(&self) -> Result<Vec<FolderStatus>, StoreError> {
        let folders = self.job_folders().await?;
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(folders.len());
        for folder in &folders {
            statuses.push(inspect_folder(self.store.as_ref(), folder, self.settings.lease_ttl, now).await?);
        }
        Ok(statuses)
    }

    async fn job_folders(&self) -> Result<Vec<JobFolder>, StoreError> {
        Ok(self
            .store
            .list(&self.settings.root_folder_id)
            .await?
            .iter()
            .filter(|entry| entry.is_folder())
            .map(JobFolder::from)
            .collect())
    }

    async fn drive_cycle(&mut self, ctx: &mut CycleContext, report: &mut CycleReport) {
        report.reached = Some(Stage::ListFolders);
        let folders = match self.job_folders().await {
            Ok(folders) => folders,
            Err(err) => {
                report.record(StageError::new(Stage::ListFolders, err));
                return;
            }
        };
        debug!(target: "panoflow::cycle", folders = folders.len(), "Scanning job folders");

        report.reached = Some(Stage::Prepare);
        if let Err(err) = tokio::fs::create_dir_all(&ctx.work_dir).await {
            report.record(StageError::new(
                Stage::Prepare,
                format!("work directory {} unavailable: {err}", ctx.work_dir.display()),
            ));
            return;
        }

        let Some(job) = self.claim_first(&folders, report).await else {
            return;
        };
        report.folder = Some(job.folder.name.clone());
        report.asset = Some(job.asset_name().to_string());
        ctx.attach(job.clone());

        // Renewed from claim until the terminal marker is about to be written;
        // dropping the handle on an early return stops it as well.
        let mut heartbeat = job
            .lease
            .clone()
            .map(|lease| self.leases.spawn_heartbeat(lease, self.settings.heartbeat_interval));

        report.reached = Some(Stage::Download);
        if let Err(err) = self.download_inputs(&job, ctx).await {
            report.record(StageError::new(Stage::Download, err).in_folder(&job.folder).for_asset(job.asset_name()));
            self.abandon(ctx, report);
            return;
        }

        report.reached = Some(Stage::Convert);
        let converted = self.orchestrator.run(&job, &ctx.work_dir, &ctx.paths).await;

        let outcome = match converted {
            Ok(outcome) => outcome,
            Err(reason) => {
                let stage = if reason.is_metadata() {
                    Stage::Metadata
                } else {
                    Stage::Convert
                };
                report.record(StageError::new(stage, &reason).in_folder(&job.folder).for_asset(job.asset_name()));
                stop_heartbeat(&mut heartbeat);
                self.mark_broken(&job, ctx, report).await;
                return;
            }
        };

        if let Some(warning) = &outcome.metadata_warning {
            report.record(
                StageError::new(Stage::Metadata, warning)
                    .in_folder(&job.folder)
                    .for_asset(job.asset_name()),
            );
        }
        ctx.set_status(JobStatus::Converted);

        report.reached = Some(Stage::Upload);
        match self.publisher.publish(&job, &outcome.artifact).await {
            Ok(published) => {
                if let Some(err) = published.library_error {
                    report.record(StageError::new(Stage::Library, err).in_folder(&job.folder).for_asset(job.asset_name()));
                }
                ctx.set_status(JobStatus::Published);
            }
            Err(err) => {
                report.record(StageError::new(Stage::Upload, err).in_folder(&job.folder).for_asset(job.asset_name()));
                self.abandon(ctx, report);
                return;
            }
        }

        stop_heartbeat(&mut heartbeat);
        report.reached = Some(Stage::Finalize);
        match self.publisher.finalize(&job).await {
            Ok(_) => {
                ctx.set_status(JobStatus::Done);
                report.outcome = CycleOutcome::Completed;
                info!(
                    target: "panoflow::cycle",
                    folder = %job.folder.name,
                    asset = %job.asset_name(),
                    output = %job.output_name,
                    "Job done"
                );
            }
            Err(err) => {
                report.record(StageError::new(Stage::Finalize, err).in_folder(&job.folder).for_asset(job.asset_name()));
                self.abandon(ctx, report);
            }
        }
    }

    /// Walk folders in listing order until one claim succeeds.
    async fn claim_first(&mut self, folders: &[JobFolder], report: &mut CycleReport) -> Option<ConversionJob> {
        for folder in folders {
            report.reached = Some(Stage::Inspect);
            let listing = match self.store.list(&folder.remote_id).await {
                Ok(listing) => listing,
                Err(err) => {
                    report.record(StageError::new(Stage::Inspect, err).in_folder(folder));
                    continue;
                }
            };

            let inventory = classify(&listing);
            let selection = self.selector.select(&inventory, &mut self.rng, Utc::now());
            for orphan in &selection.orphans {
                warn!(
                    target: "panoflow::cycle",
                    folder = %folder.name,
                    asset = %orphan,
                    "Left video has no right counterpart; it will never be processed"
                );
            }
            report.orphans.extend(selection.orphans.iter().cloned());

            let Some(candidate) = selection.candidate else {
                continue;
            };

            report.reached = Some(Stage::Claim);
            match self.leases.acquire(folder, &candidate).await {
                Ok(lease) => return Some(ConversionJob::claimed(candidate, folder.clone(), lease)),
                Err(err) if err.is_contended() => {
                    info!(
                        target: "panoflow::cycle",
                        folder = %folder.name,
                        asset = %candidate.asset_name(),
                        "Candidate claimed elsewhere; moving on"
                    );
                }
                Err(err) => {
                    report.record(
                        StageError::new(Stage::Claim, err)
                            .in_folder(folder)
                            .for_asset(candidate.asset_name()),
                    );
                }
            }
        }
        None
    }

    async fn download_inputs(&self, job: &ConversionJob, ctx: &CycleContext) -> Result<(), StoreError> {
        let started = Instant::now();
        if let Some(path) = &ctx.paths.left_input {
            self.store.download(&job.left.remote_id, path).await?;
        }
        if let (Some(right), Some(path)) = (&job.right, &ctx.paths.right_input) {
            self.store.download(&right.remote_id, path).await?;
        }
        info!(
            target: "panoflow::cycle",
            folder = %job.folder.name,
            asset = %job.asset_name(),
            pair = job.right.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inputs downloaded"
        );
        Ok(())
    }

    async fn mark_broken(&self, job: &ConversionJob, ctx: &mut CycleContext, report: &mut CycleReport) {
        match self
            .leases
            .mark(&job.folder, job.asset_name(), MarkerState::Broken)
            .await
        {
            Ok(_) => {
                ctx.set_status(JobStatus::Broken);
                report.outcome = CycleOutcome::Broken;
            }
            Err(err) => {
                report.record(StageError::new(Stage::Finalize, err).in_folder(&job.folder).for_asset(job.asset_name()));
                self.abandon(ctx, report);
            }
        }
    }

    fn abandon(&self, ctx: &mut CycleContext, report: &mut CycleReport) {
        ctx.set_status(JobStatus::Abandoned);
        report.outcome = CycleOutcome::Abandoned;
    }

    async fn notify_failures(&self, report: &CycleReport) {
        for err in report.errors.iter().filter(|err| err.stage.notifies()) {
            let subject = format!("panoflow: {} failed", err.stage);
            if let Err(notify_err) = self.notifier.notify(&subject, &err.to_string()).await {
                warn!(
                    target: "panoflow::cycle",
                    error = %notify_err,
                    "Failed to send notification"
                );
            }
        }
    }
}

fn stop_heartbeat(heartbeat: &mut Option<Heartbeat>) {
    if let Some(heartbeat) = heartbeat.take() {
        heartbeat.stop();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockMediaLibrary, MockNotifier, NoopLibrary};
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(work_dir: &std::path::Path, root: &str) -> WorkerSettings {
        WorkerSettings {
            root_folder_id: root.to_string(),
            work_dir: work_dir.to_path_buf(),
            ..WorkerSettings::default()
        }
    }

    #[tokio::test]
    async fn idle_cycle_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.add_folder("root", "empty-shoot");

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let mut worker = Worker::new(
            settings(dir.path(), "root"),
            Arc::new(store),
            Arc::new(NoopLibrary),
            Arc::new(notifier),
        )
        .with_rng(StdRng::seed_from_u64(1));

        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Idle);
        assert!(!report.has_errors());
        assert!(report.sweep.is_some());
    }

    #[tokio::test]
    async fn download_failure_abandons_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let folder = store.add_folder("root", "shoot");
        store.insert_file(&folder, "p_00_y.insp", b"raw");
        let raw_id = store.id_of(&folder, "p_00_y.insp").unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|subject, _| subject.contains("download"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut library = MockMediaLibrary::new();
        library.expect_upload_to_album().never();

        let mut worker = Worker::new(
            settings(dir.path(), "root"),
            Arc::new(FailingDownloads::new(store.clone(), raw_id)),
            Arc::new(library),
            Arc::new(notifier),
        )
        .with_rng(StdRng::seed_from_u64(1));

        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Abandoned);
        assert_eq!(report.errors[0].stage, Stage::Download);
        assert!(report.sweep.as_ref().unwrap().lease_released);
        assert_eq!(store.names_in(&folder), vec!["p_00_y.insp".to_string()]);
    }

    #[tokio::test]
    async fn lease_is_renewed_while_inputs_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let folder = store.add_folder("root", "shoot");
        store.insert_file(&folder, "p_00_y.insp", b"raw");
        let raw_id = store.id_of(&folder, "p_00_y.insp").unwrap();

        let mut slow = FailingDownloads::new(store.clone(), raw_id);
        slow.delay = Duration::from_millis(300);
        let touches = slow.touches.clone();

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _| Ok(()));

        let mut worker = Worker::new(
            WorkerSettings {
                heartbeat_interval: Duration::from_millis(20),
                ..settings(dir.path(), "root")
            },
            Arc::new(slow),
            Arc::new(NoopLibrary),
            Arc::new(notifier),
        )
        .with_rng(StdRng::seed_from_u64(1));

        let report = worker.run_cycle().await;
        assert_eq!(report.errors[0].stage, Stage::Download);
        assert!(touches.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn unusable_work_dir_is_reported_to_the_operator() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let store = MemoryStore::new();
        store.add_folder("root", "shoot");

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|subject, _| subject.contains("prepare"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut worker = Worker::new(
            settings(&blocker.join("work"), "root"),
            Arc::new(store),
            Arc::new(NoopLibrary),
            Arc::new(notifier),
        );

        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Idle);
        assert_eq!(report.errors[0].stage, Stage::Prepare);
        assert!(Stage::Prepare.notifies());
    }

    #[tokio::test]
    async fn quota_upload_failure_arms_cooldown() {
        let mut backoff = BackoffScheduler::new(Duration::from_secs(3), Duration::from_secs(60));
        let mut report = CycleReport::default();
        report.record(StageError::new(
            Stage::Upload,
            PublishError::Upload(StoreError::Api {
                status: 403,
                message: "The user's Drive storage quota has been exceeded.".into(),
            }),
        ));
        assert!(report.errors[0].is_quota_exceeded());
        backoff.observe(&report);
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[test]
    fn stage_error_display_includes_context() {
        let err = StageError::new(Stage::Convert, "exit 1")
            .in_folder(&JobFolder::new("f", "beach"))
            .for_asset("a_00_x.insv");
        assert_eq!(err.to_string(), "convert failed in beach for a_00_x.insv: exit 1");
    }

    /// Fails downloads of one object after `delay`, counting touches.
    struct FailingDownloads {
        inner: MemoryStore,
        id: String,
        delay: Duration,
        touches: Arc<AtomicUsize>,
    }

    impl FailingDownloads {
        fn new(inner: MemoryStore, id: String) -> Self {
            Self {
                inner,
                id,
                delay: Duration::ZERO,
                touches: Arc::default(),
            }
        }
    }

    #[async_trait::async_trait]
    impl RemoteStore for FailingDownloads {
        async fn list(&self, folder_id: &str) -> crate::error::Result<Vec<crate::store::RemoteEntry>> {
            self.inner.list(folder_id).await
        }

        async fn create_folder(&self, name: &str, parent_id: &str) -> crate::error::Result<String> {
            self.inner.create_folder(name, parent_id).await
        }

        async fn upload(&self, local: &std::path::Path, folder_id: &str, mime: &str) -> crate::error::Result<String> {
            self.inner.upload(local, folder_id, mime).await
        }

        async fn download(&self, id: &str, local: &std::path::Path) -> crate::error::Result<()> {
            if id == self.id {
                tokio::time::sleep(self.delay).await;
                return Err(StoreError::Transport("connection reset by peer".into()));
            }
            self.inner.download(id, local).await
        }

        async fn delete(&self, id: &str) -> crate::error::Result<()> {
            self.inner.delete(id).await
        }

        async fn touch(&self, id: &str) -> crate::error::Result<()> {
            self.touches.fetch_add(1, Ordering::SeqCst);
            self.inner.touch(id).await
        }

        async fn create_if_absent(
            &self,
            local: &std::path::Path,
            folder_id: &str,
            mime: &str,
        ) -> crate::error::Result<crate::store::CreateOutcome> {
            self.inner.create_if_absent(local, folder_id, mime).await
        }
    }
}
