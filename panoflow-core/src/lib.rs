//! Core library for panoflow.
//!
//! A worker watches per-shoot folders on a shared remote store, claims raw
//! stereo fisheye captures through zero-content marker objects, stitches
//! them with external tools and publishes the equirectangular result back
//! into the folder and into a media-library album.
//!
//! The store, the media library and the notifier are ports; the crate ships
//! an in-memory store and no-op/log-only implementations for the others.

pub mod assets;
pub mod backoff;
pub mod classify;
pub mod convert;
pub mod cycle;
pub mod error;
pub mod inspect;
pub mod job;
pub mod lease;
pub mod ports;
pub mod publish;
pub mod select;
pub mod store;
pub mod sweep;

pub use assets::{AssetKind, Eye, JobFolder, MarkerAsset, MarkerState, RawAsset};
pub use backoff::BackoffScheduler;
pub use classify::{FolderInventory, classify};
pub use convert::{
    BrokenReason, ConversionOrchestrator, ConverterSettings, MetadataFailurePolicy, ToolPaths,
};
pub use cycle::{CycleOutcome, CycleReport, Stage, StageError, Worker, WorkerSettings};
pub use error::{Result, StoreError};
pub use inspect::{FolderStatus, inspect_folder};
pub use job::{ConversionJob, CycleContext, JobStatus};
pub use lease::{Lease, LeaseError, LeaseManager};
pub use ports::{LibraryError, LogNotifier, MediaLibrary, NoopLibrary, Notifier, NotifyError};
pub use publish::{PublishError, PublishStep};
pub use select::{Candidate, JobSelector, SelectionReport};
pub use store::{CreateOutcome, MemoryStore, RemoteEntry, RemoteStore, TimedStore};
pub use sweep::{ReconciliationSweep, SweepReport};
