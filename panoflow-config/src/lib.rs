//! Layered configuration for the panoflow worker.
//!
//! Values resolve from environment variables (optionally seeded from a
//! `.env` file), then a TOML file, then built-in defaults.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigPathProvenance, ConfigPathSource,
};
pub use models::{
    Config, ConfigMetadata, DriveConfig, DriveTarget, NotifyConfig,
    PhotosConfig, ToolsConfig, WorkerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
