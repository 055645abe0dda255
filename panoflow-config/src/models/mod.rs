pub mod sources;

use std::path::PathBuf;
use std::time::Duration;

use panoflow_core::{ConverterSettings, MetadataFailurePolicy, ToolPaths, WorkerSettings};

use crate::validation::ConfigGuardRailError;

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2 * 3600);

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub drive: DriveConfig,
    pub tools: ToolsConfig,
    pub worker: WorkerConfig,
    pub photos: Option<PhotosConfig>,
    pub notify: Option<NotifyConfig>,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub drive_id: Option<String>,
    pub working_folder_id: Option<String>,
    pub credentials_path: PathBuf,
    pub api_base: String,
}

/// Drive ids that must be present before the worker can touch the drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveTarget {
    pub drive_id: String,
    pub working_folder_id: String,
}

impl DriveConfig {
    pub fn require_drive_id(&self) -> Result<&str, ConfigGuardRailError> {
        self.drive_id
            .as_deref()
            .ok_or(ConfigGuardRailError::MissingDriveSetting {
                field: "PANOFLOW_DRIVE_ID",
            })
    }

    pub fn require_target(&self) -> Result<DriveTarget, ConfigGuardRailError> {
        let drive_id = self.require_drive_id()?.to_string();
        let working_folder_id = self.working_folder_id.clone().ok_or(
            ConfigGuardRailError::MissingDriveSetting {
                field: "PANOFLOW_WORKING_FOLDER_ID",
            },
        )?;
        Ok(DriveTarget {
            drive_id,
            working_folder_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub paths: ToolPaths,
    pub tool_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    pub quota_cooldown: Duration,
    pub lease_ttl: Duration,
    pub heartbeat_interval: Duration,
    pub store_timeout: Duration,
    pub metadata_policy: MetadataFailurePolicy,
}

#[derive(Debug, Clone)]
pub struct PhotosConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct NotifyConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub mail_to: Vec<String>,
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mail_to", &self.mail_to)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    /// Settings for the core worker rooted at `root_folder_id`.
    pub fn worker_settings(&self, root_folder_id: impl Into<String>) -> WorkerSettings {
        WorkerSettings {
            root_folder_id: root_folder_id.into(),
            work_dir: self.worker.work_dir.clone(),
            poll_interval: self.worker.poll_interval,
            quota_cooldown: self.worker.quota_cooldown,
            lease_ttl: self.worker.lease_ttl,
            heartbeat_interval: self.worker.heartbeat_interval,
            converter: ConverterSettings {
                tools: self.tools.paths.clone(),
                tool_timeout: self.tools.tool_timeout,
                metadata_policy: self.worker.metadata_policy,
            },
        }
    }
}
