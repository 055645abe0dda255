use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{parse_csv_var, path_var, string_var};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub drive: FileDriveConfig,
    #[serde(default)]
    pub tools: FileToolsConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
    pub photos: Option<FilePhotosConfig>,
    pub notify: Option<FileNotifyConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDriveConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stitcher_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exiftool_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatialmedia_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_cooldown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_failure_policy: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePhotosConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileNotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_to: Option<Vec<String>>,
}

/// Environment-derived configuration values.
///
/// Durations and the metadata policy stay raw here so the loader can report
/// which variable held an unparsable value.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub drive_id: Option<String>,
    pub working_folder_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub drive_api_base: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub stitcher_path: Option<PathBuf>,
    pub exiftool_path: Option<PathBuf>,
    pub python_path: Option<PathBuf>,
    pub spatialmedia_path: Option<PathBuf>,
    pub tool_timeout: Option<String>,
    pub poll_interval: Option<String>,
    pub quota_cooldown: Option<String>,
    pub lease_ttl: Option<String>,
    pub heartbeat_interval: Option<String>,
    pub store_timeout: Option<String>,
    pub metadata_policy: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_password_file: Option<PathBuf>,
    pub mail_to: Option<Vec<String>>,
    pub photos_client_id: Option<String>,
    pub photos_client_secret: Option<String>,
    pub photos_refresh_token: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: path_var("PANOFLOW_CONFIG"),
            drive_id: string_var("PANOFLOW_DRIVE_ID"),
            working_folder_id: string_var("PANOFLOW_WORKING_FOLDER_ID"),
            credentials_path: path_var("PANOFLOW_CREDENTIALS_PATH"),
            drive_api_base: string_var("PANOFLOW_DRIVE_API_BASE"),
            work_dir: path_var("PANOFLOW_WORK_DIR"),
            stitcher_path: path_var("PANOFLOW_STITCHER_PATH"),
            exiftool_path: path_var("PANOFLOW_EXIFTOOL_PATH"),
            python_path: path_var("PANOFLOW_PYTHON_PATH"),
            spatialmedia_path: path_var("PANOFLOW_SPATIALMEDIA_PATH"),
            tool_timeout: string_var("PANOFLOW_TOOL_TIMEOUT"),
            poll_interval: string_var("PANOFLOW_POLL_INTERVAL"),
            quota_cooldown: string_var("PANOFLOW_QUOTA_COOLDOWN"),
            lease_ttl: string_var("PANOFLOW_LEASE_TTL"),
            heartbeat_interval: string_var("PANOFLOW_HEARTBEAT_INTERVAL"),
            store_timeout: string_var("PANOFLOW_STORE_TIMEOUT"),
            metadata_policy: string_var("PANOFLOW_METADATA_POLICY"),
            smtp_host: string_var("PANOFLOW_SMTP_HOST"),
            smtp_port: string_var("PANOFLOW_SMTP_PORT").and_then(|s| s.parse().ok()),
            smtp_username: string_var("PANOFLOW_SMTP_USERNAME"),
            smtp_password: string_var("PANOFLOW_SMTP_PASSWORD"),
            smtp_password_file: path_var("PANOFLOW_SMTP_PASSWORD_FILE"),
            mail_to: parse_csv_var("PANOFLOW_MAIL_TO").filter(|list| !list.is_empty()),
            photos_client_id: string_var("PANOFLOW_PHOTOS_CLIENT_ID"),
            photos_client_secret: string_var("PANOFLOW_PHOTOS_CLIENT_SECRET"),
            photos_refresh_token: string_var("PANOFLOW_PHOTOS_REFRESH_TOKEN"),
        }
    }
}
