use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use thiserror::Error;

use panoflow_core::{MetadataFailurePolicy, ToolPaths};

use crate::{
    models::{
        Config, ConfigMetadata, DEFAULT_DRIVE_API_BASE, DEFAULT_SMTP_PORT,
        DEFAULT_STORE_TIMEOUT, DriveConfig, NotifyConfig, PhotosConfig,
        ToolsConfig, WorkerConfig,
        sources::{EnvConfig, FileConfig, FileNotifyConfig, FilePhotosConfig},
    },
    util::parse_duration,
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    vec![
        PathBuf::from("panoflow.toml"),
        PathBuf::from("config/panoflow.toml"),
    ]
});

const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_WORK_DIR: &str = "./work";

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = self.compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        tracing::debug!(path = %path.display(), ?provenance, "Loaded config file");
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No panoflow.toml detected; falling back to environment variables",
                "Copy panoflow.example.toml to panoflow.toml or pass --config",
            );
        }

        let FileConfig {
            drive: file_drive,
            tools: file_tools,
            worker: file_worker,
            photos: file_photos,
            notify: file_notify,
        } = file_config.unwrap_or_default();

        let drive = DriveConfig {
            drive_id: env.drive_id.clone().or(file_drive.drive_id),
            working_folder_id: env
                .working_folder_id
                .clone()
                .or(file_drive.working_folder_id),
            credentials_path: env
                .credentials_path
                .clone()
                .or(file_drive.credentials_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            api_base: env
                .drive_api_base
                .clone()
                .or(file_drive.api_base)
                .unwrap_or_else(|| DEFAULT_DRIVE_API_BASE.to_string()),
        };

        let default_tools = ToolPaths::default();
        let tools = ToolsConfig {
            paths: ToolPaths {
                stitcher: env
                    .stitcher_path
                    .clone()
                    .or(file_tools.stitcher_path)
                    .unwrap_or(default_tools.stitcher),
                exiftool: env
                    .exiftool_path
                    .clone()
                    .or(file_tools.exiftool_path)
                    .unwrap_or(default_tools.exiftool),
                python: env
                    .python_path
                    .clone()
                    .or(file_tools.python_path)
                    .unwrap_or(default_tools.python),
                spatialmedia: env
                    .spatialmedia_path
                    .clone()
                    .or(file_tools.spatialmedia_path)
                    .unwrap_or(default_tools.spatialmedia),
            },
            tool_timeout: resolve_duration(
                "tool_timeout",
                env.tool_timeout.as_deref(),
                file_tools.tool_timeout.as_deref(),
                Duration::from_secs(4 * 3600),
            )?,
        };

        let metadata_policy = match env
            .metadata_policy
            .as_deref()
            .or(file_worker.metadata_failure_policy.as_deref())
        {
            Some(raw) => raw.parse::<MetadataFailurePolicy>().map_err(|reason| {
                ConfigLoadError::InvalidPolicy {
                    value: raw.to_string(),
                    reason,
                }
            })?,
            None => MetadataFailurePolicy::default(),
        };

        let worker = WorkerConfig {
            work_dir: env
                .work_dir
                .clone()
                .or(file_worker.work_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            poll_interval: resolve_duration(
                "poll_interval",
                env.poll_interval.as_deref(),
                file_worker.poll_interval.as_deref(),
                Duration::from_secs(3),
            )?,
            quota_cooldown: resolve_duration(
                "quota_cooldown",
                env.quota_cooldown.as_deref(),
                file_worker.quota_cooldown.as_deref(),
                Duration::from_secs(86_400),
            )?,
            lease_ttl: resolve_duration(
                "lease_ttl",
                env.lease_ttl.as_deref(),
                file_worker.lease_ttl.as_deref(),
                Duration::from_secs(6 * 3600),
            )?,
            heartbeat_interval: resolve_duration(
                "heartbeat_interval",
                env.heartbeat_interval.as_deref(),
                file_worker.heartbeat_interval.as_deref(),
                Duration::from_secs(10 * 60),
            )?,
            store_timeout: resolve_duration(
                "store_timeout",
                env.store_timeout.as_deref(),
                file_worker.store_timeout.as_deref(),
                DEFAULT_STORE_TIMEOUT,
            )?,
            metadata_policy,
        };

        let photos = resolve_photos(&env, file_photos)?;
        let notify = resolve_notify(&env, file_notify)?;

        let config = Config {
            drive,
            tools,
            worker,
            photos,
            notify,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn resolve_duration(
    field: &'static str,
    env: Option<&str>,
    file: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match env.or(file) {
        Some(raw) => parse_duration(raw).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value: raw.to_string(),
                source,
            }
        }),
        None => Ok(default),
    }
}

fn resolve_photos(
    env: &EnvConfig,
    file: Option<FilePhotosConfig>,
) -> Result<Option<PhotosConfig>, ConfigLoadError> {
    let file = file.unwrap_or_default();
    let client_id = env.photos_client_id.clone().or(file.client_id);
    let client_secret = env.photos_client_secret.clone().or(file.client_secret);
    let refresh_token = env.photos_refresh_token.clone().or(file.refresh_token);

    match (client_id, client_secret, refresh_token) {
        (None, None, None) => Ok(None),
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Ok(Some(PhotosConfig {
                client_id,
                client_secret,
                refresh_token,
            }))
        }
        _ => Err(ConfigGuardRailError::IncompleteSection {
            section: "photos",
            reason: "client_id, client_secret and refresh_token must all be set"
                .into(),
        }
        .into()),
    }
}

fn resolve_notify(
    env: &EnvConfig,
    file: Option<FileNotifyConfig>,
) -> Result<Option<NotifyConfig>, ConfigLoadError> {
    let file = file.unwrap_or_default();
    let Some(smtp_host) = env.smtp_host.clone().or(file.smtp_host) else {
        return Ok(None);
    };

    let username = env.smtp_username.clone().or(file.username).ok_or_else(|| {
        ConfigGuardRailError::IncompleteSection {
            section: "notify",
            reason: "smtp_host is set but username is missing".into(),
        }
    })?;

    let mut password = env.smtp_password.clone();
    if password.is_none() {
        for path in [env.smtp_password_file.as_ref(), file.password_file.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(secret) = read_secret_file(path)? {
                password = Some(secret);
                break;
            }
        }
    }
    let password = password.or(file.password).ok_or_else(|| {
        ConfigGuardRailError::IncompleteSection {
            section: "notify",
            reason: "smtp_host is set but no password was provided".into(),
        }
    })?;

    // Without explicit recipients the account mails itself.
    let mail_to = env
        .mail_to
        .clone()
        .or(file.mail_to)
        .unwrap_or_else(|| vec![username.clone()]);

    Ok(Some(NotifyConfig {
        smtp_host,
        smtp_port: env.smtp_port.or(file.smtp_port).unwrap_or(DEFAULT_SMTP_PORT),
        username,
        password,
        mail_to,
    }))
}

fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid metadata failure policy '{value}': {reason}")]
    InvalidPolicy { value: String, reason: String },
    #[error("failed to read secret file {path}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ConfigPathSource {
    pub explicit: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub default: Option<PathBuf>,
}

impl ConfigPathSource {
    pub fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none() && self.default.is_none()
    }

    pub fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Environment));
        }
        self.default
            .as_ref()
            .map(|path| (path.clone(), ConfigPathProvenance::Default))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathProvenance {
    Explicit,
    Environment,
    Default,
}

impl ConfigPathProvenance {
    /// Explicit and environment-provided paths must exist.
    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Environment
        )
    }
}
