use std::time::Duration;

use thiserror::Error;

use super::models::Config;

/// Shortest lease a worker may hold; anything lower expires between polls.
const MIN_LEASE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} is required to reach the shared drive")]
    MissingDriveSetting { field: &'static str },
    #[error(
        "lease TTL ({ttl}) must exceed the heartbeat interval ({heartbeat})"
    )]
    LeaseShorterThanHeartbeat { ttl: String, heartbeat: String },
    #[error("lease TTL ({ttl}) is below the one minute minimum")]
    LeaseTooShort { ttl: String },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("[{section}] settings incomplete: {reason}")]
    IncompleteSection {
        section: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let worker = &config.worker;

    for (field, value) in [
        ("PANOFLOW_POLL_INTERVAL", worker.poll_interval),
        ("PANOFLOW_HEARTBEAT_INTERVAL", worker.heartbeat_interval),
        ("PANOFLOW_STORE_TIMEOUT", worker.store_timeout),
        ("PANOFLOW_TOOL_TIMEOUT", config.tools.tool_timeout),
    ] {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }

    if worker.lease_ttl < MIN_LEASE_TTL {
        return Err(ConfigGuardRailError::LeaseTooShort {
            ttl: humantime::format_duration(worker.lease_ttl).to_string(),
        });
    }

    if worker.lease_ttl <= worker.heartbeat_interval {
        return Err(ConfigGuardRailError::LeaseShorterThanHeartbeat {
            ttl: humantime::format_duration(worker.lease_ttl).to_string(),
            heartbeat: humantime::format_duration(worker.heartbeat_interval)
                .to_string(),
        });
    }

    if worker.lease_ttl < worker.heartbeat_interval * 3 {
        warnings.push_with_hint(
            "Lease TTL allows fewer than three missed heartbeats",
            "A single slow Drive call can let another worker reclaim a live job",
        );
    }

    match &config.notify {
        Some(notify) if notify.mail_to.is_empty() => {
            return Err(ConfigGuardRailError::IncompleteSection {
                section: "notify",
                reason: "no recipients in mail_to".into(),
            });
        }
        Some(_) => {}
        None => warnings.push_with_hint(
            "SMTP notifications not configured; failures are only logged",
            "Set PANOFLOW_SMTP_HOST, PANOFLOW_SMTP_USERNAME, PANOFLOW_SMTP_PASSWORD and PANOFLOW_MAIL_TO",
        ),
    }

    if config.photos.is_none() {
        warnings.push_with_hint(
            "Photos library not configured; stitched files stay on the drive only",
            "Set PANOFLOW_PHOTOS_CLIENT_ID, PANOFLOW_PHOTOS_CLIENT_SECRET and PANOFLOW_PHOTOS_REFRESH_TOKEN",
        );
    }

    if config.drive.drive_id.is_none()
        || config.drive.working_folder_id.is_none()
    {
        warnings.push_with_hint(
            "Shared drive ids not configured; only offline commands will work",
            "Set PANOFLOW_DRIVE_ID and PANOFLOW_WORKING_FOLDER_ID",
        );
    }

    Ok(warnings)
}
