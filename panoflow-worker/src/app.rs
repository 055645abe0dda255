//! Wiring from a resolved [`Config`] to a running [`Worker`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use panoflow_config::Config;
use panoflow_core::{
    LogNotifier, MediaLibrary, NoopLibrary, Notifier, RemoteStore, TimedStore,
    Worker,
};

use crate::infra::{
    DriveStore, PhotosLibrary, RefreshTokenSource, ServiceAccountKey,
    ServiceAccountTokens, SmtpNotifier, auth::DRIVE_SCOPE,
    photos::PHOTOS_API_BASE,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for every Google API.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("panoflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Drive store authenticated as the configured service account, with every
/// call bounded by the store timeout.
pub fn drive_store(
    config: &Config,
    http: &reqwest::Client,
) -> anyhow::Result<TimedStore<DriveStore>> {
    let drive_id = config.drive.require_drive_id()?;
    let key = ServiceAccountKey::from_file(&config.drive.credentials_path)
        .context("failed to load service account credentials")?;
    info!(
        account = %key.client_email,
        drive = %drive_id,
        "Using service account for Drive"
    );
    let tokens = ServiceAccountTokens::new(key, DRIVE_SCOPE, http.clone());
    let store = DriveStore::new(
        http.clone(),
        Arc::new(tokens),
        config.drive.api_base.clone(),
        drive_id,
    );
    Ok(TimedStore::new(store, config.worker.store_timeout))
}

pub fn media_library(
    config: &Config,
    http: &reqwest::Client,
) -> Arc<dyn MediaLibrary> {
    match &config.photos {
        Some(photos) => {
            let tokens = RefreshTokenSource::new(
                photos.client_id.clone(),
                photos.client_secret.clone(),
                photos.refresh_token.clone(),
                http.clone(),
            );
            Arc::new(PhotosLibrary::new(
                http.clone(),
                Arc::new(tokens),
                PHOTOS_API_BASE,
            ))
        }
        None => Arc::new(NoopLibrary),
    }
}

pub fn notifier(config: &Config) -> Arc<dyn Notifier> {
    match &config.notify {
        Some(notify) => match SmtpNotifier::from_config(notify) {
            Ok(smtp) => Arc::new(smtp),
            Err(err) => {
                warn!(error = %err, "SMTP notifier unavailable; alerts go to the log");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    }
}

/// Build a worker over the configured drive.
pub fn build_worker(config: &Config) -> anyhow::Result<Worker> {
    let target = config.drive.require_target()?;
    let http = http_client()?;
    let store: Arc<dyn RemoteStore> = Arc::new(drive_store(config, &http)?);

    std::fs::create_dir_all(&config.worker.work_dir).with_context(|| {
        format!(
            "failed to create work directory {}",
            config.worker.work_dir.display()
        )
    })?;

    Ok(Worker::new(
        config.worker_settings(target.working_folder_id),
        store,
        media_library(config, &http),
        notifier(config),
    ))
}
