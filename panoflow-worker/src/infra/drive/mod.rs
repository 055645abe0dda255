//! [`RemoteStore`] backed by a Google shared drive.

pub mod wire;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use panoflow_core::{
    RemoteEntry, RemoteStore, Result, StoreError,
    store::{FOLDER_MIME_TYPE, file_name_of},
};

use super::auth::TokenSource;
use wire::{
    CreatedFile, FileList, ModifiedTimePatch, NewFile, api_error, list_params,
};

/// Google Drive v3 client scoped to one shared drive.
#[derive(Debug, Clone)]
pub struct DriveStore {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    drive_id: String,
}

impl DriveStore {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        api_base: impl Into<String>,
        drive_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            drive_id: drive_id.into(),
        }
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/drive/v3/files/{id}", self.api_base)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base)
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|err| StoreError::Auth(err.to_string()))?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .query(&[("supportsAllDrives", "true")]))
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

/// Pass through success responses; turn everything else into a store error.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let params =
                list_params(&self.drive_id, folder_id, page_token.as_deref());
            let response = self
                .request(Method::GET, &self.files_url())
                .await?
                .query(&params)
                .send()
                .await
                .map_err(transport)?;
            let page: FileList =
                checked(response).await?.json().await.map_err(transport)?;

            entries.extend(page.files.into_iter().map(RemoteEntry::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder = %folder_id, entries = entries.len(), "Listed folder");
        Ok(entries)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let body = NewFile {
            name,
            parents: [parent_id],
            mime_type: Some(FOLDER_MIME_TYPE),
        };
        let response = self
            .request(Method::POST, &self.files_url())
            .await?
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let created: CreatedFile =
            checked(response).await?.json().await.map_err(transport)?;
        info!(name = %name, parent = %parent_id, id = %created.id, "Created folder");
        Ok(created.id)
    }

    async fn upload(
        &self,
        local: &Path,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<String> {
        let name = file_name_of(local)?;
        let length = tokio::fs::metadata(local)
            .await
            .map_err(|err| StoreError::io(local, err))?
            .len();

        // Resumable session: metadata first, then the bytes to the session URI.
        let metadata = NewFile {
            name: &name,
            parents: [folder_id],
            mime_type: None,
        };
        let response = self
            .request(Method::POST, &self.upload_url())
            .await?
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", length)
            .json(&metadata)
            .send()
            .await
            .map_err(transport)?;
        let response = checked(response).await?;
        let session = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Internal(
                    "resumable upload response carried no session location".into(),
                )
            })?;

        let file = tokio::fs::File::open(local)
            .await
            .map_err(|err| StoreError::io(local, err))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .http
            .put(&session)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let created: CreatedFile =
            checked(response).await?.json().await.map_err(transport)?;

        info!(
            name = %name,
            folder = %folder_id,
            id = %created.id,
            bytes = length,
            "Uploaded file"
        );
        Ok(created.id)
    }

    async fn download(&self, id: &str, local: &Path) -> Result<()> {
        let response = self
            .request(Method::GET, &self.file_url(id))
            .await?
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(transport)?;
        let response = checked(response).await?;

        let mut file = tokio::fs::File::create(local)
            .await
            .map_err(|err| StoreError::io(local, err))?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk)
                .await
                .map_err(|err| StoreError::io(local, err))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|err| StoreError::io(local, err))?;

        debug!(id = %id, path = %local.display(), bytes = written, "Downloaded file");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.file_url(id))
            .await?
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %id, "Delete of missing object treated as success");
            return Ok(());
        }
        checked(response).await?;
        Ok(())
    }

    async fn touch(&self, id: &str) -> Result<()> {
        let patch = ModifiedTimePatch {
            modified_time: Utc::now(),
        };
        let response = self
            .request(Method::PATCH, &self.file_url(id))
            .await?
            .query(&[("fields", "id")])
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;
        checked(response).await?;
        Ok(())
    }
}
