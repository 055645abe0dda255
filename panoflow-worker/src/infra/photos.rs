//! [`MediaLibrary`] backed by the Google Photos Library API.
//!
//! Uploading is two steps: the raw bytes go to `/v1/uploads` and yield an
//! upload token, which `mediaItems:batchCreate` then turns into a media item
//! inside the album. Albums are looked up by title once and remembered.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use panoflow_core::{LibraryError, MediaLibrary};

use super::auth::TokenSource;

pub const PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com";

#[derive(Debug)]
pub struct PhotosLibrary {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    albums: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumPage {
    #[serde(default)]
    albums: Vec<Album>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Album {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Serialize)]
struct CreateAlbum<'a> {
    album: NewAlbum<'a>,
}

#[derive(Debug, Serialize)]
struct NewAlbum<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreate<'a> {
    album_id: &'a str,
    new_media_items: [NewMediaItem<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItem<'a> {
    simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleMediaItem<'a> {
    upload_token: &'a str,
    file_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<MediaItemResult>,
}

#[derive(Debug, Deserialize)]
struct MediaItemResult {
    status: Option<ItemStatus>,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn transport(err: reqwest::Error) -> LibraryError {
    LibraryError::Transport(err.to_string())
}

async fn checked(response: Response) -> Result<Response, LibraryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if status.as_u16() == 401 {
        return Err(LibraryError::Auth(message));
    }
    Err(LibraryError::Api {
        status: status.as_u16(),
        message,
    })
}

impl PhotosLibrary {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            albums: Mutex::new(HashMap::new()),
        }
    }

    async fn authorized(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<RequestBuilder, LibraryError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|err| LibraryError::Auth(err.to_string()))?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(token))
    }

    async fn upload_bytes(&self, local: &Path) -> Result<String, LibraryError> {
        let io_err = |source| LibraryError::Io {
            path: local.to_path_buf(),
            source,
        };
        let length = tokio::fs::metadata(local).await.map_err(io_err)?.len();
        let file = tokio::fs::File::open(local).await.map_err(io_err)?;

        let response = self
            .authorized(reqwest::Method::POST, "/v1/uploads")
            .await?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, length)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(transport)?;
        let token = checked(response).await?.text().await.map_err(transport)?;
        Ok(token.trim().to_string())
    }

    /// Id of the album titled `title`, creating it when absent.
    async fn album_id(&self, title: &str) -> Result<String, LibraryError> {
        let mut albums = self.albums.lock().await;
        if let Some(id) = albums.get(title) {
            return Ok(id.clone());
        }

        let id = match self.find_album(title).await? {
            Some(id) => id,
            None => self.create_album(title).await?,
        };
        albums.insert(title.to_string(), id.clone());
        Ok(id)
    }

    async fn find_album(&self, title: &str) -> Result<Option<String>, LibraryError> {
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .authorized(reqwest::Method::GET, "/v1/albums")
                .await?
                .query(&[("pageSize", "50"), ("excludeNonAppCreatedData", "true")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: AlbumPage = checked(request.send().await.map_err(transport)?)
                .await?
                .json()
                .await
                .map_err(transport)?;

            if let Some(album) = page.albums.into_iter().find(|a| a.title == title) {
                return Ok(Some(album.id));
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(None),
            }
        }
    }

    async fn create_album(&self, title: &str) -> Result<String, LibraryError> {
        let response = self
            .authorized(reqwest::Method::POST, "/v1/albums")
            .await?
            .json(&CreateAlbum {
                album: NewAlbum { title },
            })
            .send()
            .await
            .map_err(transport)?;
        let album: Album = checked(response).await?.json().await.map_err(transport)?;
        info!(album = %title, id = %album.id, "Created photo album");
        Ok(album.id)
    }
}

#[async_trait]
impl MediaLibrary for PhotosLibrary {
    async fn upload_to_album(&self, local: &Path, album: &str) -> Result<(), LibraryError> {
        let file_name = local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let upload_token = self.upload_bytes(local).await?;
        let album_id = self.album_id(album).await?;

        let body = BatchCreate {
            album_id: &album_id,
            new_media_items: [NewMediaItem {
                simple_media_item: SimpleMediaItem {
                    upload_token: &upload_token,
                    file_name: &file_name,
                },
            }],
        };
        let response = self
            .authorized(reqwest::Method::POST, "/v1/mediaItems:batchCreate")
            .await?
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let created: BatchCreateResponse =
            checked(response).await?.json().await.map_err(transport)?;

        // A 200 can still carry a per-item failure.
        if let Some(status) = created
            .new_media_item_results
            .iter()
            .filter_map(|result| result.status.as_ref())
            .find(|status| status.code != 0)
        {
            return Err(LibraryError::Api {
                status: 200,
                message: format!("media item rejected ({}): {}", status.code, status.message),
            });
        }

        debug!(file = %file_name, album = %album, "Added to photo album");
        Ok(())
    }
}
