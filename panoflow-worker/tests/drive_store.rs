//! DriveStore against an in-process fake of the Drive v3 endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;

use panoflow_core::{
    JobFolder, JobSelector, LeaseManager, RemoteStore, StoreError, classify,
};
use panoflow_worker::infra::{DriveStore, StaticToken};

const TOKEN: &str = "test-token";
const DRIVE_ID: &str = "drive-1";
/// The fake serves listings in pages this small to exercise pagination.
const FAKE_PAGE: usize = 2;

#[derive(Debug, Clone)]
struct FakeFile {
    id: String,
    name: String,
    parent: String,
    mime_type: String,
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    files: Vec<FakeFile>,
    sessions: HashMap<String, (String, String, String)>,
    next_id: u64,
    quota_full: bool,
    list_calls: usize,
}

#[derive(Debug, Clone)]
struct FakeDrive {
    base: String,
    inner: Arc<Mutex<Inner>>,
}

impl FakeDrive {
    fn next_id(inner: &mut Inner) -> String {
        inner.next_id += 1;
        format!("id{}", inner.next_id)
    }

    fn seed(&self, parent: &str, name: &str, content: &[u8]) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = Self::next_id(&mut inner);
        inner.files.push(FakeFile {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.to_string(),
            mime_type: "application/octet-stream".to_string(),
            content: content.to_vec(),
            modified: Utc::now(),
        });
        id
    }

    fn file(&self, id: &str) -> Option<FakeFile> {
        self.inner
            .lock()
            .unwrap()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    fn names_in(&self, parent: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| f.parent == parent)
            .map(|f| f.name.clone())
            .collect()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": 401, "message": "Invalid Credentials"}})),
    )
        .into_response()
}

fn parent_of(query: &str) -> Option<String> {
    let rest = query.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

async fn list(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(params.get("driveId").map(String::as_str), Some(DRIVE_ID));
    assert_eq!(params.get("corpora").map(String::as_str), Some("drive"));
    assert_eq!(
        params.get("supportsAllDrives").map(String::as_str),
        Some("true")
    );

    let parent = params.get("q").and_then(|q| parent_of(q)).unwrap_or_default();
    let offset: usize = params
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);

    let mut inner = drive.inner.lock().unwrap();
    inner.list_calls += 1;
    let children: Vec<_> = inner.files.iter().filter(|f| f.parent == parent).collect();
    let page: Vec<_> = children
        .iter()
        .skip(offset)
        .take(FAKE_PAGE)
        .map(|f| {
            json!({
                "id": f.id,
                "name": f.name,
                "mimeType": f.mime_type,
                "modifiedTime": f.modified.to_rfc3339(),
            })
        })
        .collect();
    let next = offset + FAKE_PAGE;
    let mut body = json!({ "files": page });
    if next < children.len() {
        body["nextPageToken"] = json!(next.to_string());
    }
    Json(body).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewFile {
    name: String,
    parents: Vec<String>,
    mime_type: Option<String>,
}

async fn create_folder(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Json(body): Json<NewFile>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = drive.inner.lock().unwrap();
    let id = FakeDrive::next_id(&mut inner);
    inner.files.push(FakeFile {
        id: id.clone(),
        name: body.name,
        parent: body.parents[0].clone(),
        mime_type: body.mime_type.unwrap_or_default(),
        content: Vec::new(),
        modified: Utc::now(),
    });
    Json(json!({ "id": id })).into_response()
}

async fn start_upload(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<NewFile>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(params.get("uploadType").map(String::as_str), Some("resumable"));
    let mut inner = drive.inner.lock().unwrap();
    if inner.quota_full {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {
                "code": 403,
                "message": "The user's Drive storage quota has been exceeded.",
                "errors": [{"domain": "usageLimits", "reason": "storageQuotaExceeded"}]
            }})),
        )
            .into_response();
    }
    let mime = headers
        .get("X-Upload-Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let session = format!("s{}", inner.sessions.len() + 1);
    inner
        .sessions
        .insert(session.clone(), (body.name, body.parents[0].clone(), mime));
    (
        StatusCode::OK,
        [(header::LOCATION, format!("{}/upload/session/{session}", drive.base))],
    )
        .into_response()
}

async fn finish_upload(
    State(drive): State<FakeDrive>,
    Path(session): Path<String>,
    body: Bytes,
) -> Response {
    let mut inner = drive.inner.lock().unwrap();
    let Some((name, parent, mime_type)) = inner.sessions.remove(&session) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let id = FakeDrive::next_id(&mut inner);
    inner.files.push(FakeFile {
        id: id.clone(),
        name,
        parent,
        mime_type,
        content: body.to_vec(),
        modified: Utc::now(),
    });
    Json(json!({ "id": id })).into_response()
}

async fn get_media(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(params.get("alt").map(String::as_str), Some("media"));
    match drive.file(&id) {
        Some(file) => file.content.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": format!("File not found: {id}")}})),
        )
            .into_response(),
    }
}

async fn delete_file(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = drive.inner.lock().unwrap();
    let before = inner.files.len();
    inner.files.retain(|f| f.id != id);
    if inner.files.len() == before {
        StatusCode::NOT_FOUND.into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Patch {
    modified_time: DateTime<Utc>,
}

async fn patch_file(
    State(drive): State<FakeDrive>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<Patch>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut inner = drive.inner.lock().unwrap();
    match inner.files.iter_mut().find(|f| f.id == id) {
        Some(file) => {
            file.modified = patch.modified_time;
            Json(json!({ "id": id })).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve() -> Result<FakeDrive> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let drive = FakeDrive {
        base: format!("http://{addr}"),
        inner: Arc::default(),
    };

    let app = Router::new()
        .route("/drive/v3/files", get(list).post(create_folder))
        .route(
            "/drive/v3/files/{id}",
            get(get_media).delete(delete_file).patch(patch_file),
        )
        .route("/upload/drive/v3/files", post(start_upload))
        .route("/upload/session/{session}", put(finish_upload))
        .with_state(drive.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(drive)
}

fn store_for(drive: &FakeDrive, token: &str) -> DriveStore {
    DriveStore::new(
        reqwest::Client::new(),
        Arc::new(StaticToken(token.to_string())),
        drive.base.clone(),
        DRIVE_ID,
    )
}

#[tokio::test]
async fn list_follows_every_page() -> Result<()> {
    let drive = serve().await?;
    for name in ["a_00_x.insv", "a_10_x.insv", "b_00_y.insp", "notes.txt", "c.jpg"] {
        drive.seed("shoot", name, b"");
    }
    drive.seed("elsewhere", "other.insv", b"");
    let store = store_for(&drive, TOKEN);

    let mut names: Vec<_> = store
        .list("shoot")
        .await?
        .into_iter()
        .map(|entry| {
            assert!(entry.modified_at.is_some());
            entry.name
        })
        .collect();
    names.sort();

    assert_eq!(
        names,
        vec!["a_00_x.insv", "a_10_x.insv", "b_00_y.insp", "c.jpg", "notes.txt"]
    );
    assert_eq!(drive.inner.lock().unwrap().list_calls, 3);
    Ok(())
}

#[tokio::test]
async fn upload_then_download_preserves_bytes() -> Result<()> {
    let drive = serve().await?;
    let store = store_for(&drive, TOKEN);
    let dir = TempDir::new()?;
    let local = dir.path().join("shoot_00_x.mp4");
    std::fs::write(&local, b"stitched panorama")?;

    let id = store.upload(&local, "shoot", "video/mp4").await?;
    let stored = drive.file(&id).expect("uploaded file recorded");
    assert_eq!(stored.name, "shoot_00_x.mp4");
    assert_eq!(stored.parent, "shoot");
    assert_eq!(stored.mime_type, "video/mp4");

    let back = dir.path().join("copy.mp4");
    store.download(&id, &back).await?;
    assert_eq!(std::fs::read(&back)?, b"stitched panorama");
    Ok(())
}

#[tokio::test]
async fn create_folder_returns_new_id() -> Result<()> {
    let drive = serve().await?;
    let store = store_for(&drive, TOKEN);

    let id = store.create_folder("beach", "root").await?;

    let folder = drive.file(&id).expect("folder recorded");
    assert_eq!(folder.name, "beach");
    assert!(folder.mime_type.contains("folder"));
    assert!(store.list("root").await?[0].is_folder());
    Ok(())
}

#[tokio::test]
async fn delete_of_missing_object_succeeds() -> Result<()> {
    let drive = serve().await?;
    let store = store_for(&drive, TOKEN);
    let id = drive.seed("shoot", "a_00_x.insv.auto_processing", b"");

    store.delete(&id).await?;
    store.delete(&id).await?;
    assert!(drive.names_in("shoot").is_empty());
    Ok(())
}

#[tokio::test]
async fn touch_moves_modified_time_forward() -> Result<()> {
    let drive = serve().await?;
    let store = store_for(&drive, TOKEN);
    let id = drive.seed("shoot", "a_00_x.insv.auto_processing", b"");
    {
        let mut inner = drive.inner.lock().unwrap();
        inner.files[0].modified = Utc::now() - TimeDelta::hours(5);
    }

    store.touch(&id).await?;

    let modified = drive.file(&id).unwrap().modified;
    assert!(modified > Utc::now() - TimeDelta::minutes(1));
    Ok(())
}

#[tokio::test]
async fn quota_rejection_is_recognised() -> Result<()> {
    let drive = serve().await?;
    drive.inner.lock().unwrap().quota_full = true;
    let store = store_for(&drive, TOKEN);
    let dir = TempDir::new()?;
    let local = dir.path().join("IMG_00_y.jpg");
    std::fs::write(&local, b"jpeg")?;

    let err = store.upload(&local, "shoot", "image/jpeg").await.unwrap_err();

    assert!(err.is_quota_exceeded(), "{err}");
    assert!(matches!(err, StoreError::Api { status: 403, .. }));
    Ok(())
}

#[tokio::test]
async fn bad_token_maps_to_auth_error() -> Result<()> {
    let drive = serve().await?;
    let store = store_for(&drive, "stale-token");

    let err = store.list("shoot").await.unwrap_err();

    assert!(matches!(err, StoreError::Auth(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn lease_is_claimed_through_the_drive() -> Result<()> {
    let drive = serve().await?;
    drive.seed("shoot", "IMG_00_y.insp", b"raw");
    let store = Arc::new(store_for(&drive, TOKEN));
    let scratch = TempDir::new()?;
    let leases = LeaseManager::new(store.clone(), scratch.path());
    let folder = JobFolder::new("shoot", "beach");

    let listing = store.list("shoot").await?;
    let candidate = JobSelector::new(std::time::Duration::from_secs(6 * 3600))
        .select(&classify(&listing), &mut StdRng::seed_from_u64(1), Utc::now())
        .candidate
        .expect("photo is claimable");

    let lease = leases.acquire(&folder, &candidate).await?;
    assert!(
        drive
            .names_in("shoot")
            .contains(&"IMG_00_y.insp.auto_processing".to_string())
    );

    leases.release(&lease).await?;
    assert_eq!(drive.names_in("shoot"), vec!["IMG_00_y.insp".to_string()]);
    Ok(())
}
