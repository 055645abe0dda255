//! Request and response shapes of the Drive v3 REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panoflow_core::{RemoteEntry, StoreError};

pub const PAGE_SIZE: u32 = 100;
pub const LIST_FIELDS: &str =
    "nextPageToken,files(id,name,mimeType,modifiedTime)";

/// Query selecting the live children of `parent_id`.
pub fn children_query(parent_id: &str) -> String {
    // Single quotes inside ids would end the literal early.
    let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

/// Query parameters for one page of a shared-drive listing.
pub fn list_params(
    drive_id: &str,
    parent_id: &str,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", children_query(parent_id)),
        ("corpora", "drive".to_string()),
        ("driveId", drive_id.to_string()),
        ("pageSize", PAGE_SIZE.to_string()),
        ("supportsAllDrives", "true".to_string()),
        ("includeItemsFromAllDrives", "true".to_string()),
        ("fields", LIST_FIELDS.to_string()),
    ];
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
}

impl From<DriveFile> for RemoteEntry {
    fn from(file: DriveFile) -> Self {
        RemoteEntry {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            modified_at: file.modified_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedFile {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile<'a> {
    pub name: &'a str,
    pub parents: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedTimePatch {
    pub modified_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map a non-success response body onto a [`StoreError`].
///
/// The human readable message is kept verbatim so quota exhaustion can be
/// recognised from it downstream.
pub fn api_error(status: u16, body: &str) -> StoreError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = match parsed {
        Some(envelope) => {
            let reason = envelope
                .error
                .errors
                .iter()
                .map(|detail| detail.reason.as_str())
                .find(|reason| !reason.is_empty());
            match reason {
                Some(reason) => format!("{} ({reason})", envelope.error.message),
                None => envelope.error.message,
            }
        }
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => body.trim().to_string(),
    };

    match status {
        401 => StoreError::Auth(message),
        404 => StoreError::NotFound(message),
        _ => StoreError::Api { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_query_escapes_quotes() {
        assert_eq!(
            children_query("abc"),
            "'abc' in parents and trashed = false"
        );
        assert_eq!(
            children_query("o'brien"),
            "'o\\'brien' in parents and trashed = false"
        );
    }

    #[test]
    fn list_params_target_the_shared_drive() {
        let params = list_params("drive-1", "folder-9", Some("next"));
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("corpora"), Some("drive"));
        assert_eq!(get("driveId"), Some("drive-1"));
        assert_eq!(get("pageSize"), Some("100"));
        assert_eq!(get("supportsAllDrives"), Some("true"));
        assert_eq!(get("pageToken"), Some("next"));
        assert!(list_params("d", "f", None).iter().all(|(k, _)| *k != "pageToken"));
    }

    #[test]
    fn quota_error_keeps_message_and_reason() {
        let body = r#"{"error":{"code":403,"message":"The user's Drive storage quota has been exceeded.","errors":[{"domain":"usageLimits","reason":"storageQuotaExceeded"}]}}"#;
        let err = api_error(403, body);
        assert!(err.is_quota_exceeded());
        assert!(err.to_string().contains("storageQuotaExceeded"));
    }

    #[test]
    fn unauthenticated_and_missing_map_to_dedicated_variants() {
        assert!(matches!(
            api_error(401, r#"{"error":{"message":"Invalid Credentials"}}"#),
            StoreError::Auth(_)
        ));
        assert!(matches!(api_error(404, ""), StoreError::NotFound(_)));
        match api_error(502, "<html>bad gateway</html>") {
            StoreError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "<html>bad gateway</html>");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn listing_entries_carry_modified_time() {
        let page: FileList = serde_json::from_str(
            r#"{"files":[{"id":"1","name":"a_00_x.insv.auto_processing","mimeType":"text/plain","modifiedTime":"2024-05-01T10:00:00.000Z"}]}"#,
        )
        .unwrap();
        assert!(page.next_page_token.is_none());
        let entry = RemoteEntry::from(page.files[0].clone());
        assert_eq!(entry.modified_at.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
