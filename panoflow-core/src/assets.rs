//! Typed records for everything the worker finds inside a shoot folder.
//!
//! Raw captures and marker objects are recognised purely from their file
//! names. Nothing here talks to the store; these are the values the
//! classifier produces and the selector consumes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::store::RemoteEntry;

pub const VIDEO_EXTENSION: &str = ".insv";
pub const PHOTO_EXTENSION: &str = ".insp";
pub const LEFT_EYE_TOKEN: &str = "_00_";
pub const RIGHT_EYE_TOKEN: &str = "_10_";

/// Mime type used for the zero-content marker objects.
pub const MARKER_MIME_TYPE: &str = "text/plain";

/// Which half of a stereo capture a raw file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Video,
    Photo,
}

impl AssetKind {
    pub fn raw_extension(self) -> &'static str {
        match self {
            AssetKind::Video => VIDEO_EXTENSION,
            AssetKind::Photo => PHOTO_EXTENSION,
        }
    }

    pub fn stitched_extension(self) -> &'static str {
        match self {
            AssetKind::Video => ".mp4",
            AssetKind::Photo => ".jpg",
        }
    }

    /// Content type used when uploading the stitched artifact.
    pub fn stitched_mime_type(self) -> &'static str {
        match self {
            AssetKind::Video => "video/mp4",
            AssetKind::Photo => "image/jpeg",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Video => f.write_str("video"),
            AssetKind::Photo => f.write_str("photo"),
        }
    }
}

/// A capture uploaded by the camera. Never modified by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAsset {
    pub file_name: String,
    pub base_name: String,
    pub eye: Eye,
    pub kind: AssetKind,
    pub remote_id: String,
}

impl RawAsset {
    /// Recognise a raw capture from a listing entry. Returns `None` for
    /// anything that is not an `.insv`/`.insp` file carrying an eye token, and
    /// for names that cannot be used as a single local file name.
    pub fn parse(entry: &RemoteEntry) -> Option<Self> {
        if entry.is_folder() || !is_local_file_name(&entry.name) {
            return None;
        }

        let name = entry.name.as_str();
        let kind = if name.ends_with(VIDEO_EXTENSION) {
            AssetKind::Video
        } else if name.ends_with(PHOTO_EXTENSION) {
            AssetKind::Photo
        } else {
            return None;
        };

        let eye = if name.contains(LEFT_EYE_TOKEN) {
            Eye::Left
        } else if name.contains(RIGHT_EYE_TOKEN) {
            Eye::Right
        } else {
            return None;
        };

        Some(Self {
            file_name: entry.name.clone(),
            base_name: base_name(name),
            eye,
            kind,
            remote_id: entry.id.clone(),
        })
    }
}

/// States a marker object can announce for a raw asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerState {
    Processing,
    Done,
    Broken,
}

impl MarkerState {
    pub const ALL: [MarkerState; 3] =
        [MarkerState::Processing, MarkerState::Done, MarkerState::Broken];

    /// Suffix appended to the raw asset's file name. Stable on the wire.
    pub fn suffix(self) -> &'static str {
        match self {
            MarkerState::Processing => ".auto_processing",
            MarkerState::Done => ".auto_done",
            MarkerState::Broken => ".auto_broken",
        }
    }

    /// Done and broken are absorbing; processing is a lease.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MarkerState::Processing)
    }
}

impl fmt::Display for MarkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerState::Processing => f.write_str("processing"),
            MarkerState::Done => f.write_str("done"),
            MarkerState::Broken => f.write_str("broken"),
        }
    }
}

/// A zero-content object whose existence records a state for `asset_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerAsset {
    /// File name of the raw asset the marker was derived from.
    pub asset_name: String,
    pub state: MarkerState,
    pub remote_id: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl MarkerAsset {
    pub fn parse(entry: &RemoteEntry) -> Option<Self> {
        if entry.is_folder() {
            return None;
        }

        MarkerState::ALL.iter().find_map(|state| {
            let asset_name = entry.name.strip_suffix(state.suffix())?;
            if asset_name.is_empty() {
                return None;
            }
            Some(Self {
                asset_name: asset_name.to_string(),
                state: *state,
                remote_id: entry.id.clone(),
                modified_at: entry.modified_at,
            })
        })
    }

    pub fn name(&self) -> String {
        marker_name(&self.asset_name, self.state)
    }

    pub fn base_name(&self) -> String {
        base_name(&self.asset_name)
    }

    /// A processing marker whose last heartbeat is older than `ttl`.
    ///
    /// Markers without a timestamp never go stale.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.state != MarkerState::Processing {
            return false;
        }
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.modified_at
            .map(|modified| now.signed_duration_since(modified) > ttl)
            .unwrap_or(false)
    }
}

/// A per-shoot folder under the working root; the unit of scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFolder {
    pub remote_id: String,
    pub name: String,
}

impl JobFolder {
    pub fn new(remote_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            name: name.into(),
        }
    }
}

impl From<&RemoteEntry> for JobFolder {
    fn from(entry: &RemoteEntry) -> Self {
        JobFolder::new(entry.id.clone(), entry.name.clone())
    }
}

/// Whether `name` stays a single entry when joined onto a local directory.
///
/// Remote names are free-form; anything with a separator, a parent
/// reference or a root would resolve outside the work directory.
pub fn is_local_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !Path::new(name).has_root()
}

pub fn marker_name(asset_name: &str, state: MarkerState) -> String {
    format!("{asset_name}{}", state.suffix())
}

/// The right-eye file name that pairs with `left_name`.
pub fn right_eye_name(left_name: &str) -> String {
    left_name.replace(LEFT_EYE_TOKEN, RIGHT_EYE_TOKEN)
}

/// Canonical pairing key: extension removed, eye token collapsed to `_`.
///
/// `shoot_00_x.insv` and `shoot_10_x.insv` both map to `shoot_x`.
pub fn base_name(file_name: &str) -> String {
    let stem = strip_raw_extension(file_name);
    if stem.contains(LEFT_EYE_TOKEN) {
        stem.replacen(LEFT_EYE_TOKEN, "_", 1)
    } else {
        stem.replacen(RIGHT_EYE_TOKEN, "_", 1)
    }
}

/// Intermediate file written by the stitcher for `left_name`.
pub fn converted_name(left_name: &str, kind: AssetKind) -> String {
    format!(
        "{}_convert{}",
        strip_raw_extension(left_name),
        kind.stitched_extension()
    )
}

/// Final artifact name published for `left_name`.
pub fn output_name(left_name: &str, kind: AssetKind) -> String {
    format!("{}{}", strip_raw_extension(left_name), kind.stitched_extension())
}

fn strip_raw_extension(file_name: &str) -> &str {
    file_name
        .strip_suffix(VIDEO_EXTENSION)
        .or_else(|| file_name.strip_suffix(PHOTO_EXTENSION))
        .unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> RemoteEntry {
        RemoteEntry::file(format!("id-{name}"), name)
    }

    #[test]
    fn parses_eye_and_kind_from_name() {
        let left = RawAsset::parse(&entry("shoot_00_x.insv")).unwrap();
        assert_eq!(left.eye, Eye::Left);
        assert_eq!(left.kind, AssetKind::Video);
        assert_eq!(left.base_name, "shoot_x");

        let right = RawAsset::parse(&entry("shoot_10_x.insv")).unwrap();
        assert_eq!(right.eye, Eye::Right);
        assert_eq!(right.base_name, left.base_name);

        let photo = RawAsset::parse(&entry("IMG_00_y.insp")).unwrap();
        assert_eq!(photo.kind, AssetKind::Photo);
    }

    #[test]
    fn rejects_names_without_token_or_extension() {
        assert!(RawAsset::parse(&entry("shoot_x.insv")).is_none());
        assert!(RawAsset::parse(&entry("shoot_00_x.mp4")).is_none());
        assert!(RawAsset::parse(&entry("shoot_00_x.insv.auto_done")).is_none());
    }

    #[test]
    fn rejects_names_that_escape_the_work_dir() {
        for name in [
            "../shoot_00_x.insp",
            "/tmp/shoot_00_x.insp",
            "sub/shoot_00_x.insv",
            "..\\shoot_00_x.insv",
        ] {
            assert!(RawAsset::parse(&entry(name)).is_none(), "{name}");
        }
        assert!(is_local_file_name("shoot_00_x.insv"));
        assert!(is_local_file_name("..shoot_00_x.insv"));
        assert!(!is_local_file_name(".."));
        assert!(!is_local_file_name(""));
    }

    #[test]
    fn marker_round_trips_through_its_name() {
        let parsed =
            MarkerAsset::parse(&entry("shoot_00_x.insv.auto_processing")).unwrap();
        assert_eq!(parsed.asset_name, "shoot_00_x.insv");
        assert_eq!(parsed.state, MarkerState::Processing);
        assert_eq!(parsed.name(), "shoot_00_x.insv.auto_processing");
        assert!(MarkerAsset::parse(&entry(".auto_done")).is_none());
    }

    #[test]
    fn derives_artifact_names() {
        assert_eq!(
            converted_name("a_00_b.insv", AssetKind::Video),
            "a_00_b_convert.mp4"
        );
        assert_eq!(output_name("a_00_b.insp", AssetKind::Photo), "a_00_b.jpg");
        assert_eq!(right_eye_name("a_00_b.insv"), "a_10_b.insv");
    }

    #[test]
    fn processing_marker_goes_stale_after_ttl() {
        let now = Utc::now();
        let marker = MarkerAsset {
            asset_name: "a_00_b.insv".into(),
            state: MarkerState::Processing,
            remote_id: "m1".into(),
            modified_at: Some(now - TimeDelta::hours(7)),
        };
        assert!(marker.is_stale(now, Duration::from_secs(6 * 3600)));
        assert!(!marker.is_stale(now, Duration::from_secs(8 * 3600)));

        let done = MarkerAsset {
            state: MarkerState::Done,
            ..marker
        };
        assert!(!done.is_stale(now, Duration::from_secs(1)));
    }
}
