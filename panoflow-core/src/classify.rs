//! Turns a flat folder listing into typed inventories.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::assets::{AssetKind, Eye, MarkerAsset, MarkerState, RawAsset};
use crate::store::RemoteEntry;

/// Everything recognised in one job folder.
///
/// Marker maps are keyed by the file name of the raw asset the marker was
/// derived from. Processing markers are kept as a list because racing
/// workers can briefly leave more than one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderInventory {
    pub left_videos: Vec<RawAsset>,
    /// Right-eye videos keyed by file name.
    pub right_videos: HashMap<String, RawAsset>,
    pub left_photos: Vec<RawAsset>,
    pub processing: BTreeMap<String, Vec<MarkerAsset>>,
    pub done: BTreeMap<String, MarkerAsset>,
    pub broken: BTreeMap<String, MarkerAsset>,
    /// Entries that fit none of the categories above.
    pub ignored: usize,
}

impl FolderInventory {
    /// True when a terminal marker exists for `asset_name`.
    pub fn is_terminal(&self, asset_name: &str) -> bool {
        self.done.contains_key(asset_name) || self.broken.contains_key(asset_name)
    }

    /// Processing markers for `asset_name` that are still within their TTL.
    pub fn live_leases<'a>(
        &'a self,
        asset_name: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> impl Iterator<Item = &'a MarkerAsset> + 'a {
        self.processing
            .get(asset_name)
            .into_iter()
            .flatten()
            .filter(move |marker| !marker.is_stale(now, ttl))
    }

    /// Processing markers for `asset_name` whose heartbeat has expired.
    pub fn stale_leases<'a>(
        &'a self,
        asset_name: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> impl Iterator<Item = &'a MarkerAsset> + 'a {
        self.processing
            .get(asset_name)
            .into_iter()
            .flatten()
            .filter(move |marker| marker.is_stale(now, ttl))
    }

    /// Whether any marker prevents `asset_name` from being claimed.
    pub fn is_blocked(&self, asset_name: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_terminal(asset_name) || self.live_leases(asset_name, now, ttl).next().is_some()
    }

    /// Whether `asset_name` carries a marker of any state, live or stale.
    pub fn has_any_marker(&self, asset_name: &str) -> bool {
        self.is_terminal(asset_name) || self.processing.contains_key(asset_name)
    }

    pub fn processing_count(&self) -> usize {
        self.processing.values().map(Vec::len).sum()
    }
}

/// Sort every entry of a listing into at most one category.
///
/// Folders never count as assets; right-eye photos have no pairing role
/// and are counted as ignored.
pub fn classify(listing: &[RemoteEntry]) -> FolderInventory {
    let mut inventory = FolderInventory::default();

    for entry in listing {
        if entry.is_folder() {
            inventory.ignored += 1;
            continue;
        }

        if let Some(marker) = MarkerAsset::parse(entry) {
            let key = marker.asset_name.clone();
            match marker.state {
                MarkerState::Processing => {
                    inventory.processing.entry(key).or_default().push(marker)
                }
                MarkerState::Done => {
                    inventory.done.insert(key, marker);
                }
                MarkerState::Broken => {
                    inventory.broken.insert(key, marker);
                }
            }
            continue;
        }

        match RawAsset::parse(entry) {
            Some(asset) => match (asset.kind, asset.eye) {
                (AssetKind::Video, Eye::Left) => inventory.left_videos.push(asset),
                (AssetKind::Video, Eye::Right) => {
                    inventory.right_videos.insert(asset.file_name.clone(), asset);
                }
                (AssetKind::Photo, Eye::Left) => inventory.left_photos.push(asset),
                (AssetKind::Photo, Eye::Right) => inventory.ignored += 1,
            },
            None => inventory.ignored += 1,
        }
    }

    inventory
}
