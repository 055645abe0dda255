//! Picks at most one unit of work from a folder inventory.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::assets::{MarkerAsset, RawAsset, right_eye_name};
use crate::classify::FolderInventory;

/// A claimable unit: a video pair, or a single photo with `right = None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub left: RawAsset,
    pub right: Option<RawAsset>,
    /// Expired processing markers the lease manager must clear first.
    pub stale_leases: Vec<MarkerAsset>,
}

impl Candidate {
    pub fn asset_name(&self) -> &str {
        &self.left.file_name
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub candidate: Option<Candidate>,
    /// Left videos with no right counterpart and no marker.
    pub orphans: Vec<String>,
    /// Processing markers older than the lease TTL.
    pub stale_leases: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct JobSelector {
    lease_ttl: Duration,
}

impl JobSelector {
    pub fn new(lease_ttl: Duration) -> Self {
        Self { lease_ttl }
    }

    /// Choose a candidate from `inventory`.
    ///
    /// Video pairs are preferred over photos. Within each kind the order is
    /// randomised through `rng` so that concurrent workers spread across the
    /// folder instead of colliding on the first file.
    pub fn select<R: Rng + ?Sized>(
        &self,
        inventory: &FolderInventory,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> SelectionReport {
        let mut report = SelectionReport {
            stale_leases: inventory
                .processing
                .values()
                .flatten()
                .filter(|marker| marker.is_stale(now, self.lease_ttl))
                .map(MarkerAsset::name)
                .collect(),
            ..SelectionReport::default()
        };

        let mut videos: Vec<&RawAsset> = inventory.left_videos.iter().collect();
        videos.shuffle(rng);

        for left in videos {
            let right = inventory.right_videos.get(&right_eye_name(&left.file_name));
            let Some(right) = right else {
                if !inventory.has_any_marker(&left.file_name) {
                    report.orphans.push(left.file_name.clone());
                }
                continue;
            };

            if inventory.is_blocked(&left.file_name, now, self.lease_ttl) {
                continue;
            }

            if report.candidate.is_none() {
                report.candidate = Some(self.candidate(inventory, left, Some(right), now));
            }
        }

        if report.candidate.is_some() {
            return report;
        }

        let mut photos: Vec<&RawAsset> = inventory.left_photos.iter().collect();
        photos.shuffle(rng);

        report.candidate = photos
            .into_iter()
            .find(|photo| !inventory.is_blocked(&photo.file_name, now, self.lease_ttl))
            .map(|photo| self.candidate(inventory, photo, None, now));

        report
    }

    fn candidate(
        &self,
        inventory: &FolderInventory,
        left: &RawAsset,
        right: Option<&RawAsset>,
        now: DateTime<Utc>,
    ) -> Candidate {
        Candidate {
            left: left.clone(),
            right: right.cloned(),
            stale_leases: inventory
                .stale_leases(&left.file_name, now, self.lease_ttl)
                .cloned()
                .collect(),
        }
    }
}
