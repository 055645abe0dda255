//! # panoflow worker
//!
//! Watches a shared Google Drive folder for raw stereo fisheye captures,
//! claims one at a time with marker files, stitches it with the vendor
//! tooling and publishes the result back to the drive and to a photo album.

pub mod app;
pub mod infra;
