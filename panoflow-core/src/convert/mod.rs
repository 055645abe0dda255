//! Stitching and spherical metadata injection.
//!
//! The stitcher turns one or two fisheye inputs into an equirectangular
//! file; a second tool then tags it so viewers recognise it as a panorama.
//! Both are plain argument-vector invocations with a deadline.

pub mod command;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assets::AssetKind;
use crate::job::{ConversionJob, JobPaths};

pub use command::{ToolError, ToolInvocation};

pub const VIDEO_OUTPUT_SIZE: &str = "5760x2880";
pub const PHOTO_OUTPUT_SIZE: &str = "6080x3040";
pub const VIDEO_BITRATE: &str = "200000000";
pub const STITCH_TYPE: &str = "dynamicstitch";

const PANO_WIDTH: u32 = 6080;
const PANO_HEIGHT: u32 = 3040;

/// Locations of the external programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub stitcher: PathBuf,
    pub exiftool: PathBuf,
    pub python: PathBuf,
    /// Path to the spatial-media injector package or script.
    pub spatialmedia: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            stitcher: PathBuf::from("MediaSDKTest"),
            exiftool: PathBuf::from("exiftool"),
            python: PathBuf::from("python3"),
            spatialmedia: PathBuf::from("spatialmedia"),
        }
    }
}

/// What to do when metadata injection fails after a successful stitch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFailurePolicy {
    /// Warn, then publish the untagged stitched file under the output name.
    #[default]
    LogOnly,
    /// Treat the asset as permanently failed.
    MarkBroken,
}

impl fmt::Display for MetadataFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataFailurePolicy::LogOnly => f.write_str("log_only"),
            MetadataFailurePolicy::MarkBroken => f.write_str("mark_broken"),
        }
    }
}

impl FromStr for MetadataFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "log_only" | "log" => Ok(MetadataFailurePolicy::LogOnly),
            "mark_broken" | "broken" => Ok(MetadataFailurePolicy::MarkBroken),
            other => Err(format!(
                "unknown metadata failure policy '{other}' (expected log_only or mark_broken)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    pub tools: ToolPaths,
    pub tool_timeout: Duration,
    pub metadata_policy: MetadataFailurePolicy,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            tool_timeout: Duration::from_secs(4 * 3600),
            metadata_policy: MetadataFailurePolicy::default(),
        }
    }
}

/// Why an asset was marked broken.
#[derive(Error, Debug)]
pub enum BrokenReason {
    #[error("stitching failed: {0}")]
    Stitch(#[source] ToolError),

    #[error("metadata injection failed: {0}")]
    Metadata(#[source] ToolError),
}

impl BrokenReason {
    pub fn is_metadata(&self) -> bool {
        matches!(self, BrokenReason::Metadata(_))
    }
}

/// A stitched, publishable file.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub artifact: PathBuf,
    /// Set when metadata injection failed and the untagged file was promoted.
    pub metadata_warning: Option<ToolError>,
}

#[derive(Debug, Clone)]
pub struct ConversionOrchestrator {
    settings: ConverterSettings,
}

impl ConversionOrchestrator {
    pub fn new(settings: ConverterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// Stitch `job` and tag the result, leaving it at `paths.output`.
    pub async fn run(
        &self,
        job: &ConversionJob,
        work_dir: &Path,
        paths: &JobPaths,
    ) -> Result<ConversionOutcome, BrokenReason> {
        let started = Instant::now();
        let (Some(left), Some(converted), Some(output)) =
            (&paths.left_input, &paths.converted, &paths.output)
        else {
            return Err(BrokenReason::Stitch(ToolError::MissingOutput {
                program: "planner".to_string(),
                path: work_dir.to_path_buf(),
            }));
        };

        let stitch = self.stitch_invocation(job.kind, left, paths.right_input.as_deref(), converted);
        stitch
            .run(work_dir, self.settings.tool_timeout)
            .await
            .map_err(BrokenReason::Stitch)?;
        ensure_exists(&stitch, converted).map_err(BrokenReason::Stitch)?;

        info!(
            target: "panoflow::convert",
            asset = %job.asset_name(),
            kind = %job.kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stitch finished"
        );

        let tagged = self.inject_metadata(job.kind, work_dir, converted, output).await;
        let metadata_warning = match tagged {
            Ok(()) => None,
            Err(err) => match self.settings.metadata_policy {
                MetadataFailurePolicy::MarkBroken => return Err(BrokenReason::Metadata(err)),
                MetadataFailurePolicy::LogOnly => {
                    warn!(
                        target: "panoflow::convert",
                        asset = %job.asset_name(),
                        error = %err,
                        "Metadata injection failed; publishing untagged file"
                    );
                    promote(converted, output)
                        .await
                        .map_err(BrokenReason::Metadata)?;
                    Some(err)
                }
            },
        };

        info!(
            target: "panoflow::convert",
            asset = %job.asset_name(),
            output = %output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion finished"
        );

        Ok(ConversionOutcome {
            artifact: output.clone(),
            metadata_warning,
        })
    }

    pub fn stitch_invocation(
        &self,
        kind: AssetKind,
        left: &Path,
        right: Option<&Path>,
        converted: &Path,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.settings.tools.stitcher)
            .arg("-inputs")
            .arg(left);
        if let Some(right) = right {
            invocation = invocation.arg(right);
        }

        invocation = match kind {
            AssetKind::Video => invocation
                .args(["-output_size", VIDEO_OUTPUT_SIZE])
                .args(["-bitrate", VIDEO_BITRATE])
                .arg("-enable_flowstate"),
            AssetKind::Photo => invocation.args(["-output_size", PHOTO_OUTPUT_SIZE]),
        };

        invocation
            .args(["-stitch_type", STITCH_TYPE])
            .arg("-output")
            .arg(converted)
    }

    pub fn metadata_invocation(&self, kind: AssetKind, converted: &Path, output: &Path) -> ToolInvocation {
        match kind {
            AssetKind::Photo => ToolInvocation::new(&self.settings.tools.exiftool)
                .arg(format!("-XMP-GPano:FullPanoHeightPixels={PANO_HEIGHT}"))
                .arg(format!("-XMP-GPano:FullPanoWidthPixels={PANO_WIDTH}"))
                .arg("-XMP-GPano:ProjectionType=equirectangular")
                .arg("-XMP-GPano:UsePanoramaViewer=True")
                .arg(converted),
            AssetKind::Video => ToolInvocation::new(&self.settings.tools.python)
                .arg(&self.settings.tools.spatialmedia)
                .args(["-i", "--stereo=none"])
                .arg(converted)
                .arg(output),
        }
    }

    async fn inject_metadata(
        &self,
        kind: AssetKind,
        work_dir: &Path,
        converted: &Path,
        output: &Path,
    ) -> Result<(), ToolError> {
        let invocation = self.metadata_invocation(kind, converted, output);
        invocation.run(work_dir, self.settings.tool_timeout).await?;

        match kind {
            // exiftool tags in place; the tagged file becomes the output.
            AssetKind::Photo => {
                ensure_exists(&invocation, converted)?;
                promote(converted, output).await
            }
            AssetKind::Video => ensure_exists(&invocation, output),
        }
    }
}

fn ensure_exists(invocation: &ToolInvocation, path: &Path) -> Result<(), ToolError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::MissingOutput {
            program: invocation.program().display().to_string(),
            path: path.to_path_buf(),
        })
    }
}

async fn promote(from: &Path, to: &Path) -> Result<(), ToolError> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|source| ToolError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn argv(invocation: &ToolInvocation) -> Vec<String> {
        invocation
            .argv()
            .iter()
            .map(|arg: &OsString| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn video_pair_stitch_arguments() {
        let orchestrator = ConversionOrchestrator::new(ConverterSettings::default());
        let invocation = orchestrator.stitch_invocation(
            AssetKind::Video,
            Path::new("a_00_x.insv"),
            Some(Path::new("a_10_x.insv")),
            Path::new("a_00_x_convert.mp4"),
        );
        assert_eq!(
            argv(&invocation),
            vec![
                "-inputs",
                "a_00_x.insv",
                "a_10_x.insv",
                "-output_size",
                "5760x2880",
                "-bitrate",
                "200000000",
                "-enable_flowstate",
                "-stitch_type",
                "dynamicstitch",
                "-output",
                "a_00_x_convert.mp4",
            ]
        );
    }

    #[test]
    fn photo_stitch_arguments() {
        let orchestrator = ConversionOrchestrator::new(ConverterSettings::default());
        let invocation = orchestrator.stitch_invocation(
            AssetKind::Photo,
            Path::new("p_00_y.insp"),
            None,
            Path::new("p_00_y_convert.jpg"),
        );
        assert_eq!(
            argv(&invocation),
            vec![
                "-inputs",
                "p_00_y.insp",
                "-output_size",
                "6080x3040",
                "-stitch_type",
                "dynamicstitch",
                "-output",
                "p_00_y_convert.jpg",
            ]
        );
    }

    #[test]
    fn metadata_arguments_per_kind() {
        let orchestrator = ConversionOrchestrator::new(ConverterSettings::default());
        let photo = orchestrator.metadata_invocation(
            AssetKind::Photo,
            Path::new("c.jpg"),
            Path::new("o.jpg"),
        );
        assert_eq!(photo.program(), Path::new("exiftool"));
        assert_eq!(argv(&photo).last().map(String::as_str), Some("c.jpg"));
        assert!(argv(&photo).contains(&"-XMP-GPano:ProjectionType=equirectangular".to_string()));

        let video = orchestrator.metadata_invocation(
            AssetKind::Video,
            Path::new("c.mp4"),
            Path::new("o.mp4"),
        );
        assert_eq!(video.program(), Path::new("python3"));
        assert_eq!(argv(&video), vec!["spatialmedia", "-i", "--stereo=none", "c.mp4", "o.mp4"]);
    }

    #[test]
    fn policy_parses_common_spellings() {
        assert_eq!("log_only".parse::<MetadataFailurePolicy>(), Ok(MetadataFailurePolicy::LogOnly));
        assert_eq!("Mark-Broken".parse::<MetadataFailurePolicy>(), Ok(MetadataFailurePolicy::MarkBroken));
        assert!("explode".parse::<MetadataFailurePolicy>().is_err());
    }
}
