// Shared by several integration test binaries; not every helper is used in each.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use panoflow_core::{
    LibraryError, MediaLibrary, MemoryStore, MetadataFailurePolicy, Notifier, NotifyError,
    ToolPaths, Worker, WorkerSettings,
};

pub const ROOT: &str = "root";

/// Library fake that records every album upload.
#[derive(Debug, Default, Clone)]
pub struct RecordingLibrary {
    pub uploads: Arc<Mutex<Vec<(String, String)>>>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl MediaLibrary for RecordingLibrary {
    async fn upload_to_album(&self, local: &Path, album: &str) -> Result<(), LibraryError> {
        if let Some(message) = &self.fail_with {
            return Err(LibraryError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.uploads.lock().push((album.to_string(), name));
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Behaviour of the fake external tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolBehaviour {
    pub stitch_ok: bool,
    pub metadata_ok: bool,
}

impl Default for ToolBehaviour {
    fn default() -> Self {
        Self {
            stitch_ok: true,
            metadata_ok: true,
        }
    }
}

const STITCH_OK: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-output" ]; then out="$2"; fi
  shift
done
printf 'stitched' > "$out"
"#;

const STITCH_FAIL: &str = "#!/bin/sh\necho 'stitcher: bad fisheye calibration' >&2\nexit 2\n";

// exiftool tags in place and keeps a backup next to the file.
const EXIFTOOL_OK: &str = r#"#!/bin/sh
for last in "$@"; do :; done
cp "$last" "${last}_original"
"#;

// Stands in for `python3 spatialmedia -i --stereo=none <in> <out>`.
const PYTHON_OK: &str = "#!/bin/sh\ncp \"$4\" \"$5\"\n";

const TOOL_FAIL: &str = "#!/bin/sh\necho 'metadata tool crashed' >&2\nexit 1\n";

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Install fake tools into `dir`.
#[cfg(unix)]
pub fn fake_tools(dir: &Path, behaviour: ToolBehaviour) -> Result<ToolPaths> {
    let stitcher = write_script(
        dir,
        "stitcher",
        if behaviour.stitch_ok { STITCH_OK } else { STITCH_FAIL },
    )?;
    let metadata_body = |ok_body| if behaviour.metadata_ok { ok_body } else { TOOL_FAIL };
    let exiftool = write_script(dir, "exiftool", metadata_body(EXIFTOOL_OK))?;
    let python = write_script(dir, "python3", metadata_body(PYTHON_OK))?;

    Ok(ToolPaths {
        stitcher,
        exiftool,
        python,
        spatialmedia: PathBuf::from("spatialmedia"),
    })
}

/// A worker wired to in-memory collaborators.
pub struct Harness {
    pub store: MemoryStore,
    pub library: RecordingLibrary,
    pub notifier: RecordingNotifier,
    pub worker: Worker,
    pub work_dir: TempDir,
    pub tools_dir: TempDir,
}

impl Harness {
    #[cfg(unix)]
    pub fn new(behaviour: ToolBehaviour, policy: MetadataFailurePolicy) -> Result<Self> {
        Self::with_library(behaviour, policy, RecordingLibrary::default())
    }

    #[cfg(unix)]
    pub fn with_library(
        behaviour: ToolBehaviour,
        policy: MetadataFailurePolicy,
        library: RecordingLibrary,
    ) -> Result<Self> {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let work_dir = TempDir::new()?;
        let tools_dir = TempDir::new()?;

        let mut settings = WorkerSettings {
            root_folder_id: ROOT.to_string(),
            work_dir: work_dir.path().to_path_buf(),
            ..WorkerSettings::default()
        };
        settings.converter.tools = fake_tools(tools_dir.path(), behaviour)?;
        settings.converter.metadata_policy = policy;
        settings.converter.tool_timeout = std::time::Duration::from_secs(30);

        let worker = Worker::new(
            settings,
            Arc::new(store.clone()),
            Arc::new(library.clone()),
            Arc::new(notifier.clone()),
        )
        .with_rng(StdRng::seed_from_u64(11));

        Ok(Self {
            store,
            library,
            notifier,
            worker,
            work_dir,
            tools_dir,
        })
    }

    /// Create a shoot folder holding `files`, returning its id.
    pub fn shoot(&self, name: &str, files: &[&str]) -> String {
        let folder = self.store.add_folder(ROOT, name);
        for file in files {
            self.store.insert_file(&folder, file, b"raw-bytes");
        }
        folder
    }

    /// Files left in the local work directory.
    pub fn local_leftovers(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.work_dir.path())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
