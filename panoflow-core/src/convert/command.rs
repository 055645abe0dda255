//! External tool execution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error};

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 10;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} did not finish within {limit:?}")]
    Timeout { program: String, limit: Duration },

    #[error("{program} reported success but {path} was not produced")]
    MissingOutput { program: String, path: PathBuf },

    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One external program call, built as an argument vector.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn argv(&self) -> &[OsString] {
        &self.args
    }

    fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Run to completion inside `work_dir`, killing the child if `limit`
    /// elapses first.
    pub async fn run(&self, work_dir: &Path, limit: Duration) -> Result<(), ToolError> {
        let program = self.display_name();
        let started = Instant::now();
        debug!(
            target: "panoflow::convert",
            program = %program,
            args = ?self.args,
            "Starting external tool"
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                error!(
                    target: "panoflow::convert",
                    program = %program,
                    limit_secs = limit.as_secs(),
                    "External tool timed out"
                );
                return Err(ToolError::Timeout { program, limit });
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = stderr_tail(&output.stderr);
            error!(
                target: "panoflow::convert",
                program = %program,
                code,
                stderr = %stderr,
                "External tool failed"
            );
            return Err(ToolError::Exit {
                program,
                code,
                stderr,
            });
        }

        debug!(
            target: "panoflow::convert",
            program = %program,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External tool finished"
        );
        Ok(())
    }
}

fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let raw: String = (0..25).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(raw.as_bytes());
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.ends_with("line 24"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolInvocation::new("/definitely/not/a/tool")
            .arg("-x")
            .run(dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolInvocation::new("/bin/sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run(dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ToolError::Exit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolInvocation::new("/bin/sh")
            .args(["-c", "sleep 10"])
            .run(dir.path(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
