//! Stream-copy remuxing through an external ffmpeg process

use crate::error::RemuxError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default container for downloaded highlights
pub const DEFAULT_CONTAINER: &str = "mp4";

/// Copies a stream into a local container file without re-encoding
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Write `stream_url` to `<output_without_ext>.<container>`.
    ///
    /// Returns the path of the finished file.
    async fn remux(
        &self,
        stream_url: &str,
        output_without_ext: &Path,
        container: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RemuxError>;
}

/// Append `.ext` to a path without replacing anything after an inner dot
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// ffmpeg muxer name for a container extension
pub fn muxer_name(container: &str) -> &str {
    match container {
        "mkv" => "matroska",
        "ts" => "mpegts",
        "m4a" => "ipod",
        other => other,
    }
}

/// Remuxer that shells out to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    program: PathBuf,
    kill_on_cancel: bool,
}

impl FfmpegRemuxer {
    /// Create a remuxer running `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            kill_on_cancel: true,
        }
    }

    /// Kill the child process when the task is cancelled mid-remux
    pub fn with_kill_on_cancel(mut self, kill: bool) -> Self {
        self.kill_on_cancel = kill;
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// First line of `<program> -version`, if the tool runs at all
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let first = text.lines().next()?.trim();
        if first.is_empty() {
            return None;
        }
        Some(first.to_string())
    }

    fn command(&self, stream_url: &str, container: &str, target: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-nostdin", "-y", "-loglevel", "error"])
            .arg("-i")
            .arg(stream_url)
            .args(["-c", "copy"])
            .args(["-bsf:a", "aac_adtstoasc"])
            .args(["-f", muxer_name(container)])
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux(
        &self,
        stream_url: &str,
        output_without_ext: &Path,
        container: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RemuxError> {
        let output_path = with_appended_extension(output_without_ext, container);
        let part_path = with_appended_extension(&output_path, "part");

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RemuxError::PrepareOutput {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let tool = self.tool_name();
        debug!("Running {} for {}", tool, output_path.display());
        let child = self
            .command(stream_url, container, &part_path)
            .spawn()
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => RemuxError::ToolMissing { tool: tool.clone() },
                _ => RemuxError::Spawn {
                    tool: tool.clone(),
                    source,
                },
            })?;

        let finished = if self.kill_on_cancel {
            tokio::select! {
                result = child.wait_with_output() => Some(result),
                _ = cancel.cancelled() => None,
            }
        } else {
            Some(child.wait_with_output().await)
        };

        // the wait future owned the child; dropping it killed the process
        let Some(finished) = finished else {
            warn!("Remux of {} cancelled, killed {}", output_path.display(), tool);
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(RemuxError::Cancelled);
        };

        let output = match finished {
            Ok(output) => output,
            Err(source) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(RemuxError::Spawn { tool, source });
            }
        };

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(RemuxError::ToolFailed {
                tool,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tokio::fs::rename(&part_path, &output_path)
            .await
            .map_err(|source| RemuxError::PrepareOutput {
                path: output_path.display().to_string(),
                source,
            })?;

        info!("Remux finished: {}", output_path.display());
        Ok(output_path)
    }
}
