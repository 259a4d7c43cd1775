use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{
    fs::OpenOptions,
    io::AsyncReadExt,
    process::{Child, Command},
    sync::{Mutex, OwnedMutexGuard},
    time::timeout,
};
use tracing::debug;

use crate::core::errors::AcquireError;

use super::traits::{CaptureRequest, CaptureStream, MediaPlatform, PermissionState};

pub const V4L2_CLASS_DIR: &str = "/sys/class/video4linux";

/// V4L2 nodes are exclusive: a second capture fails with EBUSY while one
/// is open. `device_lease` serializes acquisitions until the previous
/// stream is released.
#[derive(Debug, Clone)]
pub struct V4l2Platform {
    device: PathBuf,
    input_format: String,
    settle: Duration,
    class_dir: PathBuf,
    program: String,
    program_prefix: Vec<String>,
    device_lease: Arc<Mutex<()>>,
}

impl V4l2Platform {
    pub fn new(device: impl Into<PathBuf>, input_format: String, settle: Duration) -> Self {
        Self {
            device: device.into(),
            input_format,
            settle,
            class_dir: PathBuf::from(V4L2_CLASS_DIR),
            program: "ffmpeg".to_owned(),
            program_prefix: Vec::new(),
            device_lease: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    pub fn with_class_dir(mut self, class_dir: impl Into<PathBuf>) -> Self {
        self.class_dir = class_dir.into();
        self
    }

    #[cfg(test)]
    pub fn with_capture_program(mut self, program: &str, prefix: &[&str]) -> Self {
        self.program = program.to_owned();
        self.program_prefix = prefix.iter().map(|arg| (*arg).to_owned()).collect();
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

#[async_trait]
impl MediaPlatform for V4l2Platform {
    fn supports_capture(&self) -> bool {
        self.class_dir.is_dir()
    }

    async fn query_permission(&self) -> Result<PermissionState> {
        match OpenOptions::new().read(true).open(&self.device).await {
            Ok(file) => {
                drop(file);
                Ok(PermissionState::Granted)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PermissionState::Prompt),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                Ok(PermissionState::Denied)
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to query access to {}", self.device.display())),
        }
    }

    async fn acquire(
        &self,
        request: CaptureRequest,
    ) -> std::result::Result<Box<dyn CaptureStream>, AcquireError> {
        if !request.video {
            return Err(AcquireError::other("capture request must include video"));
        }
        if request.audio {
            return Err(AcquireError::other("audio capture is not supported"));
        }
        if !self.device.exists() {
            return Err(AcquireError::not_found(format!(
                "{}: no such file or directory",
                self.device.display()
            )));
        }

        let lease = self.device_lease.clone().lock_owned().await;

        let mut child = Command::new(&self.program)
            .args(&self.program_prefix)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "v4l2",
                "-input_format",
                &self.input_format,
                "-i",
            ])
            .arg(self.device.as_os_str())
            .args(["-an", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                AcquireError::other(format!("failed to spawn {}: {err}", self.program))
            })?;

        match timeout(self.settle, child.wait()).await {
            Err(_) => {
                debug!(
                    "capture on {} survived settle window",
                    self.device.display()
                );
                Ok(Box::new(FfmpegCapture {
                    child: Some(child),
                    lease: Some(lease),
                }))
            }
            Ok(Ok(status)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                Err(classify_exit(&stderr, status))
            }
            Ok(Err(err)) => Err(AcquireError::other(format!(
                "failed to wait for ffmpeg: {err}"
            ))),
        }
    }
}

struct FfmpegCapture {
    child: Option<Child>,
    lease: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl CaptureStream for FfmpegCapture {
    fn track_count(&self) -> usize {
        usize::from(self.child.is_some())
    }

    async fn stop_tracks(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let stopped = child
            .kill()
            .await
            .context("failed to stop ffmpeg capture process");
        self.lease = None;
        stopped
    }
}

fn classify_exit(stderr: &str, status: ExitStatus) -> AcquireError {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied") {
        return AcquireError::not_allowed(stderr.trim());
    }
    if lower.contains("no such file or directory") || lower.contains("no such device") {
        return AcquireError::not_found(stderr.trim());
    }

    let description = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("ffmpeg exited with {status}"));
    AcquireError::other(description)
}
