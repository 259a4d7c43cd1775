use anyhow::Result;
use async_trait::async_trait;

use crate::core::errors::AcquireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub video: bool,
    pub audio: bool,
}

impl CaptureRequest {
    pub fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// A live capture handle. Frames are never read through it; holders only
/// release it.
#[async_trait]
pub trait CaptureStream: Send {
    fn track_count(&self) -> usize;
    async fn stop_tracks(&mut self) -> Result<()>;
}

#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Whether the host exposes camera capture at all.
    fn supports_capture(&self) -> bool;

    /// Current authorization without prompting. An error means the query
    /// capability is unavailable on this host.
    async fn query_permission(&self) -> Result<PermissionState>;

    async fn acquire(
        &self,
        request: CaptureRequest,
    ) -> std::result::Result<Box<dyn CaptureStream>, AcquireError>;
}
