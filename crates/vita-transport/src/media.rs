//! Camera/microphone acquisition seam.

use async_trait::async_trait;
use thiserror::Error;

/// An acquired device media stream (opaque handle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("camera/microphone permission denied")]
    PermissionDenied,
    #[error("no capture device available")]
    NoDevice,
    #[error("capture device error: {0}")]
    Device(String),
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire the camera/microphone stream for the liveness capture.
    async fn acquire(&self) -> Result<MediaStream, MediaError>;

    /// Grab one encoded still image for the secondary capture.
    async fn still_image(&self) -> Result<Vec<u8>, MediaError>;
}
