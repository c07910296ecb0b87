//! Capture-transport seam: the control surface and event stream of the
//! channel that carries camera media to the tracker.

use crate::media::MediaStream;
use crate::tracking::TrackingEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Challenge phase flag pushed by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeInstruction {
    /// Challenge announced but not yet running.
    Pending,
    /// Challenge in progress; the client renders its animation.
    Active,
}

/// Events the transport pushes into the session controller.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Instruction(ChallengeInstruction),
    Tracking(TrackingEvent),
    /// The challenge finished on the tracker side. The verdict is not
    /// carried here; the client fetches it from the backend.
    ChallengeResult,
    Error(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,
    #[error("transport refused start: {0}")]
    Rejected(String),
    #[error("transport channel failed: {0}")]
    Channel(String),
}

/// Control surface of the capture channel.
///
/// `disconnect` must be idempotent: the controller tears the channel
/// down from several places and double-disconnects are normal.
#[async_trait]
pub trait CaptureTransport: Send + Sync {
    /// Bind a session and wire the event callbacks.
    async fn connect(
        &self,
        session_id: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    /// Begin streaming the given media under a recording label.
    async fn start(&self, stream: MediaStream, recording_label: &str)
        -> Result<(), TransportError>;

    /// Acknowledge that the most recent plan colour has been rendered.
    async fn color_displayed(&self) -> Result<(), TransportError>;

    /// Tear the channel down. Safe to call at any time, any number of
    /// times; never fails.
    async fn disconnect(&self);
}
