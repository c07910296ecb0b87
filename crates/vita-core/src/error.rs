//! Client-side failure taxonomy of the capture flow.

use crate::backend::BackendError;
use crate::poller::PollError;
use thiserror::Error;
use vita_transport::{MediaError, TransportError};

/// Why a capture attempt failed.
///
/// Every variant is caught at the top of the flow and converted into a
/// single stop-capture + failure-screen transition; nothing here
/// propagates past the controller.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera/microphone acquisition failed. Not retried.
    #[error("media acquisition failed: {0}")]
    Media(#[from] MediaError),

    #[error("session initialisation failed: {0}")]
    SessionInit(String),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The tracker pushed an error through its own callback.
    #[error("tracker reported: {0}")]
    TrackerReported(String),

    #[error("environment not supported: {0}")]
    Unsupported(String),

    /// The connectivity re-check bound was hit without a good link.
    #[error("connectivity still below floor after {rechecks} re-checks")]
    ConnectivityExhausted { rechecks: u32 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid response payload: {0}")]
    Payload(String),

    #[error("capture cancelled")]
    Cancelled,
}
