//! Backend capability consumed by the session controller.

use crate::poller::PollOutcome;
use crate::types::{FaceMetadata, LivenessVerdict, MatchVerdict, SessionHandle};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a backend API call, as seen by the flow.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with its error envelope.
    #[error("backend rejected ({error_code}): {message}")]
    Rejected { error_code: String, message: String },

    #[error("invalid payload: {0}")]
    Payload(String),
}

/// The slice of the backend API the capture flow needs.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a liveness session, optionally re-keying an existing id.
    async fn init_liveness_session(
        &self,
        session_id: Option<&str>,
        identity_id: Option<&str>,
    ) -> Result<SessionHandle, BackendError>;

    /// One polling probe for the challenge verdict.
    ///
    /// `Pending` covers every non-ready outcome, transport hiccups
    /// included; the poller budgets attempts, not this call.
    async fn liveness_result(&self, session_id: &str, polling: bool)
        -> PollOutcome<LivenessVerdict>;

    /// Fetch a stored face image by id.
    async fn face_image(&self, session_id: &str, face_id: &str) -> Result<Vec<u8>, BackendError>;

    /// Upload a face image; returns the new face id.
    async fn upload_face(
        &self,
        session_id: &str,
        image: Vec<u8>,
        metadata: &FaceMetadata,
    ) -> Result<String, BackendError>;

    /// Compare two stored faces of one bio-session.
    async fn match_faces(
        &self,
        session_id: &str,
        reference_face_id: &str,
        probe_face_id: &str,
    ) -> Result<MatchVerdict, BackendError>;
}
