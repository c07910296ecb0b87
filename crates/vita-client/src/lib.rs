//! Typed HTTP client for the vita backend.
//!
//! Thin wrapper over the REST surface served by `vitad`. Non-2xx
//! responses are decoded into the shared error envelope where possible
//! so callers can branch on `errorCode` instead of scraping bodies.
//! The client doubles as the flow's [`Backend`] and as the tracker's
//! [`ChallengeSink`], which is what the demo binaries wire in.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use vita_core::backend::{Backend, BackendError};
use vita_core::poller::PollOutcome;
use vita_core::types::{
    CountryDocTypes, DocSessionHandle, DocSessionRequest, DocSide, DocSideRecord, ErrorEnvelope,
    FaceMetadata, FaceUploaded, LivenessVerdict, MatchVerdict, SessionHandle, ShapedDocResult,
};
use vita_transport::sim::{ChallengeSink, SinkError};

/// Default per-request deadline; generous enough for multipart uploads.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code returned by result probes before the tracker has published.
pub const RESULT_NOT_READY: &str = "RESULT_NOT_READY";

/// Error code for lookups against unknown or expired sessions.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with its error envelope.
    #[error("backend rejected ({error_code}): {message}")]
    Rejected {
        status: StatusCode,
        error_code: String,
        message: String,
    },

    /// Non-2xx answer that did not carry the envelope.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the backend said "come back later".
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ApiError::Rejected { error_code, .. } if error_code == RESULT_NOT_READY)
    }

    /// True when the backend does not know the session at all.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, ApiError::Rejected { error_code, .. } if error_code == SESSION_NOT_FOUND)
    }
}

impl From<ApiError> for BackendError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected {
                error_code,
                message,
                ..
            } => BackendError::Rejected {
                error_code,
                message,
            },
            ApiError::Status { status, body } => {
                BackendError::Request(format!("status {status}: {body}"))
            }
            other => BackendError::Request(other.to_string()),
        }
    }
}

/// Answer of `GET /healthz`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
}

/// Handle on one backend instance. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    callback_path: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            callback_path: "/doc-capture-callback".to_string(),
        })
    }

    /// Overrides the path document-capture callbacks are posted to.
    pub fn with_callback_path(mut self, path: &str) -> Self {
        self.callback_path = format!("/{}", path.trim_start_matches('/'));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = format!("{}/healthz", self.base_url);
        let resp = check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Opens a liveness session, optionally re-keying a caller-chosen id.
    pub async fn init_liveness_session(
        &self,
        session_id: Option<&str>,
        identity_id: Option<&str>,
    ) -> Result<SessionHandle, ApiError> {
        let url = match session_id {
            Some(id) => format!("{}/init-liveness-session/{}", self.base_url, id),
            None => format!("{}/init-liveness-session", self.base_url),
        };
        let mut req = self.client.get(&url);
        if let Some(identity) = identity_id {
            req = req.query(&[("identityId", identity)]);
        }
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Fetches the challenge verdict. `Ok(None)` means the tracker has not
    /// published it yet and the caller should retry.
    pub async fn liveness_result(
        &self,
        session_id: &str,
        polling: bool,
    ) -> Result<Option<LivenessVerdict>, ApiError> {
        let url = format!("{}/liveness-challenge-result/{}", self.base_url, session_id);
        let resp = self
            .client
            .get(&url)
            .query(&[("polling", polling)])
            .send()
            .await?;
        match check(resp).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(err) if err.is_not_ready() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Publishes the tracker's verdict for a session.
    pub async fn publish_liveness_result(
        &self,
        session_id: &str,
        verdict: &LivenessVerdict,
    ) -> Result<(), ApiError> {
        let url = format!("{}/liveness-challenge-result/{}", self.base_url, session_id);
        check(self.client.post(&url).json(verdict).send().await?).await?;
        Ok(())
    }

    /// Uploads a face image plus its JSON metadata part.
    pub async fn upload_face(
        &self,
        session_id: &str,
        image: Vec<u8>,
        metadata: &FaceMetadata,
    ) -> Result<FaceUploaded, ApiError> {
        let url = format!("{}/bio-session/{}/faces", self.base_url, session_id);
        let form = Form::new()
            .part(
                "image",
                Part::bytes(image)
                    .file_name("face.bin")
                    .mime_str("application/octet-stream")?,
            )
            .text("face", serde_json::to_string(metadata)?);
        let resp = check(self.client.post(&url).multipart(form).send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn face_image(&self, session_id: &str, face_id: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!(
            "{}/bio-session/{}/faces/{}/image",
            self.base_url, session_id, face_id
        );
        let resp = check(self.client.get(&url).send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Compares two stored faces of one bio-session.
    pub async fn match_faces(
        &self,
        session_id: &str,
        reference: &str,
        candidate: &str,
    ) -> Result<MatchVerdict, ApiError> {
        let url = format!(
            "{}/bio-session/{}/faces/{}/matches/{}",
            self.base_url, session_id, reference, candidate
        );
        let resp = check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn init_document_session(
        &self,
        request: &DocSessionRequest,
    ) -> Result<DocSessionHandle, ApiError> {
        let url = format!("{}/init-document-session", self.base_url);
        let resp = check(self.client.post(&url).json(request).send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn country_doc_types(&self) -> Result<Vec<CountryDocTypes>, ApiError> {
        let url = format!("{}/countries/doc-types", self.base_url);
        let resp = check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Fetches the shaped result for one document side. `Ok(None)` means
    /// the side is not visible yet (not captured, or the completion
    /// callback is still outstanding).
    pub async fn doc_capture_result(
        &self,
        session_id: &str,
        doc_type: &str,
        side: DocSide,
        polling: bool,
    ) -> Result<Option<ShapedDocResult>, ApiError> {
        let url = format!(
            "{}/doc-capture-result/{}/{}/{}",
            self.base_url,
            session_id,
            doc_type,
            side.as_str()
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("polling", polling)])
            .send()
            .await?;
        match check(resp).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(err) if err.is_not_ready() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Pushes one captured document side into the session record.
    pub async fn push_doc_side_result(
        &self,
        session_id: &str,
        record: &DocSideRecord,
    ) -> Result<(), ApiError> {
        let url = format!("{}/doc-capture-result/{}", self.base_url, session_id);
        check(self.client.post(&url).json(record).send().await?).await?;
        Ok(())
    }

    /// Reports that document capture finished, unlocking result reads.
    pub async fn doc_capture_callback(
        &self,
        session_id: &str,
        capture_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, self.callback_path);
        let body = serde_json::json!({ "sessionId": session_id, "captureId": capture_id });
        check(self.client.post(&url).json(&body).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn init_liveness_session(
        &self,
        session_id: Option<&str>,
        identity_id: Option<&str>,
    ) -> Result<SessionHandle, BackendError> {
        ApiClient::init_liveness_session(self, session_id, identity_id)
            .await
            .map_err(Into::into)
    }

    async fn liveness_result(
        &self,
        session_id: &str,
        polling: bool,
    ) -> PollOutcome<LivenessVerdict> {
        match ApiClient::liveness_result(self, session_id, polling).await {
            Ok(Some(verdict)) => PollOutcome::Ready(verdict),
            Ok(None) => PollOutcome::Pending,
            Err(err) => {
                tracing::debug!(error = %err, "verdict probe failed, retrying");
                PollOutcome::Pending
            }
        }
    }

    async fn face_image(&self, session_id: &str, face_id: &str) -> Result<Vec<u8>, BackendError> {
        ApiClient::face_image(self, session_id, face_id)
            .await
            .map_err(Into::into)
    }

    async fn upload_face(
        &self,
        session_id: &str,
        image: Vec<u8>,
        metadata: &FaceMetadata,
    ) -> Result<String, BackendError> {
        let uploaded = ApiClient::upload_face(self, session_id, image, metadata).await?;
        Ok(uploaded.face_id)
    }

    async fn match_faces(
        &self,
        session_id: &str,
        reference_face_id: &str,
        probe_face_id: &str,
    ) -> Result<MatchVerdict, BackendError> {
        ApiClient::match_faces(self, session_id, reference_face_id, probe_face_id)
            .await
            .map_err(Into::into)
    }
}

/// The tracker side of the loop: when a challenge finishes, store the
/// best frame (on success) and publish the verdict so result polls can
/// resolve.
#[async_trait]
impl ChallengeSink for ApiClient {
    async fn challenge_completed(
        &self,
        session_id: &str,
        succeeded: bool,
        message: Option<&str>,
        best_frame: &[u8],
    ) -> Result<(), SinkError> {
        let best_image_id = if succeeded && !best_frame.is_empty() {
            let metadata = FaceMetadata {
                label: None,
                source: Some("challenge".to_string()),
            };
            let uploaded = self
                .upload_face(session_id, best_frame.to_vec(), &metadata)
                .await
                .map_err(|e| SinkError::Publish(e.to_string()))?;
            Some(uploaded.face_id)
        } else {
            None
        };
        let verdict = LivenessVerdict {
            is_liveness_succeeded: succeeded,
            message: message.map(|m| m.to_string()),
            best_image_id,
        };
        self.publish_liveness_result(session_id, &verdict)
            .await
            .map_err(|e| SinkError::Publish(e.to_string()))
    }
}

async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await?;
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(ApiError::Rejected {
            status,
            error_code: envelope.error_code,
            message: envelope.message,
        }),
        Err(_) => Err(ApiError::Status { status, body }),
    }
}
