//! REST API surface.
//!
//! Route paths and wire shapes are shared with `vita-client`; handlers
//! stay thin and defer to the stores. Refusals surface as the error
//! envelope via [`ApiError`].

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::catalogue;
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::faces::{CosineMatcher, FaceStore, Matcher};
use crate::store::{DocumentStore, LivenessStore};
use vita_core::types::{
    CountryDocTypes, DocSessionHandle, DocSessionRequest, DocSide, DocSideRecord, FaceMetadata,
    FaceUploaded, LivenessVerdict, MatchVerdict, SessionHandle, ShapedDocResult,
};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub liveness: Arc<LivenessStore>,
    pub documents: Arc<DocumentStore>,
    pub faces: Arc<FaceStore>,
    pub matcher: Arc<dyn Matcher>,
    pub match_threshold: f32,
    /// Precomputed merged country listing.
    pub countries: Arc<Vec<CountryDocTypes>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            liveness: Arc::new(LivenessStore::new(config.liveness_ttl_secs)),
            documents: Arc::new(DocumentStore::new(
                config.doc_ttl_secs,
                config.callback_required,
            )),
            faces: Arc::new(FaceStore::new(config.face_ttl_secs)),
            matcher: Arc::new(CosineMatcher),
            match_threshold: config.match_threshold,
            countries: Arc::new(catalogue::country_listing(&config.extra_doc_types)),
        }
    }

    /// One expiry pass over every store.
    pub async fn sweep(&self) {
        let removed = self.liveness.sweep().await
            + self.documents.sweep().await
            + self.faces.sweep().await;
        if removed > 0 {
            tracing::debug!(removed, "expiry sweep done");
        }
    }
}

/// Build the API router. The callback route is configurable because
/// deployments register it with the capture vendor.
pub fn create_router(state: AppState, callback_path: &str) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/init-liveness-session", get(init_liveness))
        .route("/init-liveness-session/:session_id", get(init_liveness_with_id))
        .route(
            "/liveness-challenge-result/:session_id",
            get(liveness_result).post(publish_liveness_result),
        )
        .route("/bio-session/:session_id/faces", post(upload_face))
        .route("/bio-session/:session_id/faces/:face_id/image", get(face_image))
        .route(
            "/bio-session/:session_id/faces/:face_id/matches/:candidate",
            get(match_faces),
        )
        .route("/init-document-session", post(init_document_session))
        .route("/countries/doc-types", get(country_doc_types))
        .route("/doc-capture-result/:session_id", post(push_doc_result))
        .route(
            "/doc-capture-result/:session_id/:doc_type/:doc_side",
            get(doc_capture_result),
        )
        .route(callback_path, post(doc_capture_callback))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitQuery {
    identity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    #[serde(default)]
    polling: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackBody {
    session_id: Option<String>,
    capture_id: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn init_liveness(
    State(state): State<AppState>,
    Query(query): Query<InitQuery>,
) -> Json<SessionHandle> {
    Json(state.liveness.init(None, query.identity_id).await)
}

async fn init_liveness_with_id(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<InitQuery>,
) -> Json<SessionHandle> {
    Json(state.liveness.init(Some(session_id), query.identity_id).await)
}

async fn liveness_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<LivenessVerdict>> {
    if query.polling {
        tracing::debug!(session_id = %session_id, "verdict poll");
    }
    Ok(Json(state.liveness.result(&session_id).await?))
}

async fn publish_liveness_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(verdict): Json<LivenessVerdict>,
) -> Result<StatusCode> {
    state.liveness.publish(&session_id, verdict).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart upload: an `image` bytes part plus an optional `face`
/// JSON metadata part.
async fn upload_face(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<FaceUploaded>> {
    let mut image: Option<Vec<u8>> = None;
    let mut metadata = FaceMetadata::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("bad multipart payload: {e}")))?
    {
        match field.name() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("bad image part: {e}")))?;
                image = Some(bytes.to_vec());
            }
            Some("face") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("bad face part: {e}")))?;
                metadata = serde_json::from_str(&text)
                    .map_err(|e| ApiError::Validation(format!("bad face metadata: {e}")))?;
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::Validation("image part is required".to_string()))?;
    let face_id = state.faces.upload(&session_id, image, metadata).await;
    Ok(Json(FaceUploaded { face_id }))
}

async fn face_image(
    State(state): State<AppState>,
    Path((session_id, face_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let bytes = state.faces.image(&session_id, &face_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

async fn match_faces(
    State(state): State<AppState>,
    Path((session_id, reference, candidate)): Path<(String, String, String)>,
) -> Result<Json<MatchVerdict>> {
    let verdict = state
        .faces
        .compare(
            &session_id,
            &reference,
            &candidate,
            state.matcher.as_ref(),
            state.match_threshold,
        )
        .await?;
    Ok(Json(verdict))
}

async fn init_document_session(
    State(state): State<AppState>,
    Json(request): Json<DocSessionRequest>,
) -> Result<Json<DocSessionHandle>> {
    Ok(Json(state.documents.init(request).await?))
}

async fn country_doc_types(State(state): State<AppState>) -> Json<Vec<CountryDocTypes>> {
    Json(state.countries.as_ref().clone())
}

async fn push_doc_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(record): Json<DocSideRecord>,
) -> Result<StatusCode> {
    state.documents.push_side(&session_id, record).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn doc_capture_result(
    State(state): State<AppState>,
    Path((session_id, doc_type, doc_side)): Path<(String, String, String)>,
    Query(query): Query<PollQuery>,
) -> Result<Json<ShapedDocResult>> {
    let side = match doc_side.as_str() {
        "front" => DocSide::Front,
        "back" => DocSide::Back,
        other => {
            return Err(ApiError::Validation(format!(
                "unknown document side: {other}"
            )))
        }
    };
    if query.polling {
        tracing::debug!(session_id = %session_id, side = side.as_str(), "document result poll");
    }
    Ok(Json(state.documents.shaped(&session_id, &doc_type, side).await?))
}

async fn doc_capture_callback(
    State(state): State<AppState>,
    Json(body): Json<CallbackBody>,
) -> Result<StatusCode> {
    let session_id = body
        .session_id
        .ok_or_else(|| ApiError::Validation("sessionId is required".to_string()))?;
    state
        .documents
        .on_callback(&session_id, body.capture_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
