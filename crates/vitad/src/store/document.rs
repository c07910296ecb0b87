//! Document capture session records.
//!
//! The capture device pushes raw side records as it goes; the
//! completion callback is what makes them readable. Result reads scan
//! the pushed records newest-first per side, so a retaken side
//! supersedes earlier takes. Sessions age out unconditionally.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalogue;
use crate::error::{ApiError, Result};
use vita_core::types::{
    DocRule, DocSessionHandle, DocSessionRequest, DocSide, DocSideRecord, RuleKind,
    ShapedDocResult,
};

struct DocRecord {
    doc_type: String,
    #[allow(dead_code)]
    rules: Vec<DocRule>,
    callback_received: bool,
    capture_id: Option<String>,
    /// Side records in push order; reads scan this back-to-front.
    sides: Vec<DocSideRecord>,
    expires_at: DateTime<Utc>,
}

impl DocRecord {
    fn live(&self) -> bool {
        Utc::now() <= self.expires_at
    }
}

pub struct DocumentStore {
    sessions: RwLock<HashMap<String, DocRecord>>,
    ttl: Duration,
    /// When false, results are readable as soon as a side exists.
    callback_required: bool,
}

impl DocumentStore {
    pub fn new(ttl_secs: u64, callback_required: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
            callback_required,
        }
    }

    /// Open a document session. The document type must be known to the
    /// catalogue; rules default from it unless the request overrides.
    pub async fn init(&self, request: DocSessionRequest) -> Result<DocSessionHandle> {
        let entry = catalogue::lookup_doc_type(&request.doc_type).ok_or_else(|| {
            ApiError::Validation(format!("unknown document type: {}", request.doc_type))
        })?;
        let rules = request.rules.unwrap_or_else(|| entry.rules.clone());

        let session_id = Uuid::new_v4().to_string();
        let record = DocRecord {
            doc_type: request.doc_type.clone(),
            rules: rules.clone(),
            callback_received: false,
            capture_id: None,
            sides: Vec::new(),
            expires_at: Utc::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), record);
        tracing::info!(
            session_id = %session_id,
            doc_type = %request.doc_type,
            country = %request.country,
            "document session opened"
        );

        Ok(DocSessionHandle {
            session_id,
            doc_type: request.doc_type,
            format: entry.format.clone(),
            rules,
        })
    }

    /// Append one captured side. Pushes are accepted before the
    /// completion callback; they only become readable after it.
    pub async fn push_side(&self, session_id: &str, record: DocSideRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(doc) if doc.live() => {
                tracing::debug!(
                    session_id,
                    side = record.side.as_str(),
                    timeout = record.timeout,
                    "document side pushed"
                );
                doc.sides.push(record);
                Ok(())
            }
            _ => Err(ApiError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Record the completion callback, unlocking result reads.
    pub async fn on_callback(&self, session_id: &str, capture_id: Option<String>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(doc) if doc.live() => {
                tracing::info!(session_id, capture_id = ?capture_id, "capture callback received");
                doc.callback_received = true;
                doc.capture_id = capture_id;
                Ok(())
            }
            _ => Err(ApiError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Shaped result for one side: the newest record of that side, OCR
    /// and MRZ fields merged, PDF417 fields kept separate.
    pub async fn shaped(
        &self,
        session_id: &str,
        doc_type: &str,
        side: DocSide,
    ) -> Result<ShapedDocResult> {
        let sessions = self.sessions.read().await;
        let doc = match sessions.get(session_id) {
            Some(doc) if doc.live() => doc,
            _ => return Err(ApiError::SessionNotFound(session_id.to_string())),
        };
        if doc.doc_type != doc_type {
            return Err(ApiError::Validation(format!(
                "session is for {}, not {doc_type}",
                doc.doc_type
            )));
        }
        if self.callback_required && !doc.callback_received {
            return Err(ApiError::ResultNotReady(session_id.to_string()));
        }
        doc.sides
            .iter()
            .rev()
            .find(|r| r.side == side)
            .map(shape)
            .ok_or_else(|| ApiError::ResultNotReady(session_id.to_string()))
    }

    /// Drop aged-out sessions. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, r| now <= r.expires_at);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "expired document sessions swept");
        }
        removed
    }
}

fn shape(record: &DocSideRecord) -> ShapedDocResult {
    let mut ocr: BTreeMap<String, String> = BTreeMap::new();
    let mut pdf417: BTreeMap<String, String> = BTreeMap::new();
    for rule in &record.rule_results {
        match rule.kind {
            RuleKind::Ocr | RuleKind::Mrz => ocr.extend(rule.fields.clone()),
            RuleKind::Pdf417 => pdf417.extend(rule.fields.clone()),
        }
    }
    ShapedDocResult {
        side: record.side,
        timeout: record.timeout,
        diagnostic: record.diagnostic.clone(),
        doc_image: record.doc_image.clone(),
        doc_corners: record.doc_corners.clone(),
        ocr: (!ocr.is_empty()).then_some(ocr),
        pdf417: (!pdf417.is_empty()).then_some(pdf417),
    }
}
