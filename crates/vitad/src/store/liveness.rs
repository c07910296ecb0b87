//! Liveness session records.
//!
//! A session starts with no verdict. Only the tracker's publish makes
//! the result visible to pollers; until then probes get
//! `RESULT_NOT_READY`. Sessions age out unconditionally, publishing
//! does not extend the deadline.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use vita_core::types::{LivenessVerdict, SessionHandle};

struct LivenessRecord {
    identity_id: Option<String>,
    verdict: Option<LivenessVerdict>,
    expires_at: DateTime<Utc>,
}

impl LivenessRecord {
    fn live(&self) -> bool {
        Utc::now() <= self.expires_at
    }
}

pub struct LivenessStore {
    sessions: RwLock<HashMap<String, LivenessRecord>>,
    ttl: Duration,
}

impl LivenessStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Open a session. A caller-chosen id re-keys (and resets) any
    /// record already stored under it.
    pub async fn init(
        &self,
        session_id: Option<String>,
        identity_id: Option<String>,
    ) -> SessionHandle {
        let id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = LivenessRecord {
            identity_id: identity_id.clone(),
            verdict: None,
            expires_at: Utc::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), record);
        tracing::info!(session_id = %id, "liveness session opened");

        SessionHandle {
            session_id: id,
            identity_id,
        }
    }

    /// Store the tracker's verdict.
    pub async fn publish(&self, session_id: &str, verdict: LivenessVerdict) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(record) if record.live() => {
                tracing::info!(
                    session_id,
                    succeeded = verdict.is_liveness_succeeded,
                    "liveness verdict published"
                );
                record.verdict = Some(verdict);
                Ok(())
            }
            _ => Err(ApiError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Fetch the verdict; `RESULT_NOT_READY` while it is outstanding.
    pub async fn result(&self, session_id: &str) -> Result<LivenessVerdict> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(record) if record.live() => record
                .verdict
                .clone()
                .ok_or_else(|| ApiError::ResultNotReady(session_id.to_string())),
            _ => Err(ApiError::SessionNotFound(session_id.to_string())),
        }
    }

    pub async fn identity(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|r| r.live())
            .and_then(|r| r.identity_id.clone())
    }

    /// Drop aged-out sessions. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, r| now <= r.expires_at);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "expired liveness sessions swept");
        }
        removed
    }
}
