//! Face storage and matching for bio-sessions.
//!
//! Uploaded frames are summarized into a fixed-size brightness
//! histogram descriptor. Identical captures of one subject land in the
//! same bins, distinct subjects spread across different ones, which is
//! all the comparison endpoint needs while staying deterministic.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use vita_core::types::{FaceMetadata, MatchVerdict};

/// Number of histogram bins (256 brightness values / 4).
pub const DESCRIPTOR_BINS: usize = 64;

/// L2-normalized brightness histogram of one face image.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    bins: [f32; DESCRIPTOR_BINS],
}

impl Descriptor {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bins = [0.0f32; DESCRIPTOR_BINS];
        for &b in bytes {
            bins[(b >> 2) as usize] += 1.0;
        }
        let norm = bins.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut bins {
                *v /= norm;
            }
        }
        Self { bins }
    }

    /// Cosine similarity. Bins are non-negative, so the score lands in
    /// [0, 1].
    pub fn similarity(&self, other: &Descriptor) -> f32 {
        self.bins
            .iter()
            .zip(other.bins.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Strategy for comparing two stored faces.
pub trait Matcher: Send + Sync {
    fn compare(&self, reference: &Descriptor, probe: &Descriptor, threshold: f32) -> MatchVerdict;
}

/// Cosine similarity matcher.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(&self, reference: &Descriptor, probe: &Descriptor, threshold: f32) -> MatchVerdict {
        let score = reference.similarity(probe);
        MatchVerdict {
            matching: score >= threshold,
            score,
        }
    }
}

struct StoredFace {
    bytes: Vec<u8>,
    descriptor: Descriptor,
    #[allow(dead_code)]
    metadata: FaceMetadata,
}

struct BioSession {
    faces: HashMap<String, StoredFace>,
    expires_at: DateTime<Utc>,
}

/// In-memory face store, one bucket per bio-session. Buckets are
/// created lazily on first upload and age out unconditionally.
pub struct FaceStore {
    sessions: RwLock<HashMap<String, BioSession>>,
    ttl: Duration,
}

impl FaceStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Store one face image; returns the new face id.
    pub async fn upload(
        &self,
        session_id: &str,
        bytes: Vec<u8>,
        metadata: FaceMetadata,
    ) -> String {
        let face_id = format!("face-{}", Uuid::new_v4());
        let face = StoredFace {
            descriptor: Descriptor::from_bytes(&bytes),
            bytes,
            metadata,
        };

        let mut sessions = self.sessions.write().await;
        let bucket = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| BioSession {
                faces: HashMap::new(),
                expires_at: Utc::now() + self.ttl,
            });
        bucket.faces.insert(face_id.clone(), face);

        tracing::debug!(session_id, face_id = %face_id, "face stored");
        face_id
    }

    pub async fn image(&self, session_id: &str, face_id: &str) -> Result<Vec<u8>> {
        let sessions = self.sessions.read().await;
        let bucket = live_bucket(&sessions, session_id)?;
        bucket
            .faces
            .get(face_id)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| ApiError::FaceNotFound(face_id.to_string()))
    }

    /// Compare two faces of one bio-session.
    pub async fn compare(
        &self,
        session_id: &str,
        reference: &str,
        probe: &str,
        matcher: &dyn Matcher,
        threshold: f32,
    ) -> Result<MatchVerdict> {
        let sessions = self.sessions.read().await;
        let bucket = live_bucket(&sessions, session_id)?;
        let reference = bucket
            .faces
            .get(reference)
            .ok_or_else(|| ApiError::FaceNotFound(reference.to_string()))?;
        let probe = bucket
            .faces
            .get(probe)
            .ok_or_else(|| ApiError::FaceNotFound(probe.to_string()))?;
        Ok(matcher.compare(&reference.descriptor, &probe.descriptor, threshold))
    }

    /// Drop aged-out buckets. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, b| now <= b.expires_at);
        before - sessions.len()
    }
}

fn live_bucket<'a>(
    sessions: &'a HashMap<String, BioSession>,
    session_id: &str,
) -> Result<&'a BioSession> {
    match sessions.get(session_id) {
        Some(bucket) if Utc::now() <= bucket.expires_at => Ok(bucket),
        _ => Err(ApiError::SessionNotFound(session_id.to_string())),
    }
}
