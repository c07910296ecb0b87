//! Flow states and wire shapes shared by client and server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Screens of the capture flow, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenState {
    Tutorial,
    EnvironmentCheck,
    ConnectivityCheck,
    Capturing,
    Success,
    Failure,
    SecondaryCapture,
    MatchSucceeded,
    MatchFailed,
}

/// On-screen guidance derived from tracking telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Guidance {
    MoveCloser,
    NoFace,
    ChallengeAnimation,
    Hidden,
}

/// Server-issued liveness session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
}

/// Completed-challenge verdict as stored and served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessVerdict {
    pub is_liveness_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Face id of the best frame, fetchable from the same bio-session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_image_id: Option<String>,
}

/// Outcome of comparing two stored faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchVerdict {
    pub matching: bool,
    pub score: f32,
}

/// Metadata attached to an uploaded face image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Where the image came from, e.g. "challenge" or "secondary".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Response to a face upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceUploaded {
    pub face_id: String,
}

/// Kinds of extraction rules a document capture can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Ocr,
    Mrz,
    Pdf417,
}

/// One configured extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRule {
    pub kind: RuleKind,
    pub name: String,
}

/// Document sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocSide {
    Front,
    Back,
}

impl DocSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocSide::Front => "front",
            DocSide::Back => "back",
        }
    }
}

/// Client request to open a document-capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSessionRequest {
    pub country: String,
    pub doc_type: String,
    /// Explicit rule overrides; the server picks defaults when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<DocRule>>,
}

/// Server response opening a document-capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSessionHandle {
    pub session_id: String,
    pub doc_type: String,
    /// Physical document format, e.g. "td1" (cards) or "td3" (passports).
    pub format: String,
    pub rules: Vec<DocRule>,
}

/// One rule's extraction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub kind: RuleKind,
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// One captured-side record as reported by the capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSideRecord {
    pub side: DocSide,
    #[serde(default)]
    pub timeout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Base64-encoded cropped document image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_image: Option<String>,
    /// Corner points of the document quad, pixel coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_corners: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub rule_results: Vec<RuleResult>,
}

/// Client-facing shape of one side's result: OCR and MRZ fields merged
/// into one record, PDF417 kept separate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapedDocResult {
    pub side: DocSide,
    pub timeout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_corners: Option<Vec<[f32; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf417: Option<BTreeMap<String, String>>,
}

/// One entry of the merged country/document-type listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDocTypes {
    pub country: String,
    pub doc_types: Vec<String>,
}

/// Wire shape every backend error is reported in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub message: String,
}
