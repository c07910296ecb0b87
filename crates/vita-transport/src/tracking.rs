//! Tracking telemetry pushed by the capture transport, one event per
//! analysed frame.

use serde::{Deserialize, Serialize};

/// Face-tracking telemetry for one frame.
///
/// A zero-area face box means no face was detected. The colour sequence
/// is attached to at most one event per challenge and carries the
/// illumination plan as a flat token array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub face_width: f32,
    pub face_height: f32,
    /// Tracker's own distance judgement for this frame.
    pub too_far: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_sequence: Option<Vec<PlanToken>>,
}

impl TrackingEvent {
    /// Whether this frame contains a detected face (non-zero box area).
    pub fn face_present(&self) -> bool {
        self.face_width * self.face_height > 0.0
    }

    /// A frame with no face and no plan.
    pub fn no_face() -> Self {
        Self {
            face_width: 0.0,
            face_height: 0.0,
            too_far: false,
            color_sequence: None,
        }
    }

    /// A frame with a face box of the given size.
    pub fn face(width: f32, height: f32, too_far: bool) -> Self {
        Self {
            face_width: width,
            face_height: height,
            too_far,
            color_sequence: None,
        }
    }
}

/// One token of the flat illumination-plan array.
///
/// The wire layout alternates colour names at even indices with display
/// durations in milliseconds at odd indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanToken {
    Millis(u64),
    Color(String),
}

/// Build a flat token array from `(colour, duration-ms)` pairs.
pub fn plan_tokens(pairs: &[(&str, u64)]) -> Vec<PlanToken> {
    let mut tokens = Vec::with_capacity(pairs.len() * 2);
    for (color, millis) in pairs {
        tokens.push(PlanToken::Color((*color).to_string()));
        tokens.push(PlanToken::Millis(*millis));
    }
    tokens
}
