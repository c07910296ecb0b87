//! Challenge sequencing: guidance reduction and illumination-plan
//! decoding. Everything here is pure.

use crate::types::Guidance;
use std::time::Duration;
use vita_transport::{PlanToken, TrackingEvent};

/// One decoded illumination step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlluminationStep {
    pub color: String,
    pub duration: Duration,
}

/// Decoded illumination plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IlluminationPlan {
    pub steps: Vec<IlluminationStep>,
}

impl IlluminationPlan {
    /// Decode the flat token array: colours at even indices, display
    /// durations at odd indices. The walk stops at the first even index
    /// that holds no colour; a trailing colour with no duration is kept
    /// with a zero duration.
    pub fn decode(tokens: &[PlanToken]) -> Self {
        let mut steps = Vec::new();
        let mut i = 0;
        while let Some(PlanToken::Color(color)) = tokens.get(i) {
            let duration = match tokens.get(i + 1) {
                Some(PlanToken::Millis(ms)) => Duration::from_millis(*ms),
                _ => Duration::ZERO,
            };
            steps.push(IlluminationStep {
                color: color.clone(),
                duration,
            });
            i += 2;
        }
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Reduce one tracking event to the guidance overlay to show.
///
/// Priority order: too-far wins, then a missing face, then an active
/// challenge; otherwise nothing is shown. Pure: the same event with the
/// same challenge flag always reduces to the same guidance.
pub fn reduce_guidance(event: &TrackingEvent, challenge_active: bool) -> Guidance {
    if event.too_far {
        Guidance::MoveCloser
    } else if !event.face_present() {
        Guidance::NoFace
    } else if challenge_active {
        Guidance::ChallengeAnimation
    } else {
        Guidance::Hidden
    }
}
