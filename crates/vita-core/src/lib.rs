//! vita-core: capture-flow engine. Session controller, challenge
//! sequencing, result polling, and connectivity gating.
//!
//! The controller drives device seams from `vita-transport` and a
//! [`Backend`] implementation; everything observable (screens,
//! guidance, plan colours) is published through channels so frontends
//! stay thin.

pub mod backend;
pub mod controller;
pub mod error;
pub mod gate;
pub mod illumination;
pub mod poller;
pub mod sequencer;
pub mod types;

pub use backend::{Backend, BackendError};
pub use controller::{CaptureReport, CaptureSessionController, ControllerConfig, FlowSignals};
pub use error::CaptureError;
pub use gate::{ConnectivityGate, GateConfig, GateVerdict, WeakMetric};
pub use illumination::IlluminationPlayer;
pub use poller::{PollError, PollOutcome, PollPolicy, ResultPoller};
pub use sequencer::{reduce_guidance, IlluminationPlan, IlluminationStep};
pub use types::{
    CountryDocTypes, DocRule, DocSessionHandle, DocSessionRequest, DocSide, DocSideRecord,
    ErrorEnvelope, FaceMetadata, FaceUploaded, Guidance, LivenessVerdict, MatchVerdict, RuleKind,
    RuleResult, ScreenState, SessionHandle, ShapedDocResult,
};
