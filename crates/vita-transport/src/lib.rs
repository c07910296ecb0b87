//! vita-transport: device seams for the capture flow.
//!
//! Defines the capability traits the session controller talks to
//! (capture transport, media source, network probe, environment
//! detector) plus scripted simulator implementations that stand in for
//! the vendor tracker and browser devices in demos and tests.

pub mod environment;
pub mod media;
pub mod probe;
pub mod sim;
pub mod tracking;
pub mod transport;

pub use environment::{EnvironmentDetector, EnvironmentReport};
pub use media::{MediaError, MediaSource, MediaStream};
pub use probe::{NetworkMeasurement, NetworkProbe, ProbeConfig, ProbeError};
pub use tracking::{plan_tokens, PlanToken, TrackingEvent};
pub use transport::{CaptureTransport, ChallengeInstruction, TransportError, TransportEvent};
