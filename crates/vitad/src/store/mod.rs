//! In-memory session stores with TTL eviction.

pub mod document;
pub mod liveness;

pub use document::DocumentStore;
pub use liveness::LivenessStore;
