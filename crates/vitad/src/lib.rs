//! vitad: the capture backend daemon.
//!
//! Serves the REST surface the capture flow talks to: liveness
//! sessions with callback-published verdicts, face storage and
//! matching within a bio-session, and document capture sessions whose
//! results unlock once the completion callback lands. Everything is
//! held in memory and aged out by TTL.

pub mod catalogue;
pub mod config;
pub mod error;
pub mod faces;
pub mod http_api;
pub mod store;

pub use config::Config;
pub use error::{ApiError, Result};
pub use http_api::{create_router, AppState};
