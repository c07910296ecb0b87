//! Environment support detection.

use serde::{Deserialize, Serialize};

/// Outcome of the environment check shown before capture starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReport {
    pub supported: bool,
    pub os: String,
    pub supported_browsers: Vec<String>,
}

pub trait EnvironmentDetector: Send + Sync {
    fn detect(&self) -> EnvironmentReport;
}
