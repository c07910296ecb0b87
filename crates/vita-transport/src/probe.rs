//! Network measurement seam used by the connectivity gate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One network measurement sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMeasurement {
    /// The probe's own overall judgement.
    pub good_connectivity: bool,
    /// Download throughput in kbit/s.
    pub download_kbps: f64,
    /// Upload throughput in kbit/s. Not every probe can measure upload.
    pub upload_kbps: Option<f64>,
    pub latency_ms: f64,
}

/// Tuning passed to `NetworkProbe::measure`.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    /// Payload size per throughput sample, in KiB.
    pub sample_kb: u32,
    /// Latency round-trips to average.
    pub latency_samples: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            sample_kb: 256,
            latency_samples: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("measurement failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Run one measurement. May take arbitrarily long; callers impose
    /// their own deadline.
    async fn measure(&self, config: ProbeConfig) -> Result<NetworkMeasurement, ProbeError>;
}
