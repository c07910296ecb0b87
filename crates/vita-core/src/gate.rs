//! Connectivity gating ahead of (and during) capture.

use std::sync::Arc;
use std::time::Duration;
use vita_transport::{CaptureTransport, NetworkMeasurement, NetworkProbe, ProbeConfig};

/// Gate thresholds and measurement deadline.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// Hard deadline for one measurement.
    pub measure_timeout: Duration,
    /// Minimum acceptable upload throughput, kbit/s.
    pub upload_floor_kbps: f64,
    /// Minimum acceptable download throughput, kbit/s.
    pub download_floor_kbps: f64,
    pub probe: ProbeConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            measure_timeout: Duration::from_secs(10),
            upload_floor_kbps: 500.0,
            download_floor_kbps: 1000.0,
            probe: ProbeConfig::default(),
        }
    }
}

/// Which side of the link fell short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeakMetric {
    Upload,
    Download,
    /// No measurement was available at all.
    Unknown,
}

/// Outcome of one gate pass.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Good(NetworkMeasurement),
    /// Show remediation; `weak` names the metric furthest below its floor.
    Remediate {
        weak: WeakMetric,
        measurement: Option<NetworkMeasurement>,
    },
}

/// Connectivity gate with a one-shot satisfied latch.
///
/// The latch lets the outer re-check loop stop once a pass has
/// confirmed the link, even if later signals race in.
pub struct ConnectivityGate {
    config: GateConfig,
    satisfied: bool,
}

impl ConnectivityGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            satisfied: false,
        }
    }

    /// Whether a previous pass already confirmed connectivity.
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Run one measurement under the deadline. Probe errors and
    /// deadline overruns both yield no measurement.
    pub async fn measure(&self, probe: &Arc<dyn NetworkProbe>) -> Option<NetworkMeasurement> {
        let deadline = self.config.measure_timeout;
        match tokio::time::timeout(deadline, probe.measure(self.config.probe)).await {
            Ok(Ok(measurement)) => Some(measurement),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "network probe failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    "network probe timed out"
                );
                None
            }
        }
    }

    /// Apply the decision policy to a measurement.
    pub fn evaluate(&self, measurement: Option<&NetworkMeasurement>) -> GateVerdict {
        let Some(m) = measurement else {
            return GateVerdict::Remediate {
                weak: WeakMetric::Unknown,
                measurement: None,
            };
        };
        let upload_ok = m
            .upload_kbps
            .is_some_and(|u| u >= self.config.upload_floor_kbps);
        let download_ok = m.download_kbps >= self.config.download_floor_kbps;
        if m.good_connectivity && upload_ok && download_ok {
            return GateVerdict::Good(*m);
        }
        GateVerdict::Remediate {
            weak: self.weaker_of(m),
            measurement: Some(*m),
        }
    }

    /// One full gate pass: measure, evaluate, latch on success. A bad
    /// verdict tears down any in-progress capture transport.
    pub async fn check(
        &mut self,
        probe: &Arc<dyn NetworkProbe>,
        transport: Option<&Arc<dyn CaptureTransport>>,
    ) -> GateVerdict {
        let measurement = self.measure(probe).await;
        let verdict = self.evaluate(measurement.as_ref());
        match &verdict {
            GateVerdict::Good(m) => {
                self.satisfied = true;
                tracing::info!(
                    download_kbps = m.download_kbps,
                    upload_kbps = ?m.upload_kbps,
                    latency_ms = m.latency_ms,
                    "connectivity confirmed"
                );
            }
            GateVerdict::Remediate { weak, .. } => {
                tracing::warn!(weak = ?weak, "connectivity below floor");
                if let Some(t) = transport {
                    t.disconnect().await;
                }
            }
        }
        verdict
    }

    /// Name the metric furthest below its floor, as a ratio to the
    /// floor. A missing upload figure counts as the weakest possible.
    fn weaker_of(&self, m: &NetworkMeasurement) -> WeakMetric {
        let upload_ratio = m
            .upload_kbps
            .map_or(0.0, |u| u / self.config.upload_floor_kbps);
        let download_ratio = m.download_kbps / self.config.download_floor_kbps;
        if upload_ratio <= download_ratio {
            WeakMetric::Upload
        } else {
            WeakMetric::Download
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_transport::sim::SimProbe;
    use vita_transport::NetworkProbe as _;

    fn measurement(download: f64, upload: Option<f64>, good: bool) -> NetworkMeasurement {
        NetworkMeasurement {
            good_connectivity: good,
            download_kbps: download,
            upload_kbps: upload,
            latency_ms: 40.0,
        }
    }

    fn probe(p: SimProbe) -> Arc<dyn NetworkProbe> {
        Arc::new(p)
    }

    #[tokio::test]
    async fn test_good_measurement_opens_and_latches_the_gate() {
        let mut gate = ConnectivityGate::new(GateConfig::default());
        assert!(!gate.is_satisfied());
        let verdict = gate.check(&probe(SimProbe::good()), None).await;
        assert!(matches!(verdict, GateVerdict::Good(_)));
        assert!(gate.is_satisfied());
    }

    #[test]
    fn test_slow_upload_names_upload() {
        let gate = ConnectivityGate::new(GateConfig::default());
        let m = measurement(1500.0, Some(200.0), true);
        match gate.evaluate(Some(&m)) {
            GateVerdict::Remediate { weak, .. } => assert_eq!(weak, WeakMetric::Upload),
            other => panic!("expected remediation, got {other:?}"),
        }
    }

    #[test]
    fn test_slow_download_names_download() {
        let gate = ConnectivityGate::new(GateConfig::default());
        let m = measurement(400.0, Some(700.0), true);
        match gate.evaluate(Some(&m)) {
            GateVerdict::Remediate { weak, .. } => assert_eq!(weak, WeakMetric::Download),
            other => panic!("expected remediation, got {other:?}"),
        }
    }

    #[test]
    fn test_not_good_flag_names_the_weaker_metric() {
        // Both figures above their floors, but the probe says not good.
        // Download sits at 1.2x its floor, upload at 1.6x, so download
        // is the weaker of the two.
        let gate = ConnectivityGate::new(GateConfig::default());
        let m = measurement(1200.0, Some(800.0), false);
        match gate.evaluate(Some(&m)) {
            GateVerdict::Remediate { weak, .. } => assert_eq!(weak, WeakMetric::Download),
            other => panic!("expected remediation, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_upload_figure_blocks_the_gate() {
        let gate = ConnectivityGate::new(GateConfig::default());
        let m = measurement(1500.0, None, true);
        match gate.evaluate(Some(&m)) {
            GateVerdict::Remediate { weak, .. } => assert_eq!(weak, WeakMetric::Upload),
            other => panic!("expected remediation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_overrunning_deadline_yields_no_measurement() {
        let config = GateConfig {
            measure_timeout: Duration::from_millis(10),
            ..GateConfig::default()
        };
        let mut gate = ConnectivityGate::new(config);
        let slow = probe(SimProbe::silent(Duration::from_millis(200)));
        let verdict = gate.check(&slow, None).await;
        assert_eq!(
            verdict,
            GateVerdict::Remediate {
                weak: WeakMetric::Unknown,
                measurement: None,
            }
        );
        assert!(!gate.is_satisfied());
    }

    #[tokio::test]
    async fn test_bad_verdict_disconnects_transport() {
        use vita_transport::sim::{ChallengeSink, SimTransport, SinkError};
        use vita_transport::CaptureTransport;

        struct NullSink;
        #[async_trait::async_trait]
        impl ChallengeSink for NullSink {
            async fn challenge_completed(
                &self,
                _session_id: &str,
                _succeeded: bool,
                _message: Option<&str>,
                _best_frame: &[u8],
            ) -> Result<(), SinkError> {
                Ok(())
            }
        }

        let transport = Arc::new(SimTransport::new(Arc::new(NullSink)));
        let dyn_transport: Arc<dyn CaptureTransport> = transport.clone();
        let mut gate = ConnectivityGate::new(GateConfig::default());
        let verdict = gate
            .check(&probe(SimProbe::unreachable()), Some(&dyn_transport))
            .await;
        assert!(matches!(verdict, GateVerdict::Remediate { .. }));
        // The transport was force-disconnected.
        assert!(transport.color_displayed().await.is_err());
    }

    #[tokio::test]
    async fn test_probe_error_is_treated_as_no_measurement() {
        let gate = ConnectivityGate::new(GateConfig::default());
        let result = SimProbe::unreachable().measure(ProbeConfig::default()).await;
        assert!(result.is_err());
        assert_eq!(
            gate.evaluate(None),
            GateVerdict::Remediate {
                weak: WeakMetric::Unknown,
                measurement: None,
            }
        );
    }
}
