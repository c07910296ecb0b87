//! Scripted stand-ins for the device seams.
//!
//! Demos and tests run the full capture flow without a real camera,
//! tracker, or network path. The transport sim replays a fixed event
//! script and reports its verdict through a [`ChallengeSink`], mirroring
//! how the production tracker reports to the backend out of band.

use crate::environment::{EnvironmentDetector, EnvironmentReport};
use crate::media::{MediaError, MediaSource, MediaStream};
use crate::probe::{NetworkMeasurement, NetworkProbe, ProbeConfig, ProbeError};
use crate::tracking::{plan_tokens, TrackingEvent};
use crate::transport::{CaptureTransport, ChallengeInstruction, TransportError, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Synthetic frame side length; frames are side*side grayscale bytes.
const FRAME_SIDE: usize = 64;

/// Default seed for the best-frame and still-image generators.
pub const DEFAULT_FRAME_SEED: u8 = 32;

/// Deterministic synthetic grayscale frame.
///
/// Identical seeds produce identical bytes; distant seeds produce frames
/// in disjoint brightness bands, which keeps descriptor matching
/// predictable in demos.
pub fn synthetic_frame(seed: u8) -> Vec<u8> {
    (0..FRAME_SIDE * FRAME_SIDE)
        .map(|i| seed.wrapping_add((i % 16) as u8))
        .collect()
}

/// Receives the tracker-side outcome of a finished challenge.
///
/// The production tracker reports to the backend over its own channel;
/// sims publish through this seam instead so the verdict still arrives
/// at the backend and the client still has to poll for it.
#[async_trait]
pub trait ChallengeSink: Send + Sync {
    async fn challenge_completed(
        &self,
        session_id: &str,
        succeeded: bool,
        message: Option<&str>,
        best_frame: &[u8],
    ) -> Result<(), SinkError>;
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Media source yielding synthetic streams and still frames.
pub struct SimMedia {
    deny: bool,
    still_seed: u8,
}

impl SimMedia {
    pub fn new() -> Self {
        Self {
            deny: false,
            still_seed: DEFAULT_FRAME_SEED,
        }
    }

    /// A source that refuses acquisition, as a denied permission would.
    pub fn denied() -> Self {
        Self {
            deny: true,
            still_seed: DEFAULT_FRAME_SEED,
        }
    }

    /// Change the seed of the generated still image.
    pub fn with_still_seed(mut self, seed: u8) -> Self {
        self.still_seed = seed;
        self
    }
}

impl Default for SimMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SimMedia {
    async fn acquire(&self) -> Result<MediaStream, MediaError> {
        if self.deny {
            return Err(MediaError::PermissionDenied);
        }
        Ok(MediaStream {
            id: uuid::Uuid::new_v4().to_string(),
            has_video: true,
            has_audio: true,
        })
    }

    async fn still_image(&self) -> Result<Vec<u8>, MediaError> {
        if self.deny {
            return Err(MediaError::PermissionDenied);
        }
        Ok(synthetic_frame(self.still_seed))
    }
}

/// Probe returning a scripted measurement after a fixed delay.
pub struct SimProbe {
    measurement: Option<NetworkMeasurement>,
    delay: Duration,
}

impl SimProbe {
    /// A healthy link: fast, low latency, probe judges it good.
    pub fn good() -> Self {
        Self::measured(NetworkMeasurement {
            good_connectivity: true,
            download_kbps: 1200.0,
            upload_kbps: Some(800.0),
            latency_ms: 35.0,
        })
    }

    pub fn measured(measurement: NetworkMeasurement) -> Self {
        Self {
            measurement: Some(measurement),
            delay: Duration::from_millis(5),
        }
    }

    /// A probe that cannot reach its endpoint.
    pub fn unreachable() -> Self {
        Self {
            measurement: None,
            delay: Duration::from_millis(5),
        }
    }

    /// A probe that stalls for `delay` before failing, to exercise
    /// caller-side deadlines.
    pub fn silent(delay: Duration) -> Self {
        Self {
            measurement: None,
            delay,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl NetworkProbe for SimProbe {
    async fn measure(&self, _config: ProbeConfig) -> Result<NetworkMeasurement, ProbeError> {
        tokio::time::sleep(self.delay).await;
        self.measurement
            .ok_or_else(|| ProbeError::Unreachable("scripted: no route".to_string()))
    }
}

const SUPPORTED_BROWSERS: &[&str] = &["chrome", "chromium", "edge", "firefox", "safari"];

/// Environment detector with a fixed answer.
pub struct SimEnvironment {
    supported: bool,
}

impl SimEnvironment {
    pub fn supported() -> Self {
        Self { supported: true }
    }

    pub fn unsupported() -> Self {
        Self { supported: false }
    }
}

impl EnvironmentDetector for SimEnvironment {
    fn detect(&self) -> EnvironmentReport {
        EnvironmentReport {
            supported: self.supported,
            os: std::env::consts::OS.to_string(),
            supported_browsers: SUPPORTED_BROWSERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One step of a transport script: wait `after`, then push `event`.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub after: Duration,
    pub event: TransportEvent,
}

impl ScriptStep {
    pub fn new(after_ms: u64, event: TransportEvent) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            event,
        }
    }
}

/// Tracker-side outcome the sim publishes once its script completes.
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    pub succeeded: bool,
    pub message: Option<String>,
    pub frame_seed: u8,
}

impl ScriptedOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            message: None,
            frame_seed: DEFAULT_FRAME_SEED,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            succeeded: false,
            message: Some(message.to_string()),
            frame_seed: DEFAULT_FRAME_SEED,
        }
    }

    pub fn with_frame_seed(mut self, seed: u8) -> Self {
        self.frame_seed = seed;
        self
    }
}

#[derive(Default)]
struct Inner {
    session_id: Option<String>,
    events: Option<mpsc::Sender<TransportEvent>>,
    player: Option<JoinHandle<()>>,
}

/// Scripted capture transport.
///
/// `start` replays the script into the controller's event channel from a
/// background task, then emits `ChallengeResult` and, after
/// `publish_delay`, reports the outcome through the sink. The delay
/// leaves a window in which backend polling sees a not-ready session.
pub struct SimTransport {
    script: Vec<ScriptStep>,
    outcome: Option<ScriptedOutcome>,
    publish_delay: Duration,
    sink: Arc<dyn ChallengeSink>,
    disconnected: Arc<AtomicBool>,
    color_acks: Arc<AtomicUsize>,
    inner: Mutex<Inner>,
}

impl SimTransport {
    /// Happy-path transport: brief no-face and too-far guidance, one
    /// colour challenge, verdict published as succeeded.
    pub fn new(sink: Arc<dyn ChallengeSink>) -> Self {
        Self {
            script: Self::default_script(),
            outcome: Some(ScriptedOutcome::success()),
            publish_delay: Duration::from_millis(250),
            sink,
            disconnected: Arc::new(AtomicBool::new(false)),
            color_acks: Arc::new(AtomicUsize::new(0)),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        self.script = script;
        self
    }

    /// `None` means the script ends without a challenge result.
    pub fn with_outcome(mut self, outcome: Option<ScriptedOutcome>) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    /// Colour acknowledgements received so far.
    pub fn color_acks(&self) -> usize {
        self.color_acks.load(Ordering::SeqCst)
    }

    pub fn default_script() -> Vec<ScriptStep> {
        let mut challenge = TrackingEvent::face(220.0, 280.0, false);
        challenge.color_sequence = Some(plan_tokens(&[
            ("white", 400),
            ("red", 400),
            ("green", 400),
            ("blue", 400),
        ]));
        vec![
            ScriptStep::new(50, TransportEvent::Instruction(ChallengeInstruction::Pending)),
            ScriptStep::new(100, TransportEvent::Tracking(TrackingEvent::no_face())),
            ScriptStep::new(
                150,
                TransportEvent::Tracking(TrackingEvent::face(120.0, 160.0, true)),
            ),
            ScriptStep::new(150, TransportEvent::Instruction(ChallengeInstruction::Active)),
            ScriptStep::new(100, TransportEvent::Tracking(challenge)),
            // Let the colour plan play out before the result lands.
            ScriptStep::new(
                1800,
                TransportEvent::Tracking(TrackingEvent::face(220.0, 280.0, false)),
            ),
        ]
    }
}

#[async_trait]
impl CaptureTransport for SimTransport {
    async fn connect(
        &self,
        session_id: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        inner.session_id = Some(session_id.to_string());
        inner.events = Some(events);
        Ok(())
    }

    async fn start(
        &self,
        _stream: MediaStream,
        recording_label: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let session_id = inner.session_id.clone().ok_or(TransportError::NotConnected)?;
        let events = inner.events.clone().ok_or(TransportError::NotConnected)?;
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        tracing::debug!(session = %session_id, label = %recording_label, "sim transport starting script");

        let script = self.script.clone();
        let outcome = self.outcome.clone();
        let publish_delay = self.publish_delay;
        let sink = Arc::clone(&self.sink);
        let disconnected = Arc::clone(&self.disconnected);

        inner.player = Some(tokio::spawn(async move {
            for step in script {
                tokio::time::sleep(step.after).await;
                if disconnected.load(Ordering::SeqCst) {
                    return;
                }
                if events.send(step.event).await.is_err() {
                    return;
                }
            }
            let Some(outcome) = outcome else { return };
            if events.send(TransportEvent::ChallengeResult).await.is_err() {
                return;
            }
            tokio::time::sleep(publish_delay).await;
            let frame = synthetic_frame(outcome.frame_seed);
            if let Err(err) = sink
                .challenge_completed(
                    &session_id,
                    outcome.succeeded,
                    outcome.message.as_deref(),
                    &frame,
                )
                .await
            {
                tracing::warn!(error = %err, "sim transport failed to publish outcome");
            }
        }));
        Ok(())
    }

    async fn color_displayed(&self) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.color_acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return; // already down
        }
        let mut inner = self.inner.lock().await;
        if let Some(player) = inner.player.take() {
            player.abort();
        }
        inner.events = None;
        tracing::debug!("sim transport disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<(String, bool, Option<String>, Vec<u8>)>>,
    }

    #[async_trait]
    impl ChallengeSink for RecordingSink {
        async fn challenge_completed(
            &self,
            session_id: &str,
            succeeded: bool,
            message: Option<&str>,
            best_frame: &[u8],
        ) -> Result<(), SinkError> {
            self.published.lock().await.push((
                session_id.to_string(),
                succeeded,
                message.map(|m| m.to_string()),
                best_frame.to_vec(),
            ));
            Ok(())
        }
    }

    fn test_stream() -> MediaStream {
        MediaStream {
            id: "m1".to_string(),
            has_video: true,
            has_audio: true,
        }
    }

    #[tokio::test]
    async fn test_script_replays_in_order_then_result() {
        let sink = Arc::new(RecordingSink::default());
        let transport = SimTransport::new(sink.clone())
            .with_script(vec![
                ScriptStep::new(1, TransportEvent::Instruction(ChallengeInstruction::Pending)),
                ScriptStep::new(1, TransportEvent::Tracking(TrackingEvent::no_face())),
            ])
            .with_publish_delay(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(8);
        transport.connect("S1", tx).await.unwrap();
        transport.start(test_stream(), "capture-demo").await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            TransportEvent::Instruction(ChallengeInstruction::Pending)
        ));
        assert!(matches!(rx.recv().await.unwrap(), TransportEvent::Tracking(_)));
        assert!(matches!(rx.recv().await.unwrap(), TransportEvent::ChallengeResult));

        // Give the publish a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let published = sink.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "S1");
        assert!(published[0].1);
        assert_eq!(published[0].3, synthetic_frame(DEFAULT_FRAME_SEED));
    }

    #[tokio::test]
    async fn test_failure_outcome_published_with_message() {
        let sink = Arc::new(RecordingSink::default());
        let transport = SimTransport::new(sink.clone())
            .with_script(vec![])
            .with_outcome(Some(ScriptedOutcome::failure("face lost")))
            .with_publish_delay(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(8);
        transport.connect("S2", tx).await.unwrap();
        transport.start(test_stream(), "capture-demo").await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), TransportEvent::ChallengeResult));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let published = sink.published.lock().await;
        assert!(!published[0].1);
        assert_eq!(published[0].2.as_deref(), Some("face lost"));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_stops_script() {
        let sink = Arc::new(RecordingSink::default());
        let transport = SimTransport::new(sink.clone()).with_script(vec![ScriptStep::new(
            5_000,
            TransportEvent::Tracking(TrackingEvent::no_face()),
        )]);
        let (tx, mut rx) = mpsc::channel(8);
        transport.connect("S3", tx).await.unwrap();
        transport.start(test_stream(), "capture-demo").await.unwrap();

        transport.disconnect().await;
        transport.disconnect().await; // second call is a no-op

        assert!(rx.recv().await.is_none());
        assert!(transport.color_displayed().await.is_err());
        assert!(sink.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_requires_connect() {
        let sink = Arc::new(RecordingSink::default());
        let transport = SimTransport::new(sink);
        let result = transport.start(test_stream(), "capture-demo").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_color_acks_count_round_trips() {
        let sink = Arc::new(RecordingSink::default());
        let transport = SimTransport::new(sink);
        let (tx, _rx) = mpsc::channel(8);
        transport.connect("S4", tx).await.unwrap();
        transport.color_displayed().await.unwrap();
        transport.color_displayed().await.unwrap();
        assert_eq!(transport.color_acks(), 2);
    }

    #[test]
    fn test_synthetic_frame_is_deterministic() {
        assert_eq!(synthetic_frame(32), synthetic_frame(32));
        assert_ne!(synthetic_frame(32), synthetic_frame(160));
        assert_eq!(synthetic_frame(32).len(), FRAME_SIDE * FRAME_SIDE);
    }

    #[tokio::test]
    async fn test_denied_media_refuses_acquisition() {
        let media = SimMedia::denied();
        assert!(matches!(
            media.acquire().await,
            Err(MediaError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_probe_scripts() {
        let good = SimProbe::good().measure(ProbeConfig::default()).await.unwrap();
        assert!(good.good_connectivity);
        assert!(SimProbe::unreachable()
            .measure(ProbeConfig::default())
            .await
            .is_err());
    }
}
