//! Capture session controller: drives one liveness attempt end to end.
//!
//! The controller owns every per-attempt handle (session id, device
//! seams, cancellation token, screen/guidance publishers) and walks
//! the flow tutorial → environment check → connectivity check →
//! capture → terminal screen, with the optional secondary capture and
//! face match appended after a successful challenge.

use crate::backend::Backend;
use crate::error::CaptureError;
use crate::gate::{ConnectivityGate, GateConfig, GateVerdict, WeakMetric};
use crate::illumination::IlluminationPlayer;
use crate::poller::{PollPolicy, ResultPoller};
use crate::sequencer::{reduce_guidance, IlluminationPlan};
use crate::types::{FaceMetadata, Guidance, LivenessVerdict, MatchVerdict, ScreenState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use vita_transport::{
    CaptureTransport, ChallengeInstruction, EnvironmentDetector, MediaSource, NetworkProbe,
    TransportError, TransportEvent,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Knobs of one capture attempt. Defaults mirror production timing.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Label the transport records the capture under.
    pub recording_label: String,
    pub identity_id: Option<String>,
    /// Run the secondary capture + match phase after a successful
    /// challenge.
    pub matching_enabled: bool,
    pub skip_tutorial: bool,
    /// Pause between acquiring media and starting the transport, for
    /// device auto-exposure to settle.
    pub settle_delay: Duration,
    /// Pause between connectivity re-checks.
    pub recheck_interval: Duration,
    /// Bound on connectivity re-checks; `None` keeps trying.
    pub max_rechecks: Option<u32>,
    pub poll: PollPolicy,
    pub gate: GateConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            recording_label: "vita-capture".to_string(),
            identity_id: None,
            matching_enabled: false,
            skip_tutorial: false,
            settle_delay: Duration::from_millis(2000),
            recheck_interval: Duration::from_millis(1000),
            max_rechecks: None,
            poll: PollPolicy::default(),
            gate: GateConfig::default(),
        }
    }
}

/// Observer side of a running attempt.
pub struct FlowSignals {
    pub screen: watch::Receiver<ScreenState>,
    pub guidance: watch::Receiver<Guidance>,
    /// Weak-metric hint while the connectivity screen shows remediation.
    pub remediation: watch::Receiver<Option<WeakMetric>>,
    /// Plan colours to render, in display order.
    pub colors: mpsc::UnboundedReceiver<String>,
}

/// What one attempt produced.
#[derive(Debug)]
pub struct CaptureReport {
    pub final_screen: ScreenState,
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub verdict: Option<LivenessVerdict>,
    pub best_image: Option<Vec<u8>>,
    pub match_verdict: Option<MatchVerdict>,
}

/// Drives one liveness attempt. Construct, subscribe to the signals,
/// then `run` to completion.
pub struct CaptureSessionController {
    config: ControllerConfig,
    backend: Arc<dyn Backend>,
    transport: Arc<dyn CaptureTransport>,
    media: Arc<dyn MediaSource>,
    probe: Arc<dyn NetworkProbe>,
    environment: Arc<dyn EnvironmentDetector>,
    gate: ConnectivityGate,
    poller: ResultPoller,
    session_id: Option<String>,
    challenge_active: bool,
    terminal_seen: bool,
    cancel: CancellationToken,
    screen_tx: watch::Sender<ScreenState>,
    guidance_tx: watch::Sender<Guidance>,
    remediation_tx: watch::Sender<Option<WeakMetric>>,
    colors_tx: mpsc::UnboundedSender<String>,
}

impl CaptureSessionController {
    pub fn new(
        config: ControllerConfig,
        backend: Arc<dyn Backend>,
        transport: Arc<dyn CaptureTransport>,
        media: Arc<dyn MediaSource>,
        probe: Arc<dyn NetworkProbe>,
        environment: Arc<dyn EnvironmentDetector>,
    ) -> (Self, FlowSignals) {
        let (screen_tx, screen_rx) = watch::channel(ScreenState::Tutorial);
        let (guidance_tx, guidance_rx) = watch::channel(Guidance::Hidden);
        let (remediation_tx, remediation_rx) = watch::channel(None);
        let (colors_tx, colors_rx) = mpsc::unbounded_channel();
        let gate = ConnectivityGate::new(config.gate);
        let poller = ResultPoller::new(config.poll);
        let controller = Self {
            config,
            backend,
            transport,
            media,
            probe,
            environment,
            gate,
            poller,
            session_id: None,
            challenge_active: false,
            terminal_seen: false,
            cancel: CancellationToken::new(),
            screen_tx,
            guidance_tx,
            remediation_tx,
            colors_tx,
        };
        let signals = FlowSignals {
            screen: screen_rx,
            guidance: guidance_rx,
            remediation: remediation_rx,
            colors: colors_rx,
        };
        (controller, signals)
    }

    /// Token observers can use to stop the attempt early.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the whole attempt. Failures never escape: every error is
    /// converted into a failure screen in the report.
    pub async fn run(mut self) -> CaptureReport {
        let result = self.drive().await;
        self.transport.disconnect().await;
        self.cancel.cancel();
        match result {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(error = %err, "capture attempt failed");
                self.set_terminal(ScreenState::Failure);
                CaptureReport {
                    final_screen: ScreenState::Failure,
                    session_id: self.session_id.clone(),
                    message: Some(err.to_string()),
                    verdict: None,
                    best_image: None,
                    match_verdict: None,
                }
            }
        }
    }

    async fn drive(&mut self) -> Result<CaptureReport, CaptureError> {
        if !self.config.skip_tutorial {
            self.set_screen(ScreenState::Tutorial);
        }

        self.set_screen(ScreenState::EnvironmentCheck);
        let environment = self.environment.detect();
        if !environment.supported {
            return Err(CaptureError::Unsupported(environment.os));
        }

        self.set_screen(ScreenState::ConnectivityCheck);
        self.await_connectivity().await?;

        self.set_screen(ScreenState::Capturing);
        // Media acquisition failures abort the attempt; no retry.
        let stream = self.media.acquire().await?;

        let session = self
            .backend
            .init_liveness_session(None, self.config.identity_id.as_deref())
            .await
            .map_err(|err| CaptureError::SessionInit(err.to_string()))?;
        self.session_id = Some(session.session_id.clone());
        tracing::info!(session = %session.session_id, "liveness session open");

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.transport.connect(&session.session_id, events_tx).await?;

        // Let device auto-exposure settle before streaming.
        self.pause(self.config.settle_delay).await?;
        self.transport
            .start(stream, &self.config.recording_label)
            .await?;

        let verdict = self.capture_loop(events_rx).await?;
        // The channel comes down before any terminal screen shows,
        // whatever the verdict was.
        self.transport.disconnect().await;

        if !verdict.is_liveness_succeeded {
            tracing::info!(message = ?verdict.message, "challenge not passed");
            self.set_terminal(ScreenState::Failure);
            return Ok(CaptureReport {
                final_screen: ScreenState::Failure,
                session_id: self.session_id.clone(),
                message: verdict.message.clone(),
                verdict: Some(verdict),
                best_image: None,
                match_verdict: None,
            });
        }

        let best_image = match &verdict.best_image_id {
            Some(face_id) => Some(
                self.backend
                    .face_image(&session.session_id, face_id)
                    .await?,
            ),
            None => None,
        };

        if !self.config.matching_enabled {
            self.set_terminal(ScreenState::Success);
            return Ok(CaptureReport {
                final_screen: ScreenState::Success,
                session_id: self.session_id.clone(),
                message: verdict.message.clone(),
                verdict: Some(verdict),
                best_image,
                match_verdict: None,
            });
        }

        self.set_screen(ScreenState::Success);
        let match_verdict = self.match_phase(&session.session_id, &verdict).await?;
        let final_screen = if match_verdict.matching {
            ScreenState::MatchSucceeded
        } else {
            ScreenState::MatchFailed
        };
        self.set_terminal(final_screen);
        Ok(CaptureReport {
            final_screen,
            session_id: self.session_id.clone(),
            message: verdict.message.clone(),
            verdict: Some(verdict),
            best_image,
            match_verdict: Some(match_verdict),
        })
    }

    /// Re-poll the gate until it opens or the re-check bound is hit.
    async fn await_connectivity(&mut self) -> Result<(), CaptureError> {
        let mut rechecks = 0u32;
        loop {
            let verdict = self.gate.check(&self.probe, Some(&self.transport)).await;
            match verdict {
                GateVerdict::Good(_) => {
                    self.remediation_tx.send_replace(None);
                    return Ok(());
                }
                GateVerdict::Remediate { weak, .. } => {
                    self.remediation_tx.send_replace(Some(weak));
                }
            }
            if let Some(max) = self.config.max_rechecks {
                if rechecks >= max {
                    return Err(CaptureError::ConnectivityExhausted { rechecks });
                }
            }
            rechecks += 1;
            self.pause(self.config.recheck_interval).await?;
        }
    }

    /// Consume transport events until the challenge resolves.
    async fn capture_loop(
        &mut self,
        mut events: mpsc::Receiver<TransportEvent>,
    ) -> Result<LivenessVerdict, CaptureError> {
        let mut player =
            IlluminationPlayer::new(Arc::clone(&self.transport), self.colors_tx.clone());
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => {
                    player.stop();
                    return Err(CaptureError::Cancelled);
                }
                event = events.recv() => event,
            };
            let Some(event) = event else {
                player.stop();
                return Err(CaptureError::Transport(TransportError::Channel(
                    "event stream closed".to_string(),
                )));
            };
            match event {
                TransportEvent::Instruction(instruction) => {
                    self.challenge_active = instruction == ChallengeInstruction::Active;
                    tracing::debug!(?instruction, "challenge instruction");
                }
                TransportEvent::Tracking(tracking) => {
                    let guidance = reduce_guidance(&tracking, self.challenge_active);
                    self.guidance_tx.send_replace(guidance);
                    if let Some(tokens) = &tracking.color_sequence {
                        let plan = IlluminationPlan::decode(tokens);
                        tracing::debug!(steps = plan.steps.len(), "illumination plan received");
                        player.play(plan, &self.cancel);
                    }
                }
                TransportEvent::ChallengeResult => {
                    // Keep the animation running while the verdict is
                    // fetched; stop it before handing the verdict back.
                    let verdict = self.poll_verdict().await;
                    player.stop();
                    return verdict;
                }
                TransportEvent::Error(message) => {
                    player.stop();
                    return Err(CaptureError::TrackerReported(message));
                }
            }
        }
    }

    async fn poll_verdict(&self) -> Result<LivenessVerdict, CaptureError> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| CaptureError::SessionInit("no session bound".to_string()))?;
        let backend = Arc::clone(&self.backend);
        let fetch = self.poller.fetch(move || {
            let backend = Arc::clone(&backend);
            let session_id = session_id.clone();
            async move { backend.liveness_result(&session_id, true).await }
        });
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CaptureError::Cancelled),
            verdict = fetch => Ok(verdict?),
        }
    }

    /// Secondary capture: one still image, uploaded and matched against
    /// the challenge's best frame.
    async fn match_phase(
        &mut self,
        session_id: &str,
        verdict: &LivenessVerdict,
    ) -> Result<MatchVerdict, CaptureError> {
        self.set_screen(ScreenState::SecondaryCapture);
        let reference = verdict
            .best_image_id
            .clone()
            .ok_or_else(|| CaptureError::Payload("verdict carries no best image id".to_string()))?;
        let still = self.media.still_image().await?;
        let metadata = FaceMetadata {
            label: None,
            source: Some("secondary".to_string()),
        };
        let probe_face = self
            .backend
            .upload_face(session_id, still, &metadata)
            .await?;
        let match_verdict = self
            .backend
            .match_faces(session_id, &reference, &probe_face)
            .await?;
        tracing::info!(
            matching = match_verdict.matching,
            score = match_verdict.score,
            "face match complete"
        );
        Ok(match_verdict)
    }

    /// Cancellable sleep.
    async fn pause(&self, duration: Duration) -> Result<(), CaptureError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CaptureError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn set_screen(&self, screen: ScreenState) {
        tracing::info!(screen = ?screen, "screen");
        self.screen_tx.send_replace(screen);
    }

    /// Latch a terminal screen; later terminal requests are ignored.
    fn set_terminal(&mut self, screen: ScreenState) {
        if self.terminal_seen {
            tracing::debug!(screen = ?screen, "terminal already reached; ignoring");
            return;
        }
        self.terminal_seen = true;
        self.set_screen(screen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::poller::PollOutcome;
    use crate::types::SessionHandle;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;
    use vita_transport::sim::{
        synthetic_frame, ChallengeSink, ScriptStep, ScriptedOutcome, SimEnvironment, SimMedia,
        SimProbe, SimTransport, SinkError, DEFAULT_FRAME_SEED,
    };
    use vita_transport::{plan_tokens, TrackingEvent};

    const BEST_FACE_ID: &str = "F-best";

    /// In-memory backend double; doubles as the sim transport's sink.
    #[derive(Default)]
    struct FakeBackend {
        init_calls: AtomicU32,
        verdict: Mutex<Option<LivenessVerdict>>,
        images: Mutex<HashMap<String, Vec<u8>>>,
        upload_seq: AtomicU32,
    }

    #[async_trait]
    impl ChallengeSink for FakeBackend {
        async fn challenge_completed(
            &self,
            _session_id: &str,
            succeeded: bool,
            message: Option<&str>,
            best_frame: &[u8],
        ) -> Result<(), SinkError> {
            if succeeded {
                self.images
                    .lock()
                    .await
                    .insert(BEST_FACE_ID.to_string(), best_frame.to_vec());
            }
            *self.verdict.lock().await = Some(LivenessVerdict {
                is_liveness_succeeded: succeeded,
                message: message.map(|m| m.to_string()),
                best_image_id: succeeded.then(|| BEST_FACE_ID.to_string()),
            });
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn init_liveness_session(
            &self,
            session_id: Option<&str>,
            identity_id: Option<&str>,
        ) -> Result<SessionHandle, BackendError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionHandle {
                session_id: session_id.unwrap_or("S1").to_string(),
                identity_id: identity_id.map(|i| i.to_string()),
            })
        }

        async fn liveness_result(
            &self,
            _session_id: &str,
            _polling: bool,
        ) -> PollOutcome<LivenessVerdict> {
            match self.verdict.lock().await.clone() {
                Some(verdict) => PollOutcome::Ready(verdict),
                None => PollOutcome::Pending,
            }
        }

        async fn face_image(
            &self,
            _session_id: &str,
            face_id: &str,
        ) -> Result<Vec<u8>, BackendError> {
            self.images
                .lock()
                .await
                .get(face_id)
                .cloned()
                .ok_or_else(|| BackendError::Rejected {
                    error_code: "FACE_NOT_FOUND".to_string(),
                    message: face_id.to_string(),
                })
        }

        async fn upload_face(
            &self,
            _session_id: &str,
            image: Vec<u8>,
            _metadata: &FaceMetadata,
        ) -> Result<String, BackendError> {
            let face_id = format!("F{}", self.upload_seq.fetch_add(1, Ordering::SeqCst) + 1);
            self.images.lock().await.insert(face_id.clone(), image);
            Ok(face_id)
        }

        async fn match_faces(
            &self,
            _session_id: &str,
            reference_face_id: &str,
            probe_face_id: &str,
        ) -> Result<MatchVerdict, BackendError> {
            let images = self.images.lock().await;
            let matching = images.get(reference_face_id) == images.get(probe_face_id);
            Ok(MatchVerdict {
                matching,
                score: if matching { 1.0 } else { 0.0 },
            })
        }
    }

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            settle_delay: Duration::from_millis(2),
            recheck_interval: Duration::from_millis(5),
            poll: PollPolicy {
                max_attempts: 30,
                interval: Duration::from_millis(10),
            },
            ..ControllerConfig::default()
        }
    }

    fn fast_script() -> Vec<ScriptStep> {
        let mut challenge = TrackingEvent::face(220.0, 280.0, false);
        challenge.color_sequence = Some(plan_tokens(&[("red", 10), ("blue", 10)]));
        vec![
            ScriptStep::new(1, TransportEvent::Instruction(ChallengeInstruction::Pending)),
            ScriptStep::new(1, TransportEvent::Tracking(TrackingEvent::no_face())),
            ScriptStep::new(1, TransportEvent::Instruction(ChallengeInstruction::Active)),
            ScriptStep::new(1, TransportEvent::Tracking(challenge)),
            ScriptStep::new(
                30,
                TransportEvent::Tracking(TrackingEvent::face(220.0, 280.0, false)),
            ),
        ]
    }

    fn rig(
        config: ControllerConfig,
        backend: Arc<FakeBackend>,
        transport: Arc<SimTransport>,
        media: SimMedia,
        probe: SimProbe,
        environment: SimEnvironment,
    ) -> (CaptureSessionController, FlowSignals) {
        CaptureSessionController::new(
            config,
            backend,
            transport,
            Arc::new(media),
            Arc::new(probe),
            Arc::new(environment),
        )
    }

    #[tokio::test]
    async fn test_happy_path_reaches_success_with_best_image() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_publish_delay(Duration::from_millis(15)),
        );
        let (controller, _signals) = rig(
            fast_config(),
            backend,
            transport,
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Success);
        assert_eq!(report.session_id.as_deref(), Some("S1"));
        assert_eq!(report.best_image, Some(synthetic_frame(DEFAULT_FRAME_SEED)));
        assert!(report.verdict.unwrap().is_liveness_succeeded);
    }

    #[tokio::test]
    async fn test_denied_media_aborts_without_session() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(SimTransport::new(backend.clone()));
        let (controller, _signals) = rig(
            fast_config(),
            backend.clone(),
            transport,
            SimMedia::denied(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert!(report.message.unwrap().contains("media acquisition"));
        // No retry and no session was ever opened.
        assert_eq!(backend.init_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_environment_fails_before_devices() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(SimTransport::new(backend.clone()));
        let (controller, _signals) = rig(
            fast_config(),
            backend.clone(),
            transport,
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::unsupported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert!(report.message.unwrap().contains("not supported"));
        assert_eq!(backend.init_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_challenge_shows_failure_with_message() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_outcome(Some(ScriptedOutcome::failure("face lost")))
                .with_publish_delay(Duration::from_millis(15)),
        );
        let (controller, _signals) = rig(
            fast_config(),
            backend,
            transport,
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert_eq!(report.message.as_deref(), Some("face lost"));
        assert!(!report.verdict.unwrap().is_liveness_succeeded);
    }

    #[tokio::test]
    async fn test_matching_flow_reaches_match_succeeded() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_publish_delay(Duration::from_millis(15)),
        );
        let config = ControllerConfig {
            matching_enabled: true,
            ..fast_config()
        };
        let (controller, _signals) = rig(
            config,
            backend,
            transport,
            SimMedia::new(), // still image seed matches the best frame
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::MatchSucceeded);
        let m = report.match_verdict.unwrap();
        assert!(m.matching);
        assert!(m.score >= 1.0);
    }

    #[tokio::test]
    async fn test_mismatched_still_reaches_match_failed() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_publish_delay(Duration::from_millis(15)),
        );
        let config = ControllerConfig {
            matching_enabled: true,
            ..fast_config()
        };
        let (controller, _signals) = rig(
            config,
            backend,
            transport,
            SimMedia::new().with_still_seed(200),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::MatchFailed);
        assert!(!report.match_verdict.unwrap().matching);
    }

    #[tokio::test]
    async fn test_poll_exhaustion_fails_the_attempt() {
        let backend = Arc::new(FakeBackend::default());
        // The verdict never lands inside the polling budget.
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_publish_delay(Duration::from_secs(60)),
        );
        let config = ControllerConfig {
            poll: PollPolicy {
                max_attempts: 2,
                interval: Duration::from_millis(5),
            },
            ..fast_config()
        };
        let (controller, _signals) = rig(
            config,
            backend,
            transport,
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert!(report.message.unwrap().contains("polling"));
    }

    #[tokio::test]
    async fn test_connectivity_recheck_bound_fails_with_remediation() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(SimTransport::new(backend.clone()));
        let config = ControllerConfig {
            max_rechecks: Some(1),
            ..fast_config()
        };
        let (controller, signals) = rig(
            config,
            backend,
            transport,
            SimMedia::new(),
            SimProbe::unreachable(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert!(report.message.unwrap().contains("connectivity"));
        assert_eq!(*signals.remediation.borrow(), Some(WeakMetric::Unknown));
    }

    #[tokio::test]
    async fn test_challenge_colors_reach_the_display_in_order() {
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(fast_script())
                .with_publish_delay(Duration::from_millis(15)),
        );
        let (controller, mut signals) = rig(
            fast_config(),
            backend,
            transport.clone(),
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Success);

        let mut colors = Vec::new();
        while let Some(color) = signals.colors.recv().await {
            colors.push(color);
        }
        assert_eq!(colors, vec!["red".to_string(), "blue".to_string()]);
        assert_eq!(transport.color_acks(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_lands_on_failure_screen() {
        let backend = Arc::new(FakeBackend::default());
        // A transport that never produces a result.
        let transport = Arc::new(
            SimTransport::new(backend.clone())
                .with_script(vec![])
                .with_outcome(None),
        );
        let (controller, _signals) = rig(
            fast_config(),
            backend,
            transport,
            SimMedia::new(),
            SimProbe::good(),
            SimEnvironment::supported(),
        );

        let cancel = controller.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });
        let report = controller.run().await;
        assert_eq!(report.final_screen, ScreenState::Failure);
        assert!(report.message.unwrap().contains("cancelled"));
    }
}
