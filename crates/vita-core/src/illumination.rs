//! Illumination-plan playback.
//!
//! Each colour is pushed to the display sink, acknowledged to the
//! transport (a full round-trip), held for its duration, then the walk
//! advances. At most one playback runs at a time: a newer plan cancels
//! the one in flight.

use crate::sequencer::IlluminationPlan;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vita_transport::CaptureTransport;

/// Runs plan playback tasks; the newest plan wins.
pub struct IlluminationPlayer {
    transport: Arc<dyn CaptureTransport>,
    display: mpsc::UnboundedSender<String>,
    current: Option<CancellationToken>,
}

impl IlluminationPlayer {
    pub fn new(
        transport: Arc<dyn CaptureTransport>,
        display: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            transport,
            display,
            current: None,
        }
    }

    /// Start playing `plan`, cancelling any playback already running.
    /// The playback also stops when `parent` is cancelled.
    pub fn play(&mut self, plan: IlluminationPlan, parent: &CancellationToken) {
        self.stop();
        if plan.is_empty() {
            return;
        }
        let token = parent.child_token();
        let transport = Arc::clone(&self.transport);
        let display = self.display.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            run_plan(plan, transport, display, task_token).await;
        });
        self.current = Some(token);
    }

    /// Cancel the running playback, if any.
    pub fn stop(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

async fn run_plan(
    plan: IlluminationPlan,
    transport: Arc<dyn CaptureTransport>,
    display: mpsc::UnboundedSender<String>,
    token: CancellationToken,
) {
    for step in plan.steps {
        if token.is_cancelled() || display.send(step.color.clone()).is_err() {
            return;
        }
        // Round-trip the acknowledgement before timing the colour.
        let ack = tokio::select! {
            _ = token.cancelled() => return,
            ack = transport.color_displayed() => ack,
        };
        if let Err(err) = ack {
            tracing::debug!(error = %err, "colour ack failed; stopping playback");
            return;
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(step.duration) => {}
        }
    }
    tracing::debug!("illumination plan complete");
}
