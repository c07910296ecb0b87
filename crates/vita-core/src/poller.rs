//! Bounded fixed-interval polling for backend results.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// One probe's outcome: ready with a value, or try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Pending,
}

/// Polling budget: `max_attempts` retries after the initial request,
/// with a fixed pause between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    /// The budget ran out; `requests` probes were issued in total.
    #[error("result not ready after {requests} polling requests")]
    Exhausted { requests: u32 },
}

/// Fixed-interval poller for backend results.
pub struct ResultPoller {
    policy: PollPolicy,
}

impl ResultPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Issue `op` until it reports `Ready`, pausing `interval` between
    /// probes. The first probe goes out immediately; at most
    /// `max_attempts + 1` probes are issued in total.
    pub async fn fetch<T, F, Fut>(&self, mut op: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollOutcome<T>>,
    {
        let mut remaining = self.policy.max_attempts;
        loop {
            if let PollOutcome::Ready(value) = op().await {
                return Ok(value);
            }
            if remaining == 0 {
                return Err(PollError::Exhausted {
                    requests: self.policy.max_attempts + 1,
                });
            }
            remaining -= 1;
            tokio::time::sleep(self.policy.interval).await;
        }
    }
}
