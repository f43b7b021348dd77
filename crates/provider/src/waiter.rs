//! Operation waiter
//!
//! Turns an accepted-but-pending provider operation into a blocking,
//! cancellable completion signal. The waiter queries the operation's status
//! until it reports `DONE`, the timeout elapses, a status query fails
//! permanently, or the caller cancels.
//!
//! Delays between queries grow exponentially from `min_interval` up to
//! `max_interval`, and are clipped so the last query still lands inside the
//! timeout. The first query is issued immediately.
//!
//! The waiter does not judge the outcome of a settled operation: an embedded
//! error payload is returned as part of the final [`Operation`] and left to
//! [`crate::translate`].

use std::time::Duration;

use gcompute_common::{ApiError, Operation, OperationHandle, OperationStatus};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::client::ComputeApi;

/// Longest budget a single wait is given, whatever the configuration says
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest delay between two status queries
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timing of an operation wait
#[derive(Clone, Debug, PartialEq)]
pub struct WaitConfig {
    /// Wall-clock budget for the whole wait
    pub timeout: Duration,
    /// Lower bound for the delay between two status queries
    pub min_interval: Duration,
    /// Upper bound for the delay between two status queries
    pub max_interval: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before the second query, never below [`MIN_POLL_INTERVAL`]
    pub fn first_delay(&self) -> Duration {
        self.min_interval.max(MIN_POLL_INTERVAL)
    }

    /// Budget actually granted, capped at [`MAX_WAIT_TIMEOUT`]
    pub fn budget(&self) -> Duration {
        self.timeout.min(MAX_WAIT_TIMEOUT)
    }

    /// Delay to use after `current`, kept within `[min_interval, max_interval]`
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(self.max_interval);
        grown.min(self.max_interval).max(self.first_delay())
    }
}

/// Why a wait ended without a settled operation
#[derive(Debug, Error)]
pub enum WaitError {
    /// Budget exhausted; the operation may still complete remotely
    #[error("operation did not settle within {}s", .elapsed.as_secs())]
    Timeout {
        last_status: Option<OperationStatus>,
        elapsed: Duration,
        attempts: u32,
    },

    /// A status query failed in a way retrying cannot fix
    #[error("status query failed: {0}")]
    Fatal(ApiError),

    /// The caller cancelled the wait
    #[error("wait cancelled")]
    Cancelled,
}

/// Waits for provider operations to settle
pub struct OperationWaiter<'a> {
    api: &'a dyn ComputeApi,
    config: WaitConfig,
    cancel: CancellationToken,
}

impl<'a> OperationWaiter<'a> {
    pub fn new(api: &'a dyn ComputeApi, config: WaitConfig) -> Self {
        Self {
            api,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop waiting as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Block until the operation behind `handle` reaches `DONE`.
    ///
    /// Polling stops on every exit path; nothing keeps running in the
    /// background once this returns.
    pub async fn wait(&self, handle: OperationHandle) -> Result<Operation, WaitError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(operation = %handle.name, target = %handle.target, "Operation wait cancelled");
                Err(WaitError::Cancelled)
            }
            result = self.poll_until_done(&handle) => result,
        }
    }

    async fn poll_until_done(&self, handle: &OperationHandle) -> Result<Operation, WaitError> {
        let started = Instant::now();
        if self.config.timeout > MAX_WAIT_TIMEOUT {
            warn!(
                operation = %handle.name,
                requested_secs = self.config.timeout.as_secs(),
                capped_secs = MAX_WAIT_TIMEOUT.as_secs(),
                "Wait timeout capped"
            );
        }
        let deadline = started.checked_add(self.config.budget()).unwrap_or(started);
        let mut delay = self.config.first_delay();
        let mut last_status = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let query = self.api.get_operation(&handle.scope, &handle.name);
            match tokio::time::timeout_at(deadline, query).await {
                Ok(Ok(op)) => {
                    debug!(
                        operation = %handle.name,
                        target = %handle.target,
                        attempt = attempt,
                        status = %op.status,
                        "Polled operation"
                    );
                    if op.status.is_terminal() {
                        return Ok(op);
                    }
                    last_status = Some(op.status);
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!(
                        operation = %handle.name,
                        attempt = attempt,
                        error = %e,
                        "Operation status query failed, retrying"
                    );
                }
                Ok(Err(e)) => {
                    error!(
                        operation = %handle.name,
                        attempt = attempt,
                        error = %e,
                        "Operation status query failed permanently"
                    );
                    return Err(WaitError::Fatal(e));
                }
                Err(_) => {
                    return Err(WaitError::Timeout {
                        last_status,
                        elapsed: started.elapsed(),
                        attempts: attempt,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout {
                    last_status,
                    elapsed: now - started,
                    attempts: attempt,
                });
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = self.config.next_delay(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedCompute;
    use gcompute_common::{OperationErrorItem, OperationKind, Scope};
    use serde_json::json;

    fn fast_config() -> WaitConfig {
        WaitConfig::default()
    }

    async fn submit(sim: &SimulatedCompute, name: &str) -> OperationHandle {
        let op = sim
            .insert("httpHealthChecks", &Scope::Global, json!({ "name": name }))
            .await
            .unwrap();
        OperationHandle::new(&op, Scope::Global, name, OperationKind::Insert)
    }

    #[test]
    fn test_next_delay_is_bounded() {
        let config = WaitConfig::default();
        assert_eq!(config.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(config.next_delay(Duration::from_secs(8)), Duration::from_secs(10));
        assert_eq!(config.next_delay(Duration::from_millis(10)), Duration::from_secs(1));
    }

    #[test]
    fn test_degenerate_timing_is_clamped() {
        let config = WaitConfig {
            timeout: Duration::MAX,
            min_interval: Duration::ZERO,
            max_interval: Duration::MAX,
            backoff_multiplier: f64::MAX,
        };
        assert_eq!(config.budget(), MAX_WAIT_TIMEOUT);
        assert_eq!(config.first_delay(), MIN_POLL_INTERVAL);
        assert_eq!(config.next_delay(Duration::from_secs(1)), Duration::MAX);

        let zero = WaitConfig {
            min_interval: Duration::ZERO,
            ..WaitConfig::default()
        };
        assert_eq!(zero.next_delay(Duration::ZERO), MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_and_zero_interval_still_back_off() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Running, OperationStatus::Running, OperationStatus::Done]);
        let handle = submit(&sim, "hc").await;
        let config = WaitConfig {
            timeout: Duration::from_secs(u64::MAX),
            min_interval: Duration::ZERO,
            ..WaitConfig::default()
        };

        let started = Instant::now();
        let op = OperationWaiter::new(&sim, config).wait(handle.clone()).await.unwrap();

        assert_eq!(op.status, OperationStatus::Done);
        assert_eq!(sim.poll_count(&handle.name), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_through_pending_and_running() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Pending, OperationStatus::Running, OperationStatus::Done]);
        let handle = submit(&sim, "hc").await;

        let started = Instant::now();
        let op = OperationWaiter::new(&sim, fast_config()).wait(handle.clone()).await.unwrap();

        assert_eq!(op.status, OperationStatus::Done);
        assert!(op.failure().is_none());
        assert_eq!(sim.poll_count(&handle.name), 3);
        // 1s after the first poll, 2s after the second
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_running_times_out() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Running]);
        let handle = submit(&sim, "hc").await;

        let config = fast_config().with_timeout(Duration::from_secs(30));
        let started = Instant::now();
        let err = OperationWaiter::new(&sim, config).wait(handle).await.unwrap_err();

        match err {
            WaitError::Timeout { last_status, elapsed, .. } => {
                assert_eq!(last_status, Some(OperationStatus::Running));
                assert!(elapsed >= Duration::from_secs(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_poll_lands_inside_timeout() {
        let sim = SimulatedCompute::new("proj");
        // Done only on the 5th poll: t = 0, 1, 3, 7, 10 (clipped from 15)
        sim.set_status_script(vec![
            OperationStatus::Running,
            OperationStatus::Running,
            OperationStatus::Running,
            OperationStatus::Running,
            OperationStatus::Done,
        ]);
        let handle = submit(&sim, "hc").await;

        let config = fast_config().with_timeout(Duration::from_secs(10));
        let op = OperationWaiter::new(&sim, config).wait(handle).await.unwrap();
        assert_eq!(op.status, OperationStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedded_error_returns_immediately() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Done]);
        sim.fail_next_operation(vec![OperationErrorItem {
            code: "QUOTA_EXCEEDED".into(),
            message: "quota exceeded".into(),
            location: None,
        }]);
        let handle = submit(&sim, "hc").await;

        let started = Instant::now();
        let op = OperationWaiter::new(&sim, fast_config()).wait(handle.clone()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(sim.poll_count(&handle.name), 1);
        assert_eq!(op.failure().unwrap()[0].code, "QUOTA_EXCEEDED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_failures_are_retried() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Done]);
        sim.inject_poll_errors(vec![ApiError::http(503, "backend unavailable"), ApiError::transport("reset")]);
        let handle = submit(&sim, "hc").await;

        let op = OperationWaiter::new(&sim, fast_config()).wait(handle.clone()).await.unwrap();
        assert_eq!(op.status, OperationStatus::Done);
        assert_eq!(sim.poll_count(&handle.name), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_query_failure_aborts() {
        let sim = SimulatedCompute::new("proj");
        let handle = OperationHandle {
            name: "operation-missing".into(),
            scope: Scope::Global,
            target: "hc".into(),
            kind: OperationKind::Insert,
        };

        let started = Instant::now();
        let err = OperationWaiter::new(&sim, fast_config()).wait(handle).await.unwrap_err();
        assert!(matches!(err, WaitError::Fatal(ref e) if e.is_not_found()));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let sim = SimulatedCompute::new("proj");
        sim.set_status_script(vec![OperationStatus::Running]);
        let handle = submit(&sim, "hc").await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let err = OperationWaiter::new(&sim, fast_config())
            .with_cancellation(token)
            .wait(handle.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));

        let polls = sim.poll_count(&handle.name);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sim.poll_count(&handle.name), polls);
    }
}
