//! Polling waiter for long-running operations.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{OperationError, Result};

use super::handle::{OperationHandle, OperationPoller};

/// Default first polling interval in milliseconds.
const DEFAULT_INITIAL_INTERVAL_MS: u64 = 1_000;

/// Default polling interval cap in milliseconds.
const DEFAULT_MAX_INTERVAL_MS: u64 = 10_000;

/// Default wait budget in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 240;

/// Default number of consecutive transient polling failures tolerated.
const DEFAULT_MAX_TRANSIENT_ERRORS: u32 = 10;

/// Polling schedule of the waiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// First polling interval in milliseconds.
    pub initial_interval_ms: u64,
    /// Polling interval cap in milliseconds.
    pub max_interval_ms: u64,
    /// Growth factor applied after each poll.
    pub multiplier: f64,
    /// Relative jitter applied to each interval, in `[0, 1)`.
    pub jitter: f64,
    /// Default wait budget in seconds.
    pub timeout_secs: u64,
    /// Consecutive transient polling failures tolerated before giving up.
    pub max_transient_errors: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_INITIAL_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            multiplier: 1.5,
            jitter: 0.2,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_transient_errors: DEFAULT_MAX_TRANSIENT_ERRORS,
        }
    }
}

impl WaitSettings {
    /// Returns the default wait budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Jittered exponential backoff capped at a maximum interval.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
}

impl Backoff {
    /// Creates a backoff from the waiter settings.
    #[must_use]
    pub fn new(settings: &WaitSettings) -> Self {
        Self {
            current: Duration::from_millis(settings.initial_interval_ms),
            max: Duration::from_millis(settings.max_interval_ms.max(settings.initial_interval_ms)),
            multiplier: settings.multiplier.max(1.0),
            jitter: settings.jitter.clamp(0.0, 0.99),
        }
    }

    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = base.mul_f64(self.multiplier).min(self.max);
        if self.jitter == 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        base.mul_f64(factor)
    }
}

/// Polls operations until they finish.
///
/// Each call to [`OperationWaiter::wait`] runs its own polling loop; no
/// state is shared between waits.
#[derive(Debug, Clone, Default)]
pub struct OperationWaiter {
    settings: WaitSettings,
}

impl OperationWaiter {
    /// Creates a waiter with the given schedule.
    #[must_use]
    pub const fn new(settings: WaitSettings) -> Self {
        Self { settings }
    }

    /// Returns the polling schedule.
    #[must_use]
    pub const fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    /// Waits with the default budget.
    ///
    /// # Errors
    ///
    /// See [`OperationWaiter::wait_with_timeout`].
    pub async fn wait<P>(
        &self,
        ctx: &Context,
        poller: &P,
        handle: &OperationHandle,
        activity: &str,
    ) -> Result<()>
    where
        P: OperationPoller + ?Sized,
    {
        self.wait_with_timeout(ctx, poller, handle, activity, self.settings.timeout())
            .await
    }

    /// Polls `handle` until it is done or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Failed`] when the operation finishes with
    /// errors, [`OperationError::Timeout`] when the budget runs out,
    /// [`OperationError::Cancelled`] when `ctx` is cancelled, and the polling
    /// error itself when it is not transient or transient failures exceed
    /// the configured budget.
    pub async fn wait_with_timeout<P>(
        &self,
        ctx: &Context,
        poller: &P,
        handle: &OperationHandle,
        activity: &str,
        timeout: Duration,
    ) -> Result<()>
    where
        P: OperationPoller + ?Sized,
    {
        let started = Instant::now();
        let mut backoff = Backoff::new(&self.settings);
        let mut transient_errors = 0_u32;
        let mut polls = 0_u32;

        loop {
            ctx.check(activity)?;
            polls += 1;

            match ctx.run(activity, poller.poll(handle)).await {
                Ok(operation) => {
                    transient_errors = 0;
                    debug!(
                        "Operation {handle} for {activity}: {:?} (poll {polls})",
                        operation.status
                    );
                    if operation.is_done() {
                        if operation.errors.is_empty() {
                            return Ok(());
                        }
                        return Err(OperationError::Failed {
                            operation: operation.name,
                            faults: operation.errors,
                        }
                        .into());
                    }
                }
                Err(e) if e.is_retryable() => {
                    transient_errors += 1;
                    if transient_errors > self.settings.max_transient_errors {
                        return Err(e);
                    }
                    warn!("Transient error polling {handle} for {activity}: {e}");
                }
                Err(e) => return Err(e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(OperationError::Timeout {
                    operation: handle.name.clone(),
                    activity: activity.to_string(),
                    waited_secs: elapsed.as_secs(),
                }
                .into());
            }

            let delay = backoff.next_delay().min(timeout - elapsed);
            ctx.sleep(activity, delay).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_level::ApiLevel;
    use crate::error::{ApiError, OperationFault, SkyforgeError};
    use crate::operation::handle::{Operation, OperationScope, OperationStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedPoller {
        script: Mutex<VecDeque<Result<Operation>>>,
        polls: AtomicUsize,
    }

    impl ScriptedPoller {
        fn new(script: Vec<Result<Operation>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                polls: AtomicUsize::new(0),
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OperationPoller for ScriptedPoller {
        async fn poll(&self, _handle: &OperationHandle) -> Result<Operation> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().expect("script lock").pop_front();
            next.unwrap_or_else(|| Ok(op(OperationStatus::Running)))
        }
    }

    fn op(status: OperationStatus) -> Operation {
        Operation {
            name: "operation-1".to_string(),
            status,
            ..Operation::default()
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle {
            scope: OperationScope::Zonal("us-central1-a".to_string()),
            project: "p".to_string(),
            name: "operation-1".to_string(),
            api_level: ApiLevel::Production,
        }
    }

    fn waiter() -> OperationWaiter {
        OperationWaiter::new(WaitSettings {
            max_transient_errors: 2,
            ..WaitSettings::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_done() {
        let poller = ScriptedPoller::new(vec![
            Ok(op(OperationStatus::Pending)),
            Ok(op(OperationStatus::Running)),
            Ok(op(OperationStatus::Done)),
        ]);
        waiter()
            .wait(&Context::background(), &poller, &handle(), "Creating Address")
            .await
            .expect("operation should succeed");
        assert_eq!(poller.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_errors_fails_verbatim() {
        let mut failed = op(OperationStatus::Done);
        failed.errors = vec![OperationFault {
            code: "RESOURCE_NOT_READY".to_string(),
            message: "The resource is not ready".to_string(),
        }];
        let poller = ScriptedPoller::new(vec![Ok(failed)]);

        let err = waiter()
            .wait(&Context::background(), &poller, &handle(), "Deleting Address")
            .await
            .expect_err("operation should fail");
        match err {
            SkyforgeError::Operation(OperationError::Failed { faults, .. }) => {
                assert_eq!(faults[0].code, "RESOURCE_NOT_READY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let poller = ScriptedPoller::new(Vec::new());
        let err = waiter()
            .wait_with_timeout(
                &Context::background(),
                &poller,
                &handle(),
                "Recreating instances",
                Duration::from_secs(12),
            )
            .await
            .expect_err("wait should time out");
        assert!(err.is_timeout());
        assert!(poller.polls() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let poller = ScriptedPoller::new(vec![
            Err(ApiError::api_error(503, "backend error").into()),
            Err(ApiError::network("connection reset").into()),
            Ok(op(OperationStatus::Done)),
        ]);
        waiter()
            .wait(&Context::background(), &poller, &handle(), "Creating Address")
            .await
            .expect("transient errors should be absorbed");
        assert_eq!(poller.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_budget_exhausted() {
        let poller = ScriptedPoller::new(vec![
            Err(ApiError::api_error(503, "a").into()),
            Err(ApiError::api_error(503, "b").into()),
            Err(ApiError::api_error(503, "c").into()),
        ]);
        let err = waiter()
            .wait(&Context::background(), &poller, &handle(), "Creating Address")
            .await
            .expect_err("budget should run out");
        assert_eq!(err.api_status(), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_poll_error_aborts() {
        let poller = ScriptedPoller::new(vec![Err(ApiError::api_error(403, "denied").into())]);
        let err = waiter()
            .wait(&Context::background(), &poller, &handle(), "Creating Address")
            .await
            .expect_err("fatal error should abort");
        assert_eq!(err.api_status(), Some(403));
        assert_eq!(poller.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let (ctx, cancel) = Context::with_cancel();
        cancel.cancel();
        let poller = ScriptedPoller::new(Vec::new());
        let err = waiter()
            .wait(&ctx, &poller, &handle(), "Creating Address")
            .await
            .expect_err("wait should be cancelled");
        assert!(err.is_cancelled());
        assert_eq!(poller.polls(), 0);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let settings = WaitSettings::default();
        let mut backoff = Backoff::new(&settings);
        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(800) && first <= Duration::from_millis(1200));

        let mut last = first;
        for _ in 0..20 {
            last = backoff.next_delay();
        }
        assert!(last >= Duration::from_millis(8000) && last <= Duration::from_millis(12000));
    }

    #[test]
    fn test_backoff_without_jitter() {
        let settings = WaitSettings {
            jitter: 0.0,
            multiplier: 2.0,
            ..WaitSettings::default()
        };
        let mut backoff = Backoff::new(&settings);
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }
}
