//! Bounded-time retry loop.
//!
//! The loop knows nothing about resources. It only understands the tri-state
//! [`RetryableOutcome`] its operation returns:
//!
//! - `Success` stops with the value.
//! - `Terminal` stops with the error, whatever budget is left.
//! - `Continue` sleeps a fixed interval and tries again, until the deadline
//!   passes (`Timeout`) or the token is cancelled (`Cancelled`).
//!
//! Cancellation is checked before every attempt and before every sleep, and
//! always wins over a timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use reconcile_core::{AttemptError, ReconcileError, ResourceLabel, RetryableOutcome};

use crate::cancel::CancelToken;

/// Fixed pause between attempts when no interval is configured.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Deadline plus the number of attempts started so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub deadline: Instant,
    pub attempts_so_far: u32,
}

impl RetryBudget {
    pub fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            attempts_so_far: 0,
        }
    }

    pub fn is_exhausted(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    General,
    Read,
}

/// Runs operations for one resource under one cancellation token.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    label: ResourceLabel,
    cancel: CancelToken,
    interval: Duration,
}

impl Orchestrator {
    pub fn new(label: impl Into<ResourceLabel>, cancel: CancelToken) -> Self {
        Self {
            label: label.into(),
            cancel,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Override the fixed pause between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn label(&self) -> &ResourceLabel {
        &self.label
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Retry `operation` until it succeeds, fails terminally, `deadline`
    /// passes, or the token is cancelled.
    pub async fn run<T, F, Fut>(&self, deadline: Instant, operation: F) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RetryableOutcome<T>>,
    {
        self.run_loop(deadline, Mode::General, operation).await
    }

    /// Read-oriented run with a deadline of `now + resource_default_timeout`.
    ///
    /// A `NotFound` remote error returned as `Continue` is tolerated (the
    /// object may not have propagated yet) until the deadline, at which point
    /// the run ends with [`ReconcileError::NotFound`]. A `NotFound` returned
    /// as `Terminal` ends the run the same way immediately.
    pub async fn run_read<T, F, Fut>(
        &self,
        resource_default_timeout: Duration,
        operation: F,
    ) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RetryableOutcome<T>>,
    {
        let deadline = Instant::now() + resource_default_timeout;
        self.run_loop(deadline, Mode::Read, operation).await
    }

    /// [`run_read`](Self::run_read) with an explicit budget, for resource
    /// types known to converge more slowly than their default.
    pub async fn run_read_with_timeout<T, F, Fut>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RetryableOutcome<T>>,
    {
        let deadline = Instant::now() + timeout;
        self.run_loop(deadline, Mode::Read, operation).await
    }

    async fn run_loop<T, F, Fut>(
        &self,
        deadline: Instant,
        mode: Mode,
        mut operation: F,
    ) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RetryableOutcome<T>>,
    {
        let started = Instant::now();
        let mut budget = RetryBudget::new(deadline);
        let mut last: Option<AttemptError> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&budget, started));
            }
            if budget.is_exhausted(Instant::now()) {
                return Err(self.timed_out(&budget, started, mode, last));
            }

            budget.attempts_so_far += 1;
            match operation().await {
                RetryableOutcome::Success(value) => {
                    if budget.attempts_so_far > 1 {
                        tracing::debug!(
                            resource = %self.label,
                            attempts = budget.attempts_so_far,
                            "operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                RetryableOutcome::Terminal(err) => {
                    if mode == Mode::Read && err.is_not_found() {
                        return Err(self.not_found(&budget, started));
                    }
                    tracing::debug!(
                        resource = %self.label,
                        attempt = budget.attempts_so_far,
                        error = %err,
                        "operation failed terminally"
                    );
                    return Err(ReconcileError::Terminal {
                        label: self.label.clone(),
                        attempts: budget.attempts_so_far,
                        elapsed: started.elapsed(),
                        source: err,
                    });
                }
                RetryableOutcome::Continue(err) => {
                    tracing::debug!(
                        resource = %self.label,
                        attempt = budget.attempts_so_far,
                        error = %err,
                        "operation not complete, will retry"
                    );
                    if self.cancel.is_cancelled() {
                        return Err(self.cancelled(&budget, started));
                    }
                    let now = Instant::now();
                    if budget.is_exhausted(now) {
                        return Err(self.timed_out(&budget, started, mode, Some(err)));
                    }
                    last = Some(err);

                    // Never sleep past the deadline: the loop re-checks it on
                    // wake-up and reports the timeout without a new attempt.
                    let pause = self.interval.min(budget.remaining(now));
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            return Err(self.cancelled(&budget, started));
                        }
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }
    }

    fn cancelled(&self, budget: &RetryBudget, started: Instant) -> ReconcileError {
        tracing::info!(
            resource = %self.label,
            attempts = budget.attempts_so_far,
            "reconciliation cancelled"
        );
        ReconcileError::Cancelled {
            label: self.label.clone(),
            attempts: budget.attempts_so_far,
            elapsed: started.elapsed(),
        }
    }

    fn not_found(&self, budget: &RetryBudget, started: Instant) -> ReconcileError {
        ReconcileError::NotFound {
            label: self.label.clone(),
            attempts: budget.attempts_so_far,
            elapsed: started.elapsed(),
        }
    }

    fn timed_out(
        &self,
        budget: &RetryBudget,
        started: Instant,
        mode: Mode,
        last: Option<AttemptError>,
    ) -> ReconcileError {
        if mode == Mode::Read && last.as_ref().is_some_and(AttemptError::is_not_found) {
            return self.not_found(budget, started);
        }
        tracing::warn!(
            resource = %self.label,
            attempts = budget.attempts_so_far,
            "reconciliation deadline reached"
        );
        ReconcileError::Timeout {
            label: self.label.clone(),
            attempts: budget.attempts_so_far,
            elapsed: started.elapsed(),
            last,
        }
    }
}

/// General-purpose run with an explicit deadline, e.g. delete confirmation.
pub async fn run_with_retries<T, F, Fut>(
    label: &ResourceLabel,
    cancel: &CancelToken,
    deadline: Instant,
    operation: F,
) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryableOutcome<T>>,
{
    Orchestrator::new(label.clone(), cancel.clone())
        .run(deadline, operation)
        .await
}

/// Read-oriented run bounded by the resource's default read timeout.
pub async fn run_read_with_retries<T, F, Fut>(
    label: &ResourceLabel,
    cancel: &CancelToken,
    resource_default_timeout: Duration,
    operation: F,
) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryableOutcome<T>>,
{
    Orchestrator::new(label.clone(), cancel.clone())
        .run_read(resource_default_timeout, operation)
        .await
}

/// Read-oriented run with an explicit custom timeout.
pub async fn run_read_with_custom_timeout<T, F, Fut>(
    label: &ResourceLabel,
    cancel: &CancelToken,
    timeout: Duration,
    operation: F,
) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryableOutcome<T>>,
{
    Orchestrator::new(label.clone(), cancel.clone())
        .run_read_with_timeout(timeout, operation)
        .await
}
