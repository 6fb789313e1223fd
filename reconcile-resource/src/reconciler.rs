//! Generic reconciliation of one resource type against the remote platform.
//!
//! Every write is followed by a read-back: the object is re-read until the
//! consistency checker accepts it, the checker's attempt ceiling is reached,
//! or the read budget runs out. Deletes are confirmed by polling until the
//! object is gone.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use reconcile_consistency::{ConsistencyChecker, ExpectedState, ObservedState};
use reconcile_core::{
    AttemptError, ConsistencyResult, ReconcileDefaults, ReconcileError, RemoteError,
    RemoteErrorKind, ResourceLabel, RetryableOutcome,
};
use reconcile_retry::{is_transient, is_version_mismatch, CancelToken, Orchestrator};

use crate::resource::RemoteResource;

/// Label used for a create call, before the platform has assigned an id.
const PENDING_ID: &str = "(new)";

// ---------------------------------------------------------------------------
// Result of a successful write
// ---------------------------------------------------------------------------

/// A write the platform has accepted and that reads back consistently.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub id: String,
    /// The last state read from the platform.
    pub observed: ObservedState,
    pub result: ConsistencyResult,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<R> {
    resource: R,
    defaults: ReconcileDefaults,
    cancel: CancelToken,
}

impl<R: RemoteResource> Reconciler<R> {
    pub fn new(resource: R, defaults: ReconcileDefaults, cancel: CancelToken) -> Self {
        Self {
            resource,
            defaults,
            cancel,
        }
    }

    /// Build with the process-wide defaults (see [`reconcile_core::defaults::install`]).
    pub fn with_global_defaults(resource: R, cancel: CancelToken) -> Self {
        Self::new(resource, reconcile_core::defaults::global().clone(), cancel)
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn defaults(&self) -> &ReconcileDefaults {
        &self.defaults
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn label_for(&self, id: &str) -> ResourceLabel {
        ResourceLabel::for_instance(self.resource.resource_type(), id)
    }

    /// Read budget: the resource's own override, then the configured
    /// per-type override, then the configured default.
    pub fn read_timeout(&self) -> Duration {
        self.resource
            .read_timeout()
            .unwrap_or_else(|| self.defaults.read_timeout_for(self.resource.resource_type()))
    }

    pub fn consistency_attempts(&self) -> u32 {
        self.resource
            .consistency_attempts()
            .unwrap_or(self.defaults.consistency_max_attempts)
    }

    // -- writes -------------------------------------------------------------

    /// Create the object, retrying transient failures, then wait for it to
    /// read back as `desired`.
    pub async fn create(&self, desired: &ExpectedState) -> Result<Applied, ReconcileError> {
        let resource = &self.resource;
        let id = self
            .bounded_write(self.label_for(PENDING_ID), is_transient, move || {
                resource.create(desired)
            })
            .await?;
        tracing::info!(resource = %self.label_for(&id), "created");
        self.read_back(&id, desired).await
    }

    /// Update the object, retrying version conflicts and transient failures,
    /// then wait for it to read back as `desired`.
    pub async fn update(
        &self,
        id: &str,
        desired: &ExpectedState,
    ) -> Result<Applied, ReconcileError> {
        let resource = &self.resource;
        self.bounded_write(
            self.label_for(id),
            |err| is_version_mismatch(err) || is_transient(err),
            move || resource.update(id, desired),
        )
        .await?;
        tracing::debug!(resource = %self.label_for(id), "update accepted");
        self.read_back(id, desired).await
    }

    /// Delete the object and poll until reads no longer return it.
    ///
    /// An object that is already gone counts as deleted.
    pub async fn delete(&self, id: &str) -> Result<(), ReconcileError> {
        let label = self.label_for(id);
        let resource = &self.resource;

        let deleted = self
            .bounded_write(label.clone(), is_transient, move || resource.delete(id))
            .await;
        match deleted {
            Ok(()) => {}
            Err(err) if err.last_error().is_some_and(AttemptError::is_not_found) => {
                tracing::debug!(resource = %label, "already deleted");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let deadline = Instant::now() + self.defaults.delete_timeout();
        self.orchestrator(label.clone())
            .run(deadline, move || async move {
                match resource.read(id).await {
                    Ok(_) => RetryableOutcome::Continue(AttemptError::pending(
                        "object still present after delete",
                    )),
                    Err(err) if err.is_not_found() => RetryableOutcome::Success(()),
                    Err(err) if is_transient(&err) => RetryableOutcome::Continue(err.into()),
                    Err(err) => RetryableOutcome::Terminal(err.into()),
                }
            })
            .await?;
        tracing::info!(resource = %label, "deleted");
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    /// Re-read `id` until it matches `desired`.
    ///
    /// A `NotFound` or transient read error is retried until the read budget
    /// runs out; a `NotFound` still present at that point ends the run with
    /// [`ReconcileError::NotFound`]. Any other read error is terminal.
    pub async fn read_back(
        &self,
        id: &str,
        desired: &ExpectedState,
    ) -> Result<Applied, ReconcileError> {
        let label = self.label_for(id);
        let checker = Mutex::new(ConsistencyChecker::new(
            desired.clone(),
            self.resource.attribute_rules(),
            self.consistency_attempts(),
            label.clone(),
        ));
        let latest: Mutex<Option<ObservedState>> = Mutex::new(None);

        let (resource, checker_ref, latest_ref) = (&self.resource, &checker, &latest);
        let result = self
            .orchestrator(label)
            .run_read_with_timeout(self.read_timeout(), move || async move {
                let observed = match resource.read(id).await {
                    Ok(observed) => observed,
                    Err(err) => return classify_read_error(err),
                };
                let outcome = lock(checker_ref).check(&observed);
                *lock(latest_ref) = Some(observed);
                outcome
            })
            .await?;

        let observed = latest
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_default();
        Ok(Applied {
            id: id.to_string(),
            observed,
            result,
        })
    }

    /// Read the current state of `id`, retrying transient failures.
    ///
    /// A `NotFound` ends the read immediately with
    /// [`ReconcileError::NotFound`]: the object is gone and callers should
    /// drop it from their local state.
    pub async fn refresh(&self, id: &str) -> Result<ObservedState, ReconcileError> {
        let resource = &self.resource;
        self.orchestrator(self.label_for(id))
            .run_read_with_timeout(self.read_timeout(), move || async move {
                match resource.read(id).await {
                    Ok(observed) => RetryableOutcome::Success(observed),
                    Err(err) if is_transient(&err) => RetryableOutcome::Continue(err.into()),
                    Err(err) => RetryableOutcome::Terminal(err.into()),
                }
            })
            .await
    }

    // -- helpers ------------------------------------------------------------

    fn orchestrator(&self, label: ResourceLabel) -> Orchestrator {
        Orchestrator::new(label, self.cancel.clone()).with_interval(self.defaults.retry_interval())
    }

    /// `retry_when` bounded by the configured attempt ceiling and the write
    /// timeout. A timeout carries the last error any finished call returned.
    async fn bounded_write<T, P, F, Fut>(
        &self,
        label: ResourceLabel,
        should_retry: P,
        mut call: F,
    ) -> Result<T, ReconcileError>
    where
        P: Fn(&RemoteError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let budget = self.defaults.write_timeout();
        let calls = AtomicU32::new(0);
        let last_error: Mutex<Option<RemoteError>> = Mutex::new(None);
        let orchestrator = self.orchestrator(label.clone());

        let (counter, slot) = (&calls, &last_error);
        let attempt = orchestrator.retry_when(
            self.defaults.retry_when_max_attempts,
            should_retry,
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
                let pending = call();
                async move {
                    let result = pending.await;
                    if let Err(err) = &result {
                        *lock(slot) = Some(err.clone());
                    }
                    result
                }
            },
        );

        let outcome = tokio::time::timeout(budget, attempt).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let last = lock(&last_error).take().map(AttemptError::Remote);
                tracing::warn!(
                    resource = %label,
                    last_error = ?last.as_ref().map(ToString::to_string),
                    "write did not complete in time"
                );
                Err(ReconcileError::Timeout {
                    label,
                    attempts: calls.load(Ordering::Relaxed),
                    elapsed: budget,
                    last,
                })
            }
        }
    }
}

fn classify_read_error<T>(err: RemoteError) -> RetryableOutcome<T> {
    match err.kind {
        RemoteErrorKind::NotFound | RemoteErrorKind::Transient => {
            RetryableOutcome::Continue(err.into())
        }
        _ => RetryableOutcome::Terminal(err.into()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagation_errors_are_retried_on_read_back() {
        assert!(classify_read_error::<()>(RemoteError::not_found("gone")).is_continue());
        assert!(classify_read_error::<()>(RemoteError::from_status(503, "busy")).is_continue());
        assert!(classify_read_error::<()>(RemoteError::from_status(429, "slow down")).is_continue());
    }

    #[test]
    fn other_read_errors_are_terminal() {
        assert!(classify_read_error::<()>(RemoteError::from_status(403, "no")).is_terminal());
        assert!(classify_read_error::<()>(RemoteError::from_status(400, "bad")).is_terminal());
        assert!(classify_read_error::<()>(RemoteError::from_status(418, "teapot")).is_terminal());
    }
}
