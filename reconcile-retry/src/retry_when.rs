//! Count-bounded retry for single remote write calls.
//!
//! Some platform errors are known to clear on their own: a version mismatch on
//! update after a concurrent modification, or a 400 for a dependency created a
//! moment earlier. `retry_when` repeats the call while the caller's predicate
//! says so, up to a fixed number of attempts, with the same fixed pacing and
//! cancellation rules as the deadline-based loop.

use std::future::Future;

use tokio::time::Instant;

use reconcile_core::{AttemptError, ReconcileError, RemoteError, RemoteErrorKind};

use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Call `operation` until it succeeds, fails with an error `should_retry`
    /// rejects, or `max_attempts` calls have been made (at least one is
    /// always made).
    pub async fn retry_when<T, P, F, Fut>(
        &self,
        max_attempts: u32,
        should_retry: P,
        mut operation: F,
    ) -> Result<T, ReconcileError>
    where
        P: Fn(&RemoteError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = max_attempts.max(1);
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if self.cancel_token().is_cancelled() {
                return Err(ReconcileError::Cancelled {
                    label: self.label().clone(),
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            attempts += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !should_retry(&err) {
                return Err(ReconcileError::Terminal {
                    label: self.label().clone(),
                    attempts,
                    elapsed: started.elapsed(),
                    source: AttemptError::Remote(err),
                });
            }
            if attempts >= max_attempts {
                tracing::warn!(
                    resource = %self.label(),
                    attempts,
                    error = %err,
                    "retryable write error persisted"
                );
                return Err(ReconcileError::AttemptsExhausted {
                    label: self.label().clone(),
                    attempts,
                    elapsed: started.elapsed(),
                    last: AttemptError::Remote(err),
                });
            }

            tracing::debug!(
                resource = %self.label(),
                attempt = attempts,
                error = %err,
                "retryable write error, retrying"
            );
            tokio::select! {
                biased;
                _ = self.cancel_token().cancelled() => {
                    return Err(ReconcileError::Cancelled {
                        label: self.label().clone(),
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
                _ = tokio::time::sleep(self.interval()) => {}
            }
        }
    }
}

/// Conflicting concurrent modification (409).
pub fn is_version_mismatch(err: &RemoteError) -> bool {
    err.kind == RemoteErrorKind::VersionMismatch
}

/// Throttling or server-side failure (429, 5xx).
pub fn is_transient(err: &RemoteError) -> bool {
    err.kind == RemoteErrorKind::Transient
}

/// Request rejected as invalid (400, 422). Only worth retrying right after a
/// dependency was created and may not be visible yet.
pub fn is_validation(err: &RemoteError) -> bool {
    err.kind == RemoteErrorKind::Validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::cancel::CancelToken;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new("routing_queue/3f9a", CancelToken::new())
            .with_interval(Duration::from_millis(50))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_version_mismatch_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = orchestrator()
            .retry_when(10, is_version_mismatch, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RemoteError::from_status(409, "version 3 != 4"))
                    } else {
                        Ok("updated")
                    }
                }
            })
            .await
            .expect("update");
        assert_eq!(result, "updated");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_error_is_terminal_immediately() {
        let calls = AtomicU32::new(0);
        let err = orchestrator()
            .retry_when(10, is_version_mismatch, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RemoteError::from_status(403, "forbidden")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Terminal { attempts: 1, .. }), "got: {err}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_last_error() {
        let calls = AtomicU32::new(0);
        let err = orchestrator()
            .retry_when(4, is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RemoteError::from_status(503, "busy")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::AttemptsExhausted { attempts: 4, .. }));
        assert!(err.to_string().contains("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ceiling_still_calls_once() {
        let calls = AtomicU32::new(0);
        let result = orchestrator()
            .retry_when(0, is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RemoteError>(1) }
            })
            .await
            .expect("ok");
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_before_first_call() {
        let orch = orchestrator();
        orch.cancel_token().cancel();
        let err = orch
            .retry_when(3, is_transient, || async { Ok::<_, RemoteError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled { attempts: 0, .. }));
    }
}
