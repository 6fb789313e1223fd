//! Wall-clock bounds, cancellation precedence, and run independence of the
//! retry orchestrator, all under tokio's paused clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reconcile_core::{AttemptError, RemoteError, RemoteErrorKind, ResourceLabel, RetryableOutcome};
use reconcile_retry::{run_read_with_retries, run_with_retries, CancelToken, Orchestrator};
use rstest::rstest;
use tokio::time::Instant;

fn busy() -> AttemptError {
    RemoteError::new(RemoteErrorKind::Transient, "upstream busy").into()
}

// ---------------------------------------------------------------------------
// 1. Deadline bound
// ---------------------------------------------------------------------------

#[rstest]
#[case(Duration::ZERO, Duration::from_millis(20))]
#[case(Duration::from_millis(1), Duration::from_millis(20))]
#[case(Duration::from_millis(100), Duration::from_millis(20))]
#[case(Duration::from_secs(30), Duration::from_millis(250))]
#[tokio::test(start_paused = true)]
async fn always_continue_times_out_within_deadline_plus_one_attempt(
    #[case] interval: Duration,
    #[case] attempt_cost: Duration,
) {
    let budget = Duration::from_secs(2);
    let started = Instant::now();
    let err = Orchestrator::new("architect_flow/aa01", CancelToken::new())
        .with_interval(interval)
        .run(started + budget, || async move {
            tokio::time::sleep(attempt_cost).await;
            RetryableOutcome::<()>::Continue(busy())
        })
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "got: {err}");
    assert!(
        started.elapsed() <= budget + attempt_cost,
        "elapsed {:?} exceeds budget {:?} + attempt {:?}",
        started.elapsed(),
        budget,
        attempt_cost
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_message_names_resource_attempts_and_elapsed() {
    let label = ResourceLabel::from("routing_wrapupcode/77c1");
    let cancel = CancelToken::new();
    let err = run_with_retries(&label, &cancel, Instant::now() + Duration::from_secs(1), || async {
        RetryableOutcome::<()>::Continue(busy())
    })
    .await
    .unwrap_err();

    let msg = err.to_string();
    assert!(msg.starts_with("routing_wrapupcode/77c1: timed out after 10 attempt(s) in 1.0s"), "{msg}");
    assert!(msg.ends_with("last error: transient failure: upstream busy"), "{msg}");
}

// ---------------------------------------------------------------------------
// 2. Cancellation precedence
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn pre_cancelled_token_yields_cancelled_even_with_expired_deadline() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let calls = AtomicU32::new(0);

    let err = run_with_retries(
        &ResourceLabel::from("group/12"),
        &cancel,
        Instant::now(),
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { RetryableOutcome::Success(()) }
        },
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled(), "got: {err}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn one_token_cancels_every_run_sharing_it() {
    let cancel = CancelToken::new();
    let mut handles = Vec::new();
    for i in 0..4 {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let label = ResourceLabel::from(format!("user/{i}"));
            run_read_with_retries(&label, &cancel, Duration::from_secs(300), || async {
                RetryableOutcome::<()>::Continue(RemoteError::not_found("not yet").into())
            })
            .await
        }));
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();

    for handle in handles {
        let err = handle.await.expect("join").unwrap_err();
        assert!(err.is_cancelled(), "got: {err}");
    }
}

// ---------------------------------------------------------------------------
// 3. Independence of concurrent runs
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_runs_keep_their_own_budgets() {
    let fast_calls = Arc::new(AtomicU32::new(0));
    let slow_calls = Arc::new(AtomicU32::new(0));

    let fast = {
        let calls = fast_calls.clone();
        tokio::spawn(async move {
            Orchestrator::new("routing_skill/a", CancelToken::new())
                .run_read(Duration::from_secs(5), move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            RetryableOutcome::Continue(busy())
                        } else {
                            RetryableOutcome::Success(n)
                        }
                    }
                })
                .await
        })
    };
    let slow = {
        let calls = slow_calls.clone();
        tokio::spawn(async move {
            Orchestrator::new("organization_settings/b", CancelToken::new())
                .run_read_with_timeout(Duration::from_millis(700), move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { RetryableOutcome::<u32>::Continue(busy()) }
                })
                .await
        })
    };

    assert_eq!(fast.await.expect("join").expect("fast converges"), 2);
    let err = slow.await.expect("join").unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.label().0, "organization_settings/b");
    assert_eq!(fast_calls.load(Ordering::SeqCst), 3);
    assert_eq!(slow_calls.load(Ordering::SeqCst), 7);
}
