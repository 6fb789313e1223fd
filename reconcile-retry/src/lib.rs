//! # reconcile-retry
//!
//! Bounded retry orchestration for eventually consistent remote operations.
//!
//! [`Orchestrator::run`] is the general deadline-bounded loop;
//! [`Orchestrator::run_read`] and [`Orchestrator::run_read_with_timeout`] add
//! not-found tolerance for post-write reads; [`Orchestrator::retry_when`]
//! bounds single write calls by attempt count. A [`CancelToken`] threads
//! through all of them.

pub mod cancel;
pub mod orchestrator;
pub mod retry_when;

pub use cancel::CancelToken;
pub use orchestrator::{
    run_read_with_custom_timeout, run_read_with_retries, run_with_retries, Orchestrator,
    RetryBudget, DEFAULT_RETRY_INTERVAL,
};
pub use retry_when::{is_transient, is_validation, is_version_mismatch};
