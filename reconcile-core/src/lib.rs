//! Reconcile core library: outcome types, error taxonomy, process defaults.
//!
//! Public API surface:
//! - [`types`]: [`RetryableOutcome`], [`AttemptError`], [`RemoteError`], divergence payloads
//! - [`error`]: [`ReconcileError`], [`ConfigError`]
//! - [`defaults`]: [`ReconcileDefaults`] loading and the read-only process copy
//! - [`telemetry`]: tracing subscriber bootstrap

pub mod defaults;
pub mod error;
pub mod telemetry;
pub mod types;

pub use defaults::ReconcileDefaults;
pub use error::{ConfigError, ReconcileError};
pub use types::{
    AttemptError, AttributeDivergence, ConsistencyResult, Divergence, RemoteError,
    RemoteErrorKind, ResourceLabel, RetryableOutcome,
};
