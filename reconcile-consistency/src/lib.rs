//! # reconcile-consistency
//!
//! Decides whether a remote resource's observed state matches the state that
//! was just applied, tolerating propagation lag for a bounded number of
//! checks.
//!
//! - [`state`]: [`ExpectedState`] / [`ObservedState`] snapshots
//! - [`rules`]: per-attribute comparison rules and diff suppression
//! - [`canonical`]: value canonicalization and equality
//! - [`suppress`]: built-in suppression predicates
//! - [`checker`]: the [`ConsistencyChecker`] state machine

pub mod canonical;
pub mod checker;
pub mod rules;
pub mod state;
pub mod suppress;

pub use canonical::{canonicalize, values_equal, Canonical};
pub use checker::{CheckerState, ConsistencyChecker};
pub use rules::{AttributeRule, AttributeRules, DiffSuppressFn};
pub use state::{ExpectedState, ObservedState};
