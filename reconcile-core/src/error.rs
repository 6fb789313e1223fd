//! Error types for the reconciliation core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{AttemptError, Divergence, ResourceLabel};

/// How a reconciliation run ended when it did not succeed.
///
/// Every variant names the resource, the attempts used and the elapsed time,
/// so "the backend is slow", "the backend rejected the write" and "the
/// observed state never matched" can be told apart from the message alone.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The caller's cancellation token fired. Takes priority over timeouts.
    #[error("{label}: cancelled after {attempts} attempt(s) in {}", format_elapsed(.elapsed))]
    Cancelled {
        label: ResourceLabel,
        attempts: u32,
        elapsed: Duration,
    },

    /// The deadline passed while the operation still asked to continue.
    #[error(
        "{label}: timed out after {attempts} attempt(s) in {}{}",
        format_elapsed(.elapsed),
        last_error_suffix(.last)
    )]
    Timeout {
        label: ResourceLabel,
        attempts: u32,
        elapsed: Duration,
        last: Option<AttemptError>,
    },

    /// The operation reported a terminal failure: a non-retryable remote
    /// error, or a divergence that exhausted its attempt ceiling.
    #[error("{label}: failed after {attempts} attempt(s) in {}: {source}", format_elapsed(.elapsed))]
    Terminal {
        label: ResourceLabel,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: AttemptError,
    },

    /// A read never found the object; it is presumed absent.
    #[error(
        "{label}: not found after {attempts} attempt(s) in {}; presumed absent",
        format_elapsed(.elapsed)
    )]
    NotFound {
        label: ResourceLabel,
        attempts: u32,
        elapsed: Duration,
    },

    /// A count-bounded retry used up its attempts.
    #[error("{label}: gave up after {attempts} attempt(s) in {}: {last}", format_elapsed(.elapsed))]
    AttemptsExhausted {
        label: ResourceLabel,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: AttemptError,
    },
}

impl ReconcileError {
    pub fn label(&self) -> &ResourceLabel {
        match self {
            ReconcileError::Cancelled { label, .. }
            | ReconcileError::Timeout { label, .. }
            | ReconcileError::Terminal { label, .. }
            | ReconcileError::NotFound { label, .. }
            | ReconcileError::AttemptsExhausted { label, .. } => label,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ReconcileError::Cancelled { attempts, .. }
            | ReconcileError::Timeout { attempts, .. }
            | ReconcileError::Terminal { attempts, .. }
            | ReconcileError::NotFound { attempts, .. }
            | ReconcileError::AttemptsExhausted { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            ReconcileError::Cancelled { elapsed, .. }
            | ReconcileError::Timeout { elapsed, .. }
            | ReconcileError::Terminal { elapsed, .. }
            | ReconcileError::NotFound { elapsed, .. }
            | ReconcileError::AttemptsExhausted { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReconcileError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }

    /// The underlying attempt error, if the run ended on one.
    pub fn last_error(&self) -> Option<&AttemptError> {
        match self {
            ReconcileError::Timeout { last, .. } => last.as_ref(),
            ReconcileError::Terminal { source, .. } => Some(source),
            ReconcileError::AttemptsExhausted { last, .. } => Some(last),
            ReconcileError::Cancelled { .. } | ReconcileError::NotFound { .. } => None,
        }
    }

    /// The divergence that ended the run, if it was a consistency failure.
    pub fn divergence(&self) -> Option<&Divergence> {
        self.last_error().and_then(AttemptError::as_divergence)
    }

    /// Attributes that never converged; empty for non-consistency failures.
    pub fn divergent_attributes(&self) -> Vec<&str> {
        self.divergence()
            .map(Divergence::attribute_names)
            .unwrap_or_default()
    }
}

/// Errors raised while loading or installing [`crate::ReconcileDefaults`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the offending file.
    #[error("failed to parse reconcile defaults at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid reconcile defaults: {0}")]
    Invalid(String),

    #[error("process-wide reconcile defaults were already installed")]
    AlreadyInstalled,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Compact elapsed-time rendering for error messages: `850ms`, `12.4s`, `3m05s`.
pub fn format_elapsed(elapsed: &Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1_000 {
        return format!("{millis}ms");
    }
    let secs = elapsed.as_secs();
    if secs < 60 {
        return format!("{:.1}s", elapsed.as_secs_f64());
    }
    format!("{}m{:02}s", secs / 60, secs % 60)
}

fn last_error_suffix(last: &Option<AttemptError>) -> String {
    match last {
        Some(err) => format!("; last error: {err}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeDivergence, RemoteError};

    fn label() -> ResourceLabel {
        ResourceLabel::from("routing_queue/3f9a")
    }

    #[test]
    fn elapsed_formatting_is_compact() {
        assert_eq!(format_elapsed(&Duration::from_millis(850)), "850ms");
        assert_eq!(format_elapsed(&Duration::from_millis(12_400)), "12.4s");
        assert_eq!(format_elapsed(&Duration::from_secs(185)), "3m05s");
    }

    #[test]
    fn timeout_message_wraps_last_error() {
        let err = ReconcileError::Timeout {
            label: label(),
            attempts: 7,
            elapsed: Duration::from_secs(30),
            last: Some(RemoteError::from_status(503, "upstream busy").into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("routing_queue/3f9a: timed out after 7 attempt(s) in 30.0s"));
        assert!(msg.contains("last error: transient failure (503): upstream busy"));
        assert!(err.is_timeout());
        assert_eq!(err.attempts(), 7);
    }

    #[test]
    fn terminal_divergence_exposes_attribute_names() {
        let divergence = Divergence {
            attributes: vec![AttributeDivergence {
                name: "status".into(),
                expected: "\"active\"".into(),
                observed: "\"pending\"".into(),
            }],
            attempts_used: 3,
            max_attempts: 3,
        };
        let err = ReconcileError::Terminal {
            label: label(),
            attempts: 3,
            elapsed: Duration::from_millis(300),
            source: divergence.into(),
        };
        assert_eq!(err.divergent_attributes(), vec!["status"]);
        assert!(err.to_string().contains("status (expected \"active\""));
    }

    #[test]
    fn cancelled_has_no_last_error() {
        let err = ReconcileError::Cancelled {
            label: label(),
            attempts: 0,
            elapsed: Duration::ZERO,
        };
        assert!(err.is_cancelled());
        assert!(err.last_error().is_none());
        assert!(err.divergent_attributes().is_empty());
        assert_eq!(err.to_string(), "routing_queue/3f9a: cancelled after 0 attempt(s) in 0ms");
    }
}
