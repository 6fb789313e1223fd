//! Shared outcome and error-payload types for the reconciliation core.
//!
//! Everything here is plain data: the retry orchestrator and the consistency
//! checker exchange these values but neither owns them.

use std::fmt;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Human-readable label of the resource a reconciliation run is working on,
/// e.g. `routing_queue/3f9a`. Appears in every error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLabel(pub String);

impl ResourceLabel {
    /// Build a `<resource_type>/<id>` label.
    pub fn for_instance(resource_type: &str, id: &str) -> Self {
        Self(format!("{resource_type}/{id}"))
    }
}

impl fmt::Display for ResourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceLabel {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Outcome of a single attempt
// ---------------------------------------------------------------------------

/// What one invocation of a retried operation reports back.
///
/// The operation, not the orchestrator, decides which tag applies: only the
/// caller knows that a 404 right after a create is expected while a 403 never
/// is.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableOutcome<T> {
    /// Done; stop with this value.
    Success(T),
    /// Not there yet; try again if the budget allows.
    Continue(AttemptError),
    /// Give up now regardless of the remaining budget.
    Terminal(AttemptError),
}

impl<T> RetryableOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryableOutcome::Success(_))
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, RetryableOutcome::Continue(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryableOutcome::Terminal(_))
    }

    /// The error carried by a `Continue` or `Terminal` outcome.
    pub fn error(&self) -> Option<&AttemptError> {
        match self {
            RetryableOutcome::Success(_) => None,
            RetryableOutcome::Continue(e) | RetryableOutcome::Terminal(e) => Some(e),
        }
    }
}

/// Error payload of a non-successful attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttemptError {
    /// The remote call itself failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The remote call succeeded but the observed state does not match yet.
    #[error(transparent)]
    Diverged(#[from] Divergence),

    /// The remote state is readable but some other condition is still pending,
    /// e.g. a deleted object that is still listed.
    #[error("{0}")]
    Pending(String),
}

impl AttemptError {
    pub fn pending(message: impl Into<String>) -> Self {
        Self::Pending(message.into())
    }

    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            AttemptError::Remote(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_divergence(&self) -> Option<&Divergence> {
        match self {
            AttemptError::Diverged(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.as_remote()
            .is_some_and(|err| err.kind == RemoteErrorKind::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Remote errors
// ---------------------------------------------------------------------------

/// Coarse classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    VersionMismatch,
    Transient,
    Other,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteErrorKind::NotFound => write!(f, "not found"),
            RemoteErrorKind::PermissionDenied => write!(f, "permission denied"),
            RemoteErrorKind::Validation => write!(f, "validation failed"),
            RemoteErrorKind::VersionMismatch => write!(f, "version mismatch"),
            RemoteErrorKind::Transient => write!(f, "transient failure"),
            RemoteErrorKind::Other => write!(f, "remote error"),
        }
    }
}

/// A failed call against the remote platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// HTTP-like status code, when the transport reported one.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a status code the way the platform's API uses them.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            404 => RemoteErrorKind::NotFound,
            401 | 403 => RemoteErrorKind::PermissionDenied,
            400 | 422 => RemoteErrorKind::Validation,
            409 => RemoteErrorKind::VersionMismatch,
            429 | 500..=599 => RemoteErrorKind::Transient,
            _ => RemoteErrorKind::Other,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

// ---------------------------------------------------------------------------
// Consistency check payloads
// ---------------------------------------------------------------------------

/// One attribute whose observed value does not (yet) match the expected one.
///
/// Values are pre-rendered for display; sensitive attributes carry a
/// placeholder instead of the real value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDivergence {
    pub name: String,
    pub expected: String,
    pub observed: String,
}

/// All attributes that diverged in one consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub attributes: Vec<AttributeDivergence>,
    pub attempts_used: u32,
    pub max_attempts: u32,
}

impl Divergence {
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attribute(s) did not converge after {}/{} check(s): ",
            self.attributes.len(),
            self.attempts_used,
            self.max_attempts
        )?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{} (expected {}, observed {})",
                attr.name, attr.expected, attr.observed
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for Divergence {}

/// Verdict of a single consistency check.
///
/// `divergent_attributes` is empty exactly when `converged` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyResult {
    pub converged: bool,
    pub divergent_attributes: Vec<String>,
    pub attempts_used: u32,
}

impl ConsistencyResult {
    pub fn converged(attempts_used: u32) -> Self {
        Self {
            converged: true,
            divergent_attributes: Vec::new(),
            attempts_used,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_display_and_instance_format() {
        assert_eq!(ResourceLabel::from("queue").to_string(), "queue");
        assert_eq!(
            ResourceLabel::for_instance("routing_queue", "3f9a").to_string(),
            "routing_queue/3f9a"
        );
    }

    #[test]
    fn status_codes_classify() {
        assert_eq!(RemoteError::from_status(404, "x").kind, RemoteErrorKind::NotFound);
        assert_eq!(
            RemoteError::from_status(403, "x").kind,
            RemoteErrorKind::PermissionDenied
        );
        assert_eq!(RemoteError::from_status(400, "x").kind, RemoteErrorKind::Validation);
        assert_eq!(
            RemoteError::from_status(409, "x").kind,
            RemoteErrorKind::VersionMismatch
        );
        assert_eq!(RemoteError::from_status(503, "x").kind, RemoteErrorKind::Transient);
        assert_eq!(RemoteError::from_status(429, "x").kind, RemoteErrorKind::Transient);
        assert_eq!(RemoteError::from_status(418, "x").kind, RemoteErrorKind::Other);
    }

    #[test]
    fn remote_error_display_includes_status() {
        let err = RemoteError::from_status(403, "no scope routing:queue:edit");
        assert_eq!(
            err.to_string(),
            "permission denied (403): no scope routing:queue:edit"
        );
        let err = RemoteError::new(RemoteErrorKind::Transient, "connection reset");
        assert_eq!(err.to_string(), "transient failure: connection reset");
    }

    #[test]
    fn divergence_display_lists_every_attribute() {
        let d = Divergence {
            attributes: vec![
                AttributeDivergence {
                    name: "status".into(),
                    expected: "\"active\"".into(),
                    observed: "\"pending\"".into(),
                },
                AttributeDivergence {
                    name: "priority".into(),
                    expected: "3".into(),
                    observed: "1".into(),
                },
            ],
            attempts_used: 5,
            max_attempts: 5,
        };
        let msg = d.to_string();
        assert!(msg.starts_with("2 attribute(s) did not converge after 5/5 check(s)"));
        assert!(msg.contains("status (expected \"active\", observed \"pending\")"));
        assert!(msg.contains("priority (expected 3, observed 1)"));
        assert_eq!(d.attribute_names(), vec!["status", "priority"]);
    }

    #[test]
    fn attempt_error_not_found_detection() {
        let err: AttemptError = RemoteError::not_found("queue 3f9a").into();
        assert!(err.is_not_found());
        assert!(!AttemptError::pending("x").is_not_found());
    }
}
