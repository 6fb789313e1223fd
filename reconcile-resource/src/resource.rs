//! The capability each remote resource type implements once.

use std::time::Duration;

use async_trait::async_trait;

use reconcile_consistency::{AttributeRules, ExpectedState, ObservedState};
use reconcile_core::RemoteError;

/// CRUD access to one kind of object on the remote platform.
///
/// Implementations only talk to the platform; retrying, consistency checks
/// and timeouts are applied around them by [`crate::Reconciler`].
#[async_trait]
pub trait RemoteResource: Send + Sync {
    /// Type name used in labels and for per-type timeout overrides,
    /// e.g. `routing_queue`.
    fn resource_type(&self) -> &str;

    /// Create the object and return its platform-assigned id.
    async fn create(&self, desired: &ExpectedState) -> Result<String, RemoteError>;

    async fn read(&self, id: &str) -> Result<ObservedState, RemoteError>;

    async fn update(&self, id: &str, desired: &ExpectedState) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    /// Comparison rules for this type's attributes.
    fn attribute_rules(&self) -> AttributeRules {
        AttributeRules::new()
    }

    /// Read budget for this type, when it differs from the configured one.
    fn read_timeout(&self) -> Option<Duration> {
        None
    }

    /// Consistency-check ceiling for this type, when it differs from the
    /// configured one.
    fn consistency_attempts(&self) -> Option<u32> {
        None
    }
}
