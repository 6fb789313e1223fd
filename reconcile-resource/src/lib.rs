//! # reconcile-resource
//!
//! Binds the retry orchestrator and the consistency checker to a concrete
//! remote object type. Implement [`RemoteResource`] once per type and drive it
//! through a [`Reconciler`].

pub mod reconciler;
pub mod resource;

pub use reconciler::{Applied, Reconciler};
pub use resource::RemoteResource;
