//! Controller module for DevfileRegistry and registries list reconciliation
//!
//! This module contains the controller loops, the convergence engine for the
//! registry workload, and status handling for the registries lists.

pub mod conditions;
pub mod defaults;
mod devfile_registry;
pub mod drift;
pub mod ensure;
#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(test)]
pub(crate) mod mock_store;
pub mod naming;
pub mod platform;
mod reconciler;
mod registries_list;
pub mod resources;
#[cfg(test)]
mod resources_test;
pub mod retry;
pub mod status;
pub mod store;
pub mod validation;
pub mod validator;

pub use devfile_registry::reconcile_registry;
pub use ensure::{ensure, ensure_kind, ChildKind, ChildResource, EnsureContext, EnsureOutcome};
pub use platform::ClusterPlatform;
pub use reconciler::{run_controller, ControllerState, ReconcileAction};
pub use registries_list::reconcile_list;
pub use store::{KubeStore, ResourceStore, StoreObject};
pub use validation::{validate_entries, ValidationReport};
pub use validator::{EndpointValidator, HttpIndexValidator};
