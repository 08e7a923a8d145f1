//! Custom Resource Definitions for the devfile registry operator
//!
//! `DevfileRegistry` drives a deployed registry; the two registries list kinds
//! hold external registry endpoints whose reachability is tracked in status.

mod devfile_registry;
mod registries_list;
pub mod route;
pub mod types;

#[cfg(test)]
mod tests;

pub use devfile_registry::{
    ComponentSpec, DevfileRegistry, DevfileRegistrySpec, DevfileRegistryStatus, K8sSpec,
    StorageSpec, TelemetrySpec, TlsSpec,
};
pub use registries_list::{
    ClusterDevfileRegistriesList, ClusterDevfileRegistriesListSpec, DevfileRegistriesList,
    DevfileRegistriesListSpec, RegistryList,
};
pub use route::{Route, RouteSpec, RouteStatus};
pub use types::*;
