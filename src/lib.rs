//! devfile-registry-operator: Kubernetes operator for devfile registries
//!
//! This crate deploys devfile registries (index server, OCI registry and
//! viewer) from a `DevfileRegistry` resource and keeps the reachability of the
//! registries named in `DevfileRegistriesList` / `ClusterDevfileRegistriesList`
//! recorded in their status.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

#[cfg(feature = "admission-webhook")]
pub mod webhook;

pub use crate::config::OperatorConfig;
pub use crate::error::{Error, Result};
