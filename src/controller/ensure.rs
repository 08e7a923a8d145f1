//! Convergence engine for DevfileRegistry child resources
//!
//! Every child kind implements [`ChildResource`]. [`ensure`] creates the object
//! when it is missing and otherwise patches only the fields its drift detector
//! reports, so fields owned by other actors survive the update.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::crd::{DevfileRegistry, Route};
use crate::error::Result;

use super::platform::ClusterPlatform;
use super::store::{ResourceStore, StoreObject};
use super::{defaults, drift, naming, resources};

/// Child resource kinds owned by a DevfileRegistry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Deployment,
    Service,
    Ingress,
    Route,
    ConfigMap,
    PersistentVolumeClaim,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Deployment => "Deployment",
            ChildKind::Service => "Service",
            ChildKind::Ingress => "Ingress",
            ChildKind::Route => "Route",
            ChildKind::ConfigMap => "ConfigMap",
            ChildKind::PersistentVolumeClaim => "PersistentVolumeClaim",
        }
    }

    /// Kinds to ensure for this registry, in reconcile order
    pub fn ordered_for(cr: &DevfileRegistry, platform: ClusterPlatform) -> Vec<ChildKind> {
        let mut kinds = vec![ChildKind::Deployment, ChildKind::Service];
        kinds.push(if platform.is_openshift() {
            ChildKind::Route
        } else {
            ChildKind::Ingress
        });
        kinds.push(ChildKind::ConfigMap);
        if defaults::is_storage_enabled(cr) {
            kinds.push(ChildKind::PersistentVolumeClaim);
        }
        kinds
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values resolved once per reconcile and shared by every child
#[derive(Clone, Debug)]
pub struct EnsureContext {
    pub platform: ClusterPlatform,
    pub ingress_host: String,
}

impl EnsureContext {
    pub fn new(cr: &DevfileRegistry, platform: ClusterPlatform) -> Self {
        Self {
            platform,
            ingress_host: naming::ingress_host(cr),
        }
    }
}

/// What a single ensure call did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Updated,
    Unchanged,
}

impl EnsureOutcome {
    pub fn converged(&self) -> bool {
        matches!(self, EnsureOutcome::Unchanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnsureOutcome::Created => "create",
            EnsureOutcome::Updated => "update",
            EnsureOutcome::Unchanged => "unchanged",
        }
    }
}

/// Generation, naming and drift detection for one child kind
pub trait ChildResource: StoreObject {
    const KIND: ChildKind;

    fn canonical_name(cr: &DevfileRegistry) -> String;

    /// Fully desired object, owner reference included
    fn generate(cr: &DevfileRegistry, ctx: &EnsureContext) -> Self;

    /// Patch drifted fields of `observed` in place; true when anything changed
    fn detect_drift(cr: &DevfileRegistry, ctx: &EnsureContext, observed: &mut Self) -> bool;
}

impl ChildResource for Deployment {
    const KIND: ChildKind = ChildKind::Deployment;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::deployment_name(cr)
    }

    fn generate(cr: &DevfileRegistry, _ctx: &EnsureContext) -> Self {
        resources::build_deployment(cr)
    }

    fn detect_drift(cr: &DevfileRegistry, _ctx: &EnsureContext, observed: &mut Self) -> bool {
        drift::deployment_drift(cr, observed)
    }
}

impl ChildResource for Service {
    const KIND: ChildKind = ChildKind::Service;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::service_name(cr)
    }

    fn generate(cr: &DevfileRegistry, _ctx: &EnsureContext) -> Self {
        resources::build_service(cr)
    }

    fn detect_drift(_cr: &DevfileRegistry, _ctx: &EnsureContext, _observed: &mut Self) -> bool {
        false
    }
}

impl ChildResource for Ingress {
    const KIND: ChildKind = ChildKind::Ingress;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::ingress_name(cr)
    }

    fn generate(cr: &DevfileRegistry, ctx: &EnsureContext) -> Self {
        resources::build_ingress(cr, &ctx.ingress_host)
    }

    fn detect_drift(cr: &DevfileRegistry, ctx: &EnsureContext, observed: &mut Self) -> bool {
        drift::ingress_drift(cr, &ctx.ingress_host, observed)
    }
}

impl ChildResource for Route {
    const KIND: ChildKind = ChildKind::Route;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::ingress_name(cr)
    }

    fn generate(cr: &DevfileRegistry, _ctx: &EnsureContext) -> Self {
        resources::build_route(cr)
    }

    fn detect_drift(cr: &DevfileRegistry, _ctx: &EnsureContext, observed: &mut Self) -> bool {
        drift::route_drift(cr, observed)
    }
}

impl ChildResource for ConfigMap {
    const KIND: ChildKind = ChildKind::ConfigMap;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::config_map_name(cr)
    }

    fn generate(cr: &DevfileRegistry, _ctx: &EnsureContext) -> Self {
        resources::build_config_map(cr)
    }

    fn detect_drift(cr: &DevfileRegistry, _ctx: &EnsureContext, observed: &mut Self) -> bool {
        drift::config_map_drift(cr, observed)
    }
}

impl ChildResource for PersistentVolumeClaim {
    const KIND: ChildKind = ChildKind::PersistentVolumeClaim;

    fn canonical_name(cr: &DevfileRegistry) -> String {
        naming::pvc_name(cr)
    }

    fn generate(cr: &DevfileRegistry, _ctx: &EnsureContext) -> Self {
        resources::build_pvc(cr)
    }

    fn detect_drift(_cr: &DevfileRegistry, _ctx: &EnsureContext, _observed: &mut Self) -> bool {
        false
    }
}

#[cfg(feature = "metrics")]
fn record_write(kind: ChildKind, outcome: EnsureOutcome) {
    if !outcome.converged() {
        super::metrics::inc_child_write(kind.as_str(), outcome.as_str());
    }
}

#[cfg(not(feature = "metrics"))]
fn record_write(_kind: ChildKind, _outcome: EnsureOutcome) {}

/// Create the child if absent, otherwise update it only when it drifted
///
/// A freshly created object is not drift checked in the same cycle.
#[instrument(
    skip(store, cr, ctx),
    fields(kind = %K::KIND, name = %cr.name_any(), namespace = cr.namespace())
)]
pub async fn ensure<K, S>(store: &S, cr: &DevfileRegistry, ctx: &EnsureContext) -> Result<EnsureOutcome>
where
    K: ChildResource,
    S: ResourceStore,
{
    let namespace = cr.namespace();
    let name = K::canonical_name(cr);

    let outcome = match store.get_opt::<K>(namespace.as_deref(), &name).await? {
        None => {
            info!("Creating {} {}", K::KIND, name);
            store.create(&K::generate(cr, ctx)).await?;
            EnsureOutcome::Created
        }
        Some(mut observed) => {
            if K::detect_drift(cr, ctx, &mut observed) {
                info!("Updating drifted {} {}", K::KIND, name);
                store.replace(&observed).await?;
                EnsureOutcome::Updated
            } else {
                debug!("{} {} is up to date", K::KIND, name);
                EnsureOutcome::Unchanged
            }
        }
    };

    record_write(K::KIND, outcome);
    Ok(outcome)
}

/// Dispatch [`ensure`] on a runtime kind
pub async fn ensure_kind<S>(
    store: &S,
    kind: ChildKind,
    cr: &DevfileRegistry,
    ctx: &EnsureContext,
) -> Result<EnsureOutcome>
where
    S: ResourceStore,
{
    match kind {
        ChildKind::Deployment => ensure::<Deployment, S>(store, cr, ctx).await,
        ChildKind::Service => ensure::<Service, S>(store, cr, ctx).await,
        ChildKind::Ingress => ensure::<Ingress, S>(store, cr, ctx).await,
        ChildKind::Route => ensure::<Route, S>(store, cr, ctx).await,
        ChildKind::ConfigMap => ensure::<ConfigMap, S>(store, cr, ctx).await,
        ChildKind::PersistentVolumeClaim => {
            ensure::<PersistentVolumeClaim, S>(store, cr, ctx).await
        }
    }
}

/// Delete the registry PVC left behind after storage was switched off
///
/// Returns true when a claim was removed.
#[instrument(skip(store, cr), fields(name = %cr.name_any(), namespace = cr.namespace()))]
pub async fn delete_stale_pvc<S>(store: &S, cr: &DevfileRegistry) -> Result<bool>
where
    S: ResourceStore,
{
    if defaults::is_storage_enabled(cr) {
        return Ok(false);
    }

    let namespace = cr.namespace();
    let name = naming::pvc_name(cr);
    let Some(claim) = store
        .get_opt::<PersistentVolumeClaim>(namespace.as_deref(), &name)
        .await?
    else {
        return Ok(false);
    };
    // pvc-protection holds the claim until the old pod is gone
    if claim.metadata.deletion_timestamp.is_some() {
        debug!("PersistentVolumeClaim {} is already terminating", name);
        return Ok(false);
    }

    info!("Storage disabled, deleting PersistentVolumeClaim {}", name);
    match store
        .delete::<PersistentVolumeClaim>(namespace.as_deref(), &name)
        .await
    {
        Ok(()) => {
            #[cfg(feature = "metrics")]
            super::metrics::inc_child_write(ChildKind::PersistentVolumeClaim.as_str(), "delete");
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
