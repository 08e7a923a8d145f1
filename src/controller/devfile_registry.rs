//! Reconcile logic for DevfileRegistry
//!
//! Ensures every child resource in a fixed order, removes a stale storage claim
//! and publishes the externally reachable URL in the status.

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::config::OperatorConfig;
use crate::crd::{DevfileRegistry, Route};
use crate::error::Result;

use super::ensure::{delete_stale_pvc, ensure_kind, ChildKind, EnsureContext, EnsureOutcome};
use super::naming;
use super::platform::ClusterPlatform;
use super::reconciler::ReconcileAction;
use super::resources;
use super::retry::retry_on_conflict;
use super::store::ResourceStore;

/// Host the registry is reachable on
///
/// On OpenShift the host admitted by the router wins; until the Route is
/// admitted the computed ingress host is used.
async fn resolve_host<S: ResourceStore>(
    store: &S,
    cr: &DevfileRegistry,
    ctx: &EnsureContext,
) -> Result<String> {
    if !ctx.platform.is_openshift() {
        return Ok(ctx.ingress_host.clone());
    }

    let route = store
        .get_opt::<Route>(cr.namespace().as_deref(), &naming::ingress_name(cr))
        .await?;
    Ok(route
        .and_then(|r| r.admitted_host())
        .unwrap_or_else(|| ctx.ingress_host.clone()))
}

/// Write `status.url` when it differs from `url`; true when a write happened
async fn update_status_url<S: ResourceStore>(
    store: &S,
    cr: &DevfileRegistry,
    url: &str,
    config: &OperatorConfig,
) -> Result<bool> {
    let current = cr.status.as_ref().map(|s| s.url.as_str()).unwrap_or_default();
    if current == url {
        return Ok(false);
    }

    let namespace = cr.namespace();
    let name = cr.name_any();
    retry_on_conflict(&config.status_retry, "update_status_url", |attempt| {
        let namespace = namespace.clone();
        let name = name.clone();
        let held = (attempt == 1).then(|| cr.clone());
        async move {
            let mut latest = match held {
                Some(obj) => obj,
                None => {
                    store
                        .get::<DevfileRegistry>(namespace.as_deref(), &name)
                        .await?
                }
            };
            latest.status.get_or_insert_with(Default::default).url = url.to_string();
            store.replace_status(&latest).await
        }
    })
    .await?;

    info!("Published registry URL {}", url);
    Ok(true)
}

/// Converge one DevfileRegistry
///
/// Returns [`ReconcileAction::RetryNow`] when anything was written so that
/// values derived from the new state (the status URL feeds the viewer env) are
/// re-checked right away.
#[instrument(skip(store, config), fields(platform = ?platform))]
pub async fn reconcile_registry<S: ResourceStore>(
    store: &S,
    namespace: &str,
    name: &str,
    platform: ClusterPlatform,
    config: &OperatorConfig,
) -> Result<ReconcileAction> {
    let Some(cr) = store.get_opt::<DevfileRegistry>(Some(namespace), name).await? else {
        debug!("DevfileRegistry {}/{} is gone, nothing to do", namespace, name);
        return Ok(ReconcileAction::Done);
    };

    let ctx = EnsureContext::new(&cr, platform);
    let mut wrote = false;

    for kind in ChildKind::ordered_for(&cr, platform) {
        let outcome = ensure_kind(store, kind, &cr, &ctx).await?;
        wrote |= outcome != EnsureOutcome::Unchanged;
    }

    wrote |= delete_stale_pvc(store, &cr).await?;

    let host = resolve_host(store, &cr, &ctx).await?;
    wrote |= update_status_url(store, &cr, &resources::registry_url(&cr, &host), config).await?;

    if wrote {
        Ok(ReconcileAction::RetryNow)
    } else {
        Ok(ReconcileAction::RetryAfter(config.requeue_interval))
    }
}
