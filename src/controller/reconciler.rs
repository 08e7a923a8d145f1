//! Controller wiring for DevfileRegistry and the registries lists
//!
//! Implements the controller pattern using kube-rs runtime. The reconcile logic
//! lives in [`super::devfile_registry`] and [`super::registries_list`] and only
//! sees a [`ResourceStore`](super::store::ResourceStore); this module adapts it
//! to `kube::runtime::Controller`.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{OperatorConfig, RETRY_NOW_DELAY};
use crate::crd::{ClusterDevfileRegistriesList, DevfileRegistriesList, DevfileRegistry, Route};
use crate::error::{Error, Result};

use super::devfile_registry::reconcile_registry;
use super::platform::ClusterPlatform;
use super::registries_list::reconcile_list;
use super::store::KubeStore;
use super::validator::{EndpointValidator, HttpIndexValidator};

const REGISTRY_CONTROLLER: &str = "devfileregistry";
const LIST_CONTROLLER: &str = "devfileregistrieslist";
const CLUSTER_LIST_CONTROLLER: &str = "clusterdevfileregistrieslist";

/// Requeue delay for errors that are not expected to clear on their own
const NON_RETRIABLE_ERROR_DELAY: Duration = Duration::from_secs(60);

/// What the reconcile loop should do next with an object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Wait for the next watch event
    Done,
    /// Reconcile again right away
    RetryNow,
    /// Re-check after the given interval
    RetryAfter(Duration),
}

impl ReconcileAction {
    pub fn into_action(self) -> Action {
        match self {
            ReconcileAction::Done => Action::await_change(),
            ReconcileAction::RetryNow => Action::requeue(RETRY_NOW_DELAY),
            ReconcileAction::RetryAfter(interval) => Action::requeue(interval),
        }
    }
}

/// Shared state for the controllers
pub struct ControllerState {
    pub client: Client,
    pub store: KubeStore,
    pub config: OperatorConfig,
    pub platform: ClusterPlatform,
    pub validator: Arc<dyn EndpointValidator>,
    pub is_leader: Arc<AtomicBool>,
    /// Set once the controllers are watching
    pub ready: AtomicBool,
}

impl ControllerState {
    pub fn new(
        client: Client,
        config: OperatorConfig,
        platform: ClusterPlatform,
        is_leader: Arc<AtomicBool>,
    ) -> Result<Self> {
        let validator = Arc::new(HttpIndexValidator::new(config.http_timeout)?);
        Ok(Self {
            store: KubeStore::new(client.clone()),
            client,
            config,
            platform,
            validator,
            is_leader,
            ready: AtomicBool::new(false),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// Fail early with a readable message when a CRD is not installed
async fn check_crd<K>(api: &Api<K>) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => {
            info!("{} CRD is available", K::kind(&()));
            Ok(())
        }
        Err(e) => {
            error!(
                "{} CRD not found. Please install the CRDs first: {:?}",
                K::kind(&()),
                e
            );
            Err(Error::ConfigError(format!(
                "{} CRD not installed",
                K::kind(&())
            )))
        }
    }
}

/// Main entry point to start the controllers
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let registries: Api<DevfileRegistry> = Api::all(client.clone());
    let lists: Api<DevfileRegistriesList> = Api::all(client.clone());
    let cluster_lists: Api<ClusterDevfileRegistriesList> = Api::all(client.clone());

    info!(
        "Starting devfile registry controllers (platform: {:?})",
        state.platform
    );

    check_crd(&registries).await?;
    check_crd(&lists).await?;
    check_crd(&cluster_lists).await?;

    let registry_controller = Controller::new(registries, Config::default())
        // Watch owned resources for changes
        .owns::<Deployment>(Api::all(client.clone()), Config::default())
        .owns::<Service>(Api::all(client.clone()), Config::default())
        .owns::<ConfigMap>(Api::all(client.clone()), Config::default())
        .owns::<PersistentVolumeClaim>(Api::all(client.clone()), Config::default());
    let registry_controller = if state.platform.is_openshift() {
        registry_controller.owns::<Route>(Api::all(client.clone()), Config::default())
    } else {
        registry_controller.owns::<Ingress>(Api::all(client.clone()), Config::default())
    };

    let registry_loop = registry_controller
        .shutdown_on_signal()
        .run(
            reconcile_devfile_registry,
            error_policy::<DevfileRegistry>,
            state.clone(),
        )
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled DevfileRegistry: {:?}", obj),
                Err(e) => warn!("DevfileRegistry reconcile error: {:?}", e),
            }
        });

    let list_loop = Controller::new(lists, Config::default())
        .shutdown_on_signal()
        .run(
            reconcile_registries_list,
            error_policy::<DevfileRegistriesList>,
            state.clone(),
        )
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled DevfileRegistriesList: {:?}", obj),
                Err(e) => warn!("DevfileRegistriesList reconcile error: {:?}", e),
            }
        });

    let cluster_list_loop = Controller::new(cluster_lists, Config::default())
        .shutdown_on_signal()
        .run(
            reconcile_cluster_registries_list,
            error_policy::<ClusterDevfileRegistriesList>,
            state.clone(),
        )
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled ClusterDevfileRegistriesList: {:?}", obj),
                Err(e) => warn!("ClusterDevfileRegistriesList reconcile error: {:?}", e),
            }
        });

    state.ready.store(true, Ordering::Relaxed);
    tokio::join!(registry_loop, list_loop, cluster_list_loop);
    state.ready.store(false, Ordering::Relaxed);

    info!("Controllers shut down");
    Ok(())
}

/// Record duration and translate the outcome for the controller runtime
fn finish(controller: &str, started: Instant, result: Result<ReconcileAction>) -> Result<Action> {
    #[cfg(feature = "metrics")]
    super::metrics::observe_reconcile_duration_seconds(
        controller,
        started.elapsed().as_secs_f64(),
    );
    #[cfg(not(feature = "metrics"))]
    let _ = (controller, started);

    match result {
        Ok(action) => Ok(action.into_action()),
        // The object vanished mid-reconcile; ownership cleans up the rest
        Err(e) if e.is_not_found() => Ok(Action::await_change()),
        Err(e) => Err(e),
    }
}

/// Reconcile a DevfileRegistry
///
/// This function is called whenever:
/// - A DevfileRegistry is created, updated, or deleted
/// - An owned resource (Deployment, Service, Ingress/Route, ConfigMap, PVC) changes
/// - The requeue timer expires
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile_devfile_registry(
    obj: Arc<DevfileRegistry>,
    ctx: Arc<ControllerState>,
) -> Result<Action> {
    let started = Instant::now();
    let namespace = obj.namespace().unwrap_or_default();
    let result = reconcile_registry(
        &ctx.store,
        &namespace,
        &obj.name_any(),
        ctx.platform,
        &ctx.config,
    )
    .await;
    finish(REGISTRY_CONTROLLER, started, result)
}

#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile_registries_list(
    obj: Arc<DevfileRegistriesList>,
    ctx: Arc<ControllerState>,
) -> Result<Action> {
    let started = Instant::now();
    let namespace = obj.namespace();
    let result = reconcile_list::<DevfileRegistriesList, _>(
        &ctx.store,
        ctx.validator.as_ref(),
        namespace.as_deref(),
        &obj.name_any(),
        &ctx.config,
    )
    .await;
    finish(LIST_CONTROLLER, started, result)
}

#[instrument(skip(ctx), fields(name = %obj.name_any()))]
async fn reconcile_cluster_registries_list(
    obj: Arc<ClusterDevfileRegistriesList>,
    ctx: Arc<ControllerState>,
) -> Result<Action> {
    let started = Instant::now();
    let result = reconcile_list::<ClusterDevfileRegistriesList, _>(
        &ctx.store,
        ctx.validator.as_ref(),
        None,
        &obj.name_any(),
        &ctx.config,
    )
    .await;
    finish(CLUSTER_LIST_CONTROLLER, started, result)
}

/// Error policy shared by all three controllers
///
/// Store failures and conflicts are retried almost immediately; anything else
/// waits a minute.
fn error_policy<K>(obj: Arc<K>, error: &Error, _ctx: Arc<ControllerState>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    error!(
        "Reconciliation error for {} {}: {:?}",
        K::kind(&()),
        obj.name_any(),
        error
    );

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(&K::kind(&()).to_lowercase(), error.metric_label());

    if error.is_retriable() {
        Action::requeue(RETRY_NOW_DELAY)
    } else {
        Action::requeue(NON_RETRIABLE_ERROR_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_action_mapping() {
        assert_eq!(ReconcileAction::Done.into_action(), Action::await_change());
        assert_eq!(
            ReconcileAction::RetryNow.into_action(),
            Action::requeue(RETRY_NOW_DELAY)
        );
        assert_eq!(
            ReconcileAction::RetryAfter(Duration::from_secs(3600)).into_action(),
            Action::requeue(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_finish_maps_not_found_to_await_change() {
        let result = finish(
            REGISTRY_CONTROLLER,
            Instant::now(),
            Err(Error::NotFound {
                kind: "DevfileRegistry".to_string(),
                name: "gone".to_string(),
            }),
        );
        assert_eq!(result.unwrap(), Action::await_change());
    }

    #[test]
    fn test_finish_surfaces_store_failures() {
        let result = finish(
            LIST_CONTROLLER,
            Instant::now(),
            Err(Error::Conflict {
                kind: "DevfileRegistriesList".to_string(),
                name: "list".to_string(),
            }),
        );
        assert!(result.unwrap_err().is_retriable());
    }
}
