//! Reconcile logic shared by DevfileRegistriesList and ClusterDevfileRegistriesList

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::config::OperatorConfig;
use crate::crd::RegistryList;
use crate::error::Result;

use super::reconciler::ReconcileAction;
use super::status::{set_initial_condition, set_validation_condition};
use super::store::{ResourceStore, StoreObject};
use super::validation::validate_entries;
use super::validator::EndpointValidator;

/// Validate every entry of one list and record the verdict on its status
///
/// `namespace` is `None` for the cluster scoped kind.
#[instrument(skip(store, validator, config), fields(kind = %L::kind(&())))]
pub async fn reconcile_list<L, S>(
    store: &S,
    validator: &dyn EndpointValidator,
    namespace: Option<&str>,
    name: &str,
    config: &OperatorConfig,
) -> Result<ReconcileAction>
where
    L: RegistryList + StoreObject,
    S: ResourceStore,
{
    let Some(list) = store.get_opt::<L>(namespace, name).await? else {
        debug!("{} {} is gone, nothing to do", L::kind(&()), name);
        return Ok(ReconcileAction::Done);
    };

    let list = match set_initial_condition(store, &list, &config.status_retry).await {
        Ok(list) => list,
        Err(e) if e.is_not_found() => return Ok(ReconcileAction::Done),
        Err(e) => return Err(e),
    };

    let report = validate_entries(validator, list.entries()).await;
    info!(
        "Validated {} entries of {} {}: {}",
        list.entries().len(),
        L::kind(&()),
        list.name_any(),
        report.message
    );

    #[cfg(feature = "metrics")]
    super::metrics::set_unreachable_registries(
        &L::kind(&()),
        namespace.unwrap_or_default(),
        name,
        report.unreachable.len(),
    );

    set_validation_condition(store, &list, &report, &config.status_retry).await?;

    Ok(ReconcileAction::RetryAfter(config.requeue_interval))
}
