//! Status condition writes for registries lists
//!
//! Writes go through [`retry_on_conflict`]: the first attempt uses the object the
//! reconcile already holds and later attempts re-read it. A write is skipped when
//! applying the conditions leaves them unchanged.

use kube::ResourceExt;
use tracing::{debug, instrument};

use crate::crd::{Condition, RegistryList};
use crate::error::Result;

use super::conditions::{
    available_condition, reconciling_condition, set_condition, validation_condition,
};
use super::retry::{retry_on_conflict, RetryConfig};
use super::store::{ResourceStore, StoreObject};
use super::validation::ValidationReport;

/// Re-read when needed, apply `conditions`, and write status if anything changed
async fn write_conditions<L, S>(
    store: &S,
    list: &L,
    retry: &RetryConfig,
    operation_name: &str,
    conditions: impl Fn(Option<i64>) -> Vec<Condition>,
) -> Result<L>
where
    L: RegistryList + StoreObject,
    S: ResourceStore,
{
    let namespace = list.namespace();
    let name = list.name_any();
    let conditions = &conditions;

    retry_on_conflict(retry, operation_name, |attempt| {
        let namespace = namespace.clone();
        let name = name.clone();
        let held = (attempt == 1).then(|| list.clone());
        async move {
            let mut current = match held {
                Some(obj) => obj,
                None => store.get::<L>(namespace.as_deref(), &name).await?,
            };

            let before = current.conditions().to_vec();
            for condition in conditions(current.meta().generation) {
                set_condition(current.conditions_mut(), condition);
            }
            if current.conditions() == before.as_slice() {
                debug!("Conditions of {} unchanged, skipping status write", name);
                return Ok(current);
            }

            store.replace_status(&current).await
        }
    })
    .await
}

/// Record the validation verdict on ValidateDevfileRegistries and mirror it on Available
#[instrument(skip(store, list, report, retry), fields(name = %list.name_any(), namespace = list.namespace()))]
pub async fn set_validation_condition<L, S>(
    store: &S,
    list: &L,
    report: &ValidationReport,
    retry: &RetryConfig,
) -> Result<L>
where
    L: RegistryList + StoreObject,
    S: ResourceStore,
{
    let ready = report.is_ready();
    let message = report.condition_message();

    write_conditions(store, list, retry, "set_validation_condition", |generation| {
        vec![
            validation_condition(ready, &message, generation),
            available_condition(ready, &message, generation),
        ]
    })
    .await
}

/// Write Available=Unknown on a list that has no conditions yet, then re-fetch it
///
/// Lists that already carry conditions are returned untouched.
#[instrument(skip(store, list, retry), fields(name = %list.name_any(), namespace = list.namespace()))]
pub async fn set_initial_condition<L, S>(store: &S, list: &L, retry: &RetryConfig) -> Result<L>
where
    L: RegistryList + StoreObject,
    S: ResourceStore,
{
    if !list.conditions().is_empty() {
        return Ok(list.clone());
    }

    write_conditions(store, list, retry, "set_initial_condition", |generation| {
        vec![reconciling_condition(generation)]
    })
    .await?;

    store
        .get::<L>(list.namespace().as_deref(), &list.name_any())
        .await
}
