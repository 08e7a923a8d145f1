//! DevfileRegistriesList and ClusterDevfileRegistriesList CRDs
//!
//! Both kinds hold the same ordered list of registry entries; one is scoped to a
//! namespace and the other to the whole cluster. The [`RegistryList`] trait lets
//! the reconcile, validation and status code treat them the same way.

use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, RegistriesListStatus, RegistryEntry};

/// Registries available to tooling in one namespace
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "registry.devfile.io",
    version = "v1alpha1",
    kind = "DevfileRegistriesList",
    namespaced,
    status = "RegistriesListStatus",
    shortname = "dtrl",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.conditions[?(@.type=='ValidateDevfileRegistries')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DevfileRegistriesListSpec {
    #[serde(default)]
    pub devfile_registries: Vec<RegistryEntry>,
}

/// Registries available to tooling across the cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "registry.devfile.io",
    version = "v1alpha1",
    kind = "ClusterDevfileRegistriesList",
    status = "RegistriesListStatus",
    shortname = "cdrl",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.conditions[?(@.type=='ValidateDevfileRegistries')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDevfileRegistriesListSpec {
    #[serde(default)]
    pub devfile_registries: Vec<RegistryEntry>,
}

/// Common view over the namespaced and cluster scoped registries lists
pub trait RegistryList: Resource<DynamicType = ()> {
    /// Admission message used when a second instance would exist at this scope
    const SINGLETON_MESSAGE: &'static str;

    fn entries(&self) -> &[RegistryEntry];

    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

impl RegistryList for DevfileRegistriesList {
    const SINGLETON_MESSAGE: &'static str =
        "A DevfileRegistriesList instance already exists. Only one instance can exist on a namespace";

    fn entries(&self) -> &[RegistryEntry] {
        &self.spec.devfile_registries
    }

    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}

impl RegistryList for ClusterDevfileRegistriesList {
    const SINGLETON_MESSAGE: &'static str =
        "A ClusterDevfileRegistriesList instance already exists. Only one instance can exist in a cluster";

    fn entries(&self) -> &[RegistryEntry] {
        &self.spec.devfile_registries
    }

    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}
