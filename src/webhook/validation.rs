//! Admission rules for the operator's custom resources
//!
//! Every rule runs and every failure is collected, so a rejected request lists
//! all of its problems at once. DELETE is always admitted.

use std::collections::HashSet;

use futures::future::join_all;
use kube::core::admission::Operation;
use kube::ResourceExt;
use tracing::{debug, instrument};

use crate::controller::validator::{invalid_registry_message, EndpointValidator};
use crate::controller::{defaults, ResourceStore, StoreObject};
use crate::crd::{DevfileRegistry, RegistryEntry, RegistryList};

/// Namespace a DevfileRegistry may never be deployed to
pub const FORBIDDEN_NAMESPACE: &str = "default";

pub const FORBIDDEN_NAMESPACE_MESSAGE: &str =
    "devfile registry deployment namespace should never be 'default'.";

pub fn duplicate_name_message(name: &str) -> String {
    format!("Duplicate registry name {name} in registries list.  Ensure name is unique")
}

pub fn duplicate_url_message(url: &str) -> String {
    format!("Duplicate registry URL {url} in registries list.  Ensure URL is unique")
}

/// Collected admission failures; empty means admitted
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Verdict {
    pub errors: Vec<String>,
}

impl Verdict {
    pub fn allowed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// All failures joined into one denial message
    pub fn message(&self) -> Option<String> {
        (!self.allowed()).then(|| self.errors.join("\n"))
    }
}

fn namespace_errors(namespace: Option<&str>) -> Option<String> {
    (namespace == Some(FORBIDDEN_NAMESPACE)).then(|| FORBIDDEN_NAMESPACE_MESSAGE.to_string())
}

/// Duplicate and reachability checks for every entry, in entry order
///
/// Probes run concurrently. An entry that duplicates an earlier one is still
/// probed, matching what a user would see after fixing the duplicate.
pub async fn entry_errors(validator: &dyn EndpointValidator, entries: &[RegistryEntry]) -> Vec<String> {
    let probes = entries
        .iter()
        .map(|entry| validator.validate(&entry.url, entry.skip_tls_verify));
    let results = join_all(probes).await;

    let mut seen_names = HashSet::new();
    let mut seen_urls = HashSet::new();
    let mut errors = Vec::new();

    for (entry, result) in entries.iter().zip(results) {
        if !seen_names.insert(entry.name.as_str()) {
            errors.push(duplicate_name_message(&entry.name));
        }
        if !seen_urls.insert(entry.url.as_str()) {
            errors.push(duplicate_url_message(&entry.url));
        }
        if let Err(e) = result {
            debug!("Registry {} rejected: {}", entry.url, e);
            errors.push(invalid_registry_message(&entry.url));
        }
    }

    errors
}

/// Rules for DevfileRegistry
///
/// CREATE and UPDATE reject the `default` namespace. UPDATE also re-probes the
/// published URL so a registry that went stale is noticed on the next edit.
#[instrument(skip(validator, registry), fields(name = %registry.name_any()))]
pub async fn review_registry(
    validator: &dyn EndpointValidator,
    operation: &Operation,
    registry: &DevfileRegistry,
) -> Verdict {
    let mut verdict = Verdict::default();
    if matches!(operation, Operation::Delete | Operation::Connect) {
        return verdict;
    }

    if let Some(error) = namespace_errors(registry.namespace().as_deref()) {
        verdict.reject(error);
    }

    if matches!(operation, Operation::Update) {
        let url = registry
            .status
            .as_ref()
            .map(|s| s.url.as_str())
            .unwrap_or_default();
        if !url.is_empty() {
            let skip_tls_verify = defaults::is_tls_enabled(registry);
            if validator.validate(url, skip_tls_verify).await.is_err() {
                verdict.reject(invalid_registry_message(url));
            }
        }
    }

    verdict
}

/// Rules shared by DevfileRegistriesList and ClusterDevfileRegistriesList
///
/// CREATE is refused when another instance already exists at the same scope.
/// CREATE and UPDATE validate every entry.
#[instrument(skip(store, validator, list), fields(name = %list.name_any(), namespace = list.namespace()))]
pub async fn review_list<L, S>(
    store: &S,
    validator: &dyn EndpointValidator,
    operation: &Operation,
    list: &L,
) -> Verdict
where
    L: RegistryList + StoreObject,
    S: ResourceStore,
{
    let mut verdict = Verdict::default();
    if matches!(operation, Operation::Delete | Operation::Connect) {
        return verdict;
    }

    if matches!(operation, Operation::Create) {
        match store.list::<L>(list.namespace().as_deref()).await {
            Ok(existing) if existing.iter().any(|l| l.name_any() != list.name_any()) => {
                verdict.reject(L::SINGLETON_MESSAGE);
            }
            Ok(_) => {}
            Err(e) => verdict.reject(format!(
                "Error listing {} custom resources: {}",
                L::kind(&()),
                e
            )),
        }
    }

    for error in entry_errors(validator, list.entries()).await {
        verdict.reject(error);
    }

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock_store::MockStore;
    use crate::crd::{
        ClusterDevfileRegistriesList, ClusterDevfileRegistriesListSpec, DevfileRegistriesList,
        DevfileRegistriesListSpec, DevfileRegistrySpec, DevfileRegistryStatus,
    };
    use crate::error::{Error, Result};
    use async_trait::async_trait;

    const GOOD: &str = "https://registry.devfile.io";
    const BAD: &str = "https://not-a-registry.example.com";

    /// Accepts every URL except [`BAD`]
    struct StaticValidator;

    #[async_trait]
    impl EndpointValidator for StaticValidator {
        async fn validate(&self, url: &str, _skip_tls_verify: bool) -> Result<()> {
            if url == BAD {
                Err(Error::InvalidRegistry(url.to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn namespaced_list(name: &str, entries: Vec<RegistryEntry>) -> DevfileRegistriesList {
        let mut list = DevfileRegistriesList::new(
            name,
            DevfileRegistriesListSpec {
                devfile_registries: entries,
            },
        );
        list.metadata.namespace = Some("tooling".to_string());
        list
    }

    fn registry_in(namespace: &str) -> DevfileRegistry {
        let mut registry = DevfileRegistry::new("registry", DevfileRegistrySpec::default());
        registry.metadata.namespace = Some(namespace.to_string());
        registry
    }

    #[tokio::test]
    async fn test_valid_list_is_admitted() {
        let store = MockStore::new();
        let list = namespaced_list("list", vec![RegistryEntry::new("community", GOOD)]);
        let verdict = review_list(&store, &StaticValidator, &Operation::Create, &list).await;
        assert!(verdict.allowed());
        assert_eq!(verdict.message(), None);
    }

    #[tokio::test]
    async fn test_second_list_in_namespace_is_rejected() {
        let store = MockStore::new();
        store.insert(namespaced_list("first", vec![]));

        let second = namespaced_list("second", vec![]);
        let verdict = review_list(&store, &StaticValidator, &Operation::Create, &second).await;
        assert_eq!(
            verdict.errors,
            vec![<DevfileRegistriesList as RegistryList>::SINGLETON_MESSAGE.to_string()]
        );

        // Updating the existing instance is fine
        let verdict = review_list(&store, &StaticValidator, &Operation::Update, &second).await;
        assert!(verdict.allowed());
    }

    #[tokio::test]
    async fn test_list_in_other_namespace_does_not_count() {
        let store = MockStore::new();
        let mut elsewhere = namespaced_list("first", vec![]);
        elsewhere.metadata.namespace = Some("other".to_string());
        store.insert(elsewhere);

        let list = namespaced_list("second", vec![]);
        let verdict = review_list(&store, &StaticValidator, &Operation::Create, &list).await;
        assert!(verdict.allowed());
    }

    #[tokio::test]
    async fn test_second_cluster_list_is_rejected() {
        let store = MockStore::new();
        store.insert(ClusterDevfileRegistriesList::new(
            "first",
            ClusterDevfileRegistriesListSpec::default(),
        ));

        let second =
            ClusterDevfileRegistriesList::new("second", ClusterDevfileRegistriesListSpec::default());
        let verdict = review_list(&store, &StaticValidator, &Operation::Create, &second).await;
        assert_eq!(
            verdict.message().as_deref(),
            Some(<ClusterDevfileRegistriesList as RegistryList>::SINGLETON_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_all_entry_errors_are_collected() {
        let store = MockStore::new();
        let list = namespaced_list(
            "list",
            vec![
                RegistryEntry::new("community", GOOD),
                RegistryEntry::new("community", GOOD),
                RegistryEntry::new("broken", BAD),
            ],
        );

        let verdict = review_list(&store, &StaticValidator, &Operation::Update, &list).await;
        assert_eq!(
            verdict.errors,
            vec![
                duplicate_name_message("community"),
                duplicate_url_message(GOOD),
                invalid_registry_message(BAD),
            ]
        );
        assert_eq!(verdict.message().unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn test_delete_is_always_admitted() {
        let store = MockStore::new();
        store.insert(namespaced_list("first", vec![]));
        let list = namespaced_list("second", vec![RegistryEntry::new("broken", BAD)]);
        assert!(review_list(&store, &StaticValidator, &Operation::Delete, &list)
            .await
            .allowed());
        assert!(
            review_registry(&StaticValidator, &Operation::Delete, &registry_in("default"))
                .await
                .allowed()
        );
    }

    #[tokio::test]
    async fn test_registry_in_default_namespace_is_rejected() {
        let verdict =
            review_registry(&StaticValidator, &Operation::Create, &registry_in("default")).await;
        assert_eq!(verdict.errors, vec![FORBIDDEN_NAMESPACE_MESSAGE.to_string()]);

        let verdict =
            review_registry(&StaticValidator, &Operation::Create, &registry_in("registry")).await;
        assert!(verdict.allowed());
    }

    #[tokio::test]
    async fn test_registry_update_reprobes_published_url() {
        let mut registry = registry_in("default");
        registry.status = Some(DevfileRegistryStatus {
            url: BAD.to_string(),
            conditions: vec![],
        });

        let verdict = review_registry(&StaticValidator, &Operation::Update, &registry).await;
        assert_eq!(
            verdict.errors,
            vec![
                FORBIDDEN_NAMESPACE_MESSAGE.to_string(),
                invalid_registry_message(BAD)
            ]
        );

        // Nothing published yet, nothing to probe
        let verdict =
            review_registry(&StaticValidator, &Operation::Update, &registry_in("registry")).await;
        assert!(verdict.allowed());
    }
}
