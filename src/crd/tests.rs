//! Unit tests for CRD serialization and schema generation

#[cfg(test)]
mod devfile_registry_spec {
    use crate::crd::{DevfileRegistry, DevfileRegistrySpec};
    use kube::CustomResourceExt;

    #[test]
    fn test_empty_spec_deserializes_with_defaults() {
        let spec: DevfileRegistrySpec = serde_json::from_str("{}").unwrap();

        assert!(spec.devfile_index.image.is_none());
        assert!(spec.storage.enabled.is_none());
        assert!(spec.tls.enabled.is_none());
        assert!(spec.headless.is_none());
    }

    #[test]
    fn test_nested_component_fields_use_camel_case() {
        let spec: DevfileRegistrySpec = serde_json::from_value(serde_json::json!({
            "devfileIndex": {
                "image": "quay.io/devfile/devfile-index:next",
                "imagePullPolicy": "IfNotPresent",
                "memoryLimit": "512Mi"
            },
            "storage": {"enabled": true, "registryVolumeSize": "5Gi"},
            "tls": {"enabled": false, "secretName": "registry-tls"},
            "k8s": {"ingressDomain": "apps.example.com"},
            "telemetry": {"registryName": "test", "key": "abc"},
            "headless": true
        }))
        .unwrap();

        assert_eq!(
            spec.devfile_index.image_pull_policy.as_deref(),
            Some("IfNotPresent")
        );
        assert_eq!(spec.devfile_index.memory_limit.as_deref(), Some("512Mi"));
        assert_eq!(spec.storage.registry_volume_size.as_deref(), Some("5Gi"));
        assert_eq!(spec.tls.secret_name.as_deref(), Some("registry-tls"));
        assert_eq!(spec.k8s.ingress_domain.as_deref(), Some("apps.example.com"));
        assert_eq!(spec.telemetry.key.as_deref(), Some("abc"));
        assert_eq!(spec.headless, Some(true));
    }

    #[test]
    fn test_crd_metadata() {
        let crd = DevfileRegistry::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("devfileregistries.registry.devfile.io")
        );
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["devreg".to_string()])
        );
    }
}

#[cfg(test)]
mod registries_list_spec {
    use crate::crd::{
        ClusterDevfileRegistriesList, DevfileRegistriesList, DevfileRegistriesListSpec,
        RegistryEntry, RegistryList,
    };
    use kube::CustomResourceExt;

    #[test]
    fn test_skip_tls_verify_wire_name() {
        let entry: RegistryEntry = serde_json::from_value(serde_json::json!({
            "name": "staging",
            "url": "https://registry.stage.devfile.io",
            "skipTLSVerify": true
        }))
        .unwrap();

        assert!(entry.skip_tls_verify);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["skipTLSVerify"], serde_json::json!(true));
    }

    #[test]
    fn test_skip_tls_verify_defaults_to_false() {
        let entry: RegistryEntry = serde_json::from_value(serde_json::json!({
            "name": "community",
            "url": "https://registry.devfile.io"
        }))
        .unwrap();

        assert!(!entry.skip_tls_verify);
    }

    #[test]
    fn test_conditions_mut_initializes_status() {
        let mut list = DevfileRegistriesList::new(
            "list",
            DevfileRegistriesListSpec {
                devfile_registries: vec![RegistryEntry::new("a", "https://a.example.com")],
            },
        );

        assert!(list.conditions().is_empty());
        list.conditions_mut()
            .push(crate::crd::Condition::new("Available", "Unknown", "Reconciling", "x"));

        assert_eq!(list.conditions().len(), 1);
        assert_eq!(list.entries().len(), 1);
    }

    #[test]
    fn test_list_scopes() {
        assert_eq!(DevfileRegistriesList::crd().spec.scope, "Namespaced");
        assert_eq!(ClusterDevfileRegistriesList::crd().spec.scope, "Cluster");
    }
}
