//! Unit tests for the DevfileRegistry child resource builders.
//!
//! Run with: `cargo test resources_test`

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Container;

    use crate::controller::defaults;
    use crate::controller::naming;
    use crate::controller::resources::*;
    use crate::crd::{
        ComponentSpec, DevfileRegistry, DevfileRegistrySpec, DevfileRegistryStatus, K8sSpec,
        StorageSpec, TelemetrySpec, TlsSpec,
    };

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn registry(spec: DevfileRegistrySpec) -> DevfileRegistry {
        let mut cr = DevfileRegistry::new("my-registry", spec);
        cr.metadata.namespace = Some("registry-ns".to_string());
        cr.metadata.uid = Some("1234-abcd".to_string());
        cr
    }

    fn containers(cr: &DevfileRegistry) -> Vec<Container> {
        build_deployment(cr)
            .spec
            .and_then(|s| s.template.spec)
            .map(|p| p.containers)
            .unwrap_or_default()
    }

    fn env_value(container: &Container, name: &str) -> Option<String> {
        container
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.clone())
    }

    // -----------------------------------------------------------------------
    // Deployment
    // -----------------------------------------------------------------------

    #[test]
    fn test_deployment_has_three_containers_by_default() {
        let cr = registry(DevfileRegistrySpec::default());
        let names: Vec<String> = containers(&cr).into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                DEVFILE_INDEX_CONTAINER,
                OCI_REGISTRY_CONTAINER,
                REGISTRY_VIEWER_CONTAINER
            ]
        );
    }

    #[test]
    fn test_headless_deployment_drops_viewer() {
        let cr = registry(DevfileRegistrySpec {
            headless: Some(true),
            ..Default::default()
        });
        let containers = containers(&cr);
        assert_eq!(containers.len(), 2);
        assert_eq!(
            env_value(&containers[0], ENV_REGISTRY_HEADLESS).as_deref(),
            Some("true")
        );

        let volumes = build_deployment(&cr)
            .spec
            .and_then(|s| s.template.spec)
            .and_then(|p| p.volumes)
            .unwrap_or_default();
        assert!(volumes.iter().all(|v| v.name != VIEWER_ENV_VOLUME_NAME));
    }

    #[test]
    fn test_deployment_uses_image_overrides() {
        let cr = registry(DevfileRegistrySpec {
            devfile_index: ComponentSpec {
                image: Some("quay.io/example/index:1.0".to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                memory_limit: None,
            },
            oci_registry_image: Some("quay.io/example/oci:legacy".to_string()),
            ..Default::default()
        });
        let containers = containers(&cr);
        assert_eq!(
            containers[0].image.as_deref(),
            Some("quay.io/example/index:1.0")
        );
        assert_eq!(containers[0].image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(
            containers[1].image.as_deref(),
            Some("quay.io/example/oci:legacy")
        );
        assert_eq!(
            containers[2].image.as_deref(),
            Some(defaults::DEFAULT_REGISTRY_VIEWER_IMAGE)
        );
    }

    #[test]
    fn test_storage_volume_source_follows_toggle() {
        let ephemeral = registry(DevfileRegistrySpec::default());
        let volume = &build_deployment(&ephemeral)
            .spec
            .and_then(|s| s.template.spec)
            .and_then(|p| p.volumes)
            .unwrap_or_default()[0];
        assert_eq!(volume.name, defaults::REGISTRY_VOLUME_NAME);
        assert!(volume.empty_dir.is_some());
        assert!(volume.persistent_volume_claim.is_none());

        let persistent = registry(DevfileRegistrySpec {
            storage: StorageSpec {
                enabled: Some(true),
                registry_volume_size: None,
            },
            ..Default::default()
        });
        let volume = &build_deployment(&persistent)
            .spec
            .and_then(|s| s.template.spec)
            .and_then(|p| p.volumes)
            .unwrap_or_default()[0];
        assert_eq!(
            volume
                .persistent_volume_claim
                .as_ref()
                .map(|c| c.claim_name.clone()),
            Some(naming::pvc_name(&persistent))
        );
    }

    #[test]
    fn test_telemetry_env() {
        let cr = registry(DevfileRegistrySpec {
            telemetry: TelemetrySpec {
                registry_name: Some("my-reg".to_string()),
                key: Some("secret-key".to_string()),
                registry_viewer_write_key: Some("write-key".to_string()),
            },
            ..Default::default()
        });
        let containers = containers(&cr);
        assert_eq!(
            env_value(&containers[0], ENV_REGISTRY_NAME).as_deref(),
            Some("my-reg")
        );
        assert_eq!(
            env_value(&containers[0], ENV_TELEMETRY_KEY).as_deref(),
            Some("secret-key")
        );
        assert_eq!(
            env_value(&containers[2], ENV_ANALYTICS_WRITE_KEY).as_deref(),
            Some("write-key")
        );
    }

    #[test]
    fn test_devfile_registries_value_uses_status_url() {
        let mut cr = registry(DevfileRegistrySpec::default());
        cr.status = Some(DevfileRegistryStatus {
            url: "https://my-registry.apps.example.com".to_string(),
            conditions: vec![],
        });
        assert_eq!(
            devfile_registries_value(&cr),
            r#"[{"name": "my-registry","url": "http://localhost:8080","fqdn": "https://my-registry.apps.example.com"}]"#
        );
    }

    #[test]
    fn test_children_carry_owner_reference_and_labels() {
        let cr = registry(DevfileRegistrySpec::default());
        let deployment = build_deployment(&cr);
        let owner = &deployment.metadata.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "DevfileRegistry");
        assert_eq!(owner.name, "my-registry");
        assert_eq!(owner.uid, "1234-abcd");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(deployment.metadata.labels, Some(naming::labels(&cr)));
        assert_eq!(
            deployment.metadata.namespace.as_deref(),
            Some("registry-ns")
        );
    }

    // -----------------------------------------------------------------------
    // Service
    // -----------------------------------------------------------------------

    #[test]
    fn test_service_ports() {
        let cr = registry(DevfileRegistrySpec::default());
        let ports = build_service(&cr).spec.unwrap().ports.unwrap();
        let numbers: Vec<i32> = ports.iter().map(|p| p.port).collect();
        assert_eq!(numbers, vec![8080, 7071, 5001, 3000]);

        let headless = registry(DevfileRegistrySpec {
            headless: Some(true),
            ..Default::default()
        });
        assert_eq!(build_service(&headless).spec.unwrap().ports.unwrap().len(), 3);
    }

    // -----------------------------------------------------------------------
    // Ingress / Route
    // -----------------------------------------------------------------------

    #[test]
    fn test_ingress_with_tls() {
        let cr = registry(DevfileRegistrySpec {
            k8s: K8sSpec {
                ingress_domain: Some("apps.example.com".to_string()),
                ingress_class: None,
            },
            tls: TlsSpec {
                enabled: None,
                secret_name: Some("registry-tls".to_string()),
            },
            ..Default::default()
        });
        let host = naming::ingress_host(&cr);
        let spec = build_ingress(&cr, &host).spec.unwrap();

        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some(host.as_str()));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "ImplementationSpecific");

        let tls = &spec.tls.unwrap()[0];
        assert_eq!(tls.hosts, Some(vec![host]));
        assert_eq!(tls.secret_name.as_deref(), Some("registry-tls"));
    }

    #[test]
    fn test_ingress_without_tls() {
        let cr = registry(DevfileRegistrySpec {
            tls: TlsSpec {
                enabled: Some(false),
                secret_name: None,
            },
            ..Default::default()
        });
        let spec = build_ingress(&cr, "localhost").spec.unwrap();
        assert!(spec.tls.is_none());
    }

    #[test]
    fn test_route_tls_follows_toggle() {
        let cr = registry(DevfileRegistrySpec::default());
        let route = build_route(&cr);
        assert_eq!(route.spec.tls, Some(route_tls()));
        assert_eq!(route.spec.to.name, naming::service_name(&cr));

        let plain = registry(DevfileRegistrySpec {
            tls: TlsSpec {
                enabled: Some(false),
                secret_name: None,
            },
            ..Default::default()
        });
        assert!(build_route(&plain).spec.tls.is_none());
    }

    #[test]
    fn test_registry_url_scheme() {
        let cr = registry(DevfileRegistrySpec::default());
        assert_eq!(registry_url(&cr, "reg.example.com"), "https://reg.example.com");

        let plain = registry(DevfileRegistrySpec {
            tls: TlsSpec {
                enabled: Some(false),
                secret_name: None,
            },
            ..Default::default()
        });
        assert_eq!(registry_url(&plain, "reg.example.com"), "http://reg.example.com");
    }

    // -----------------------------------------------------------------------
    // ConfigMap / PVC
    // -----------------------------------------------------------------------

    #[test]
    fn test_config_map_keys() {
        let cr = registry(DevfileRegistrySpec::default());
        let config_map = build_config_map(&cr);
        assert_eq!(
            config_map.metadata.name.as_deref(),
            Some(naming::config_map_name(&cr).as_str())
        );
        let data = config_map.data.unwrap();
        assert!(data[REGISTRY_CONFIG_KEY].contains("rootdirectory: /var/lib/registry"));
        assert!(data[VIEWER_ENV_KEY].contains(ENV_DEVFILE_REGISTRIES));
    }

    #[test]
    fn test_pvc_size() {
        let cr = registry(DevfileRegistrySpec {
            storage: StorageSpec {
                enabled: Some(true),
                registry_volume_size: Some("5Gi".to_string()),
            },
            ..Default::default()
        });
        let spec = build_pvc(&cr).spec.unwrap();
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"].0, "5Gi");
    }
}
