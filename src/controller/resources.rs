//! Kubernetes resource builders for DevfileRegistry
//!
//! Pure functions that compute the desired Deployment, Service, Ingress/Route,
//! ConfigMap and PersistentVolumeClaim for a DevfileRegistry. Every object
//! carries the registry labels and a controller owner reference so that
//! deleting the registry garbage-collects its children.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, HTTPGetAction, KeyToPath,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};

use crate::crd::route::{RoutePort, RouteTargetReference, RouteTls};
use crate::crd::{DevfileRegistry, Route, RouteSpec};

use super::defaults;
use super::naming;

pub const DEVFILE_INDEX_CONTAINER: &str = "devfile-registry";
pub const OCI_REGISTRY_CONTAINER: &str = "oci-registry";
pub const REGISTRY_VIEWER_CONTAINER: &str = "registry-viewer";

pub const DEVFILE_INDEX_PORT_NAME: &str = "devfile-registry-metadata";
pub const DEVFILE_INDEX_PORT: i32 = 8080;
pub const DEVFILE_INDEX_METRICS_PORT_NAME: &str = "devfile-index-metrics";
pub const DEVFILE_INDEX_METRICS_PORT: i32 = 7071;
pub const OCI_METRICS_PORT_NAME: &str = "oci-registry-metrics";
pub const OCI_METRICS_PORT: i32 = 5001;
pub const REGISTRY_VIEWER_PORT_NAME: &str = "registry-viewer";
pub const REGISTRY_VIEWER_PORT: i32 = 3000;

pub const ENV_REGISTRY_NAME: &str = "REGISTRY_NAME";
pub const ENV_TELEMETRY_KEY: &str = "TELEMETRY_KEY";
pub const ENV_REGISTRY_HEADLESS: &str = "REGISTRY_HEADLESS";
pub const ENV_ANALYTICS_WRITE_KEY: &str = "NEXT_PUBLIC_ANALYTICS_WRITE_KEY";
pub const ENV_DEVFILE_REGISTRIES: &str = "DEVFILE_REGISTRIES";

pub const REGISTRY_CONFIG_KEY: &str = "registry-config.yml";
pub const VIEWER_ENV_KEY: &str = ".env.registry-viewer";

const CONFIG_VOLUME_NAME: &str = "config";
pub const VIEWER_ENV_VOLUME_NAME: &str = "viewer-env-file";

const OCI_REGISTRY_CONFIG: &str = r#"version: 0.1
log:
  fields:
    service: registry
storage:
  cache:
    blobdescriptor: inmemory
  filesystem:
    rootdirectory: /var/lib/registry
http:
  addr: :5000
  headers:
    X-Content-Type-Options: [nosniff]
  debug:
    addr: :5001
    prometheus:
      enabled: true
      path: /metrics
"#;

/// Create an OwnerReference for garbage collection
pub fn owner_reference(cr: &DevfileRegistry) -> OwnerReference {
    OwnerReference {
        api_version: DevfileRegistry::api_version(&()).to_string(),
        kind: DevfileRegistry::kind(&()).to_string(),
        name: cr.name_any(),
        uid: cr.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn object_meta(cr: &DevfileRegistry, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: cr.namespace(),
        labels: Some(naming::labels(cr)),
        owner_references: Some(vec![owner_reference(cr)]),
        ..Default::default()
    }
}

/// Externally reachable URL computed from the ingress host and TLS toggle
pub fn registry_url(cr: &DevfileRegistry, host: &str) -> String {
    if defaults::is_tls_enabled(cr) {
        format!("https://{host}")
    } else {
        format!("http://{host}")
    }
}

/// Value of the viewer's `DEVFILE_REGISTRIES` env var
pub fn devfile_registries_value(cr: &DevfileRegistry) -> String {
    let fqdn = cr
        .status
        .as_ref()
        .map(|s| s.url.as_str())
        .unwrap_or_default();
    format!(
        r#"[{{"name": "{}","url": "http://localhost:{}","fqdn": "{}"}}]"#,
        cr.name_any(),
        DEVFILE_INDEX_PORT,
        fqdn
    )
}

fn env_var(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        value_from: None,
    }
}

fn http_probe(path: &str, port: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn resources(cpu_request: &str, cpu_limit: &str, memory_limit: Quantity) -> ResourceRequirements {
    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity(cpu_request.to_string()));
    requests.insert("memory".to_string(), Quantity("64Mi".to_string()));

    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity(cpu_limit.to_string()));
    limits.insert("memory".to_string(), memory_limit);

    ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    }
}

fn config_map_volume(cr: &DevfileRegistry, volume_name: &str, key: &str, path: &str) -> Volume {
    Volume {
        name: volume_name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(naming::config_map_name(cr)),
            items: Some(vec![KeyToPath {
                key: key.to_string(),
                path: path.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Deployment
// ============================================================================

fn devfile_index_container(cr: &DevfileRegistry) -> Container {
    let mut env = vec![
        env_var(ENV_REGISTRY_NAME, defaults::telemetry_registry_name(cr)),
        env_var(ENV_TELEMETRY_KEY, defaults::telemetry_key(cr)),
    ];
    if defaults::is_headless(cr) {
        env.push(env_var(ENV_REGISTRY_HEADLESS, "true".to_string()));
    }

    Container {
        name: DEVFILE_INDEX_CONTAINER.to_string(),
        image: Some(defaults::devfile_index_image(cr)),
        image_pull_policy: Some(defaults::devfile_index_pull_policy(cr)),
        ports: Some(vec![ContainerPort {
            container_port: DEVFILE_INDEX_PORT,
            ..Default::default()
        }]),
        resources: Some(resources(
            "250m",
            "500m",
            defaults::devfile_index_memory_limit(cr),
        )),
        liveness_probe: Some(http_probe("/health", DEVFILE_INDEX_PORT)),
        readiness_probe: Some(http_probe("/health", DEVFILE_INDEX_PORT)),
        env: Some(env),
        ..Default::default()
    }
}

fn oci_registry_container(cr: &DevfileRegistry) -> Container {
    Container {
        name: OCI_REGISTRY_CONTAINER.to_string(),
        image: Some(defaults::oci_registry_image(cr)),
        image_pull_policy: Some(defaults::oci_registry_pull_policy(cr)),
        resources: Some(resources(
            "100m",
            "500m",
            defaults::oci_registry_memory_limit(cr),
        )),
        volume_mounts: Some(vec![
            VolumeMount {
                name: defaults::REGISTRY_VOLUME_NAME.to_string(),
                mount_path: "/var/lib/registry".to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: CONFIG_VOLUME_NAME.to_string(),
                mount_path: "/etc/docker/registry".to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

/// Registry viewer sidecar; absent from headless registries
pub fn registry_viewer_container(cr: &DevfileRegistry) -> Container {
    Container {
        name: REGISTRY_VIEWER_CONTAINER.to_string(),
        image: Some(defaults::registry_viewer_image(cr)),
        image_pull_policy: Some(defaults::registry_viewer_pull_policy(cr)),
        resources: Some(resources(
            "250m",
            "500m",
            defaults::registry_viewer_memory_limit(cr),
        )),
        liveness_probe: Some(http_probe("/viewer", REGISTRY_VIEWER_PORT)),
        readiness_probe: Some(http_probe("/viewer", REGISTRY_VIEWER_PORT)),
        startup_probe: Some(http_probe("/viewer", REGISTRY_VIEWER_PORT)),
        env: Some(vec![
            env_var(ENV_ANALYTICS_WRITE_KEY, defaults::registry_viewer_write_key(cr)),
            env_var(ENV_DEVFILE_REGISTRIES, devfile_registries_value(cr)),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: VIEWER_ENV_VOLUME_NAME.to_string(),
            mount_path: "/app/apps/registry-viewer/.env.local".to_string(),
            sub_path: Some(".env.local".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Volume exposing the viewer env file from the registry ConfigMap
pub fn registry_viewer_volume(cr: &DevfileRegistry) -> Volume {
    config_map_volume(cr, VIEWER_ENV_VOLUME_NAME, VIEWER_ENV_KEY, ".env.local")
}

pub fn build_deployment(cr: &DevfileRegistry) -> Deployment {
    let labels = naming::labels(cr);

    let mut containers = vec![devfile_index_container(cr), oci_registry_container(cr)];
    let mut volumes = vec![
        defaults::registry_volume(cr),
        config_map_volume(cr, CONFIG_VOLUME_NAME, REGISTRY_CONFIG_KEY, "config.yml"),
    ];

    if !defaults::is_headless(cr) {
        containers.push(registry_viewer_container(cr));
        volumes.push(registry_viewer_volume(cr));
    }

    Deployment {
        metadata: object_meta(cr, naming::deployment_name(cr)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

// ============================================================================
// Service
// ============================================================================

fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}

pub fn build_service(cr: &DevfileRegistry) -> Service {
    let mut ports = vec![
        service_port(DEVFILE_INDEX_PORT_NAME, DEVFILE_INDEX_PORT),
        service_port(DEVFILE_INDEX_METRICS_PORT_NAME, DEVFILE_INDEX_METRICS_PORT),
        service_port(OCI_METRICS_PORT_NAME, OCI_METRICS_PORT),
    ];
    if !defaults::is_headless(cr) {
        ports.push(service_port(REGISTRY_VIEWER_PORT_NAME, REGISTRY_VIEWER_PORT));
    }

    Service {
        metadata: object_meta(cr, naming::service_name(cr)),
        spec: Some(ServiceSpec {
            ports: Some(ports),
            selector: Some(naming::labels(cr)),
            ..Default::default()
        }),
        status: None,
    }
}

// ============================================================================
// Ingress / Route
// ============================================================================

/// TLS block for the ingress host
pub fn ingress_tls(cr: &DevfileRegistry, host: &str) -> IngressTLS {
    IngressTLS {
        hosts: Some(vec![host.to_string()]),
        secret_name: defaults::tls_secret_name(cr),
    }
}

pub fn build_ingress(cr: &DevfileRegistry, host: &str) -> Ingress {
    let tls = defaults::is_tls_enabled(cr).then(|| vec![ingress_tls(cr, host)]);

    Ingress {
        metadata: object_meta(cr, naming::ingress_name(cr)),
        spec: Some(IngressSpec {
            ingress_class_name: Some(defaults::ingress_class(cr)),
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "ImplementationSpecific".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: naming::service_name(cr),
                                port: Some(ServiceBackendPort {
                                    number: Some(DEVFILE_INDEX_PORT),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            tls,
            ..Default::default()
        }),
        status: None,
    }
}

/// Edge termination used when TLS is enabled on OpenShift
pub fn route_tls() -> RouteTls {
    RouteTls {
        termination: "edge".to_string(),
        insecure_edge_termination_policy: Some("Redirect".to_string()),
        extra: BTreeMap::new(),
    }
}

pub fn build_route(cr: &DevfileRegistry) -> Route {
    let mut route = Route::new(
        &naming::ingress_name(cr),
        RouteSpec {
            host: None,
            path: Some("/".to_string()),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: naming::service_name(cr),
                weight: Some(100),
            },
            port: Some(RoutePort {
                target_port: DEVFILE_INDEX_PORT_NAME.to_string(),
            }),
            tls: defaults::is_tls_enabled(cr).then(route_tls),
            extra: BTreeMap::new(),
        },
    );
    route.metadata = object_meta(cr, naming::ingress_name(cr));
    route
}

// ============================================================================
// ConfigMap
// ============================================================================

/// Contents of the env file mounted into the registry viewer
fn viewer_env_file(cr: &DevfileRegistry) -> String {
    format!(
        "{}={}\n{}={}\n",
        ENV_ANALYTICS_WRITE_KEY,
        defaults::registry_viewer_write_key(cr),
        ENV_DEVFILE_REGISTRIES,
        devfile_registries_value(cr)
    )
}

/// Data of the registry ConfigMap; regenerated on every reconcile for comparison
pub fn config_map_data(cr: &DevfileRegistry) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert(REGISTRY_CONFIG_KEY.to_string(), OCI_REGISTRY_CONFIG.to_string());
    data.insert(VIEWER_ENV_KEY.to_string(), viewer_env_file(cr));
    data
}

pub fn build_config_map(cr: &DevfileRegistry) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(cr, naming::config_map_name(cr)),
        data: Some(config_map_data(cr)),
        ..Default::default()
    }
}

// ============================================================================
// PersistentVolumeClaim
// ============================================================================

pub fn build_pvc(cr: &DevfileRegistry) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), defaults::volume_size(cr));

    PersistentVolumeClaim {
        metadata: object_meta(cr, naming::pvc_name(cr)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                limits: None,
            }),
            ..Default::default()
        }),
        status: None,
    }
}
