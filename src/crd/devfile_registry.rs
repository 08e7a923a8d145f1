//! DevfileRegistry Custom Resource Definition
//!
//! A DevfileRegistry describes one deployed devfile registry: the devfile index
//! server, the OCI registry that stores stack artifacts and the optional
//! registry viewer UI.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Spec for a deployed devfile registry
///
/// # Example
///
/// ```yaml
/// apiVersion: registry.devfile.io/v1alpha1
/// kind: DevfileRegistry
/// metadata:
///   name: devfile-registry
///   namespace: registry
/// spec:
///   devfileIndex:
///     image: quay.io/devfile/devfile-index:next
///   tls:
///     enabled: false
///   k8s:
///     ingressDomain: apps.example.com
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "registry.devfile.io",
    version = "v1alpha1",
    kind = "DevfileRegistry",
    namespaced,
    status = "DevfileRegistryStatus",
    shortname = "devreg",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DevfileRegistrySpec {
    /// Devfile index server overrides
    #[serde(default)]
    pub devfile_index: ComponentSpec,

    /// OCI registry overrides
    #[serde(default)]
    pub oci_registry: ComponentSpec,

    /// Registry viewer overrides
    #[serde(default)]
    pub registry_viewer: ComponentSpec,

    /// Legacy flat image override for the devfile index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devfile_index_image: Option<String>,

    /// Legacy flat image override for the OCI registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci_registry_image: Option<String>,

    /// Legacy flat image override for the registry viewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_viewer_image: Option<String>,

    #[serde(default)]
    pub storage: StorageSpec,

    #[serde(default)]
    pub tls: TlsSpec,

    #[serde(default)]
    pub k8s: K8sSpec,

    #[serde(default)]
    pub telemetry: TelemetrySpec,

    /// Run without the registry viewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,

    /// Replaces the application name used in labels and resource names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_override: Option<String>,

    /// Replaces the full name used for every owned resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname_override: Option<String>,

    /// Replaces the hostname prefix of the ingress host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname_override: Option<String>,
}

/// Image, pull policy and memory limit for one registry container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// One of Always, IfNotPresent, Never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Memory limit as a Kubernetes quantity (e.g., "256Mi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

/// Persistent storage for the OCI registry
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Back the registry with a PersistentVolumeClaim (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Size of the claim (default: "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_volume_size: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Serve the registry over TLS (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Secret holding the certificate for the ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Ingress settings for plain Kubernetes clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct K8sSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,

    /// Ingress class name (default: "nginx")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySpec {
    /// Name reported by the index server (default: "devfile-registry")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_name: Option<String>,

    /// Write key for the index server; telemetry is off when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Write key for the registry viewer analytics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_viewer_write_key: Option<String>,
}

/// Observed state of a DevfileRegistry
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DevfileRegistryStatus {
    /// Externally reachable URL of the registry, empty until resolved
    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
