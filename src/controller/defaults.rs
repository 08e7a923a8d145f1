//! Resolved values for optional DevfileRegistry spec fields

use k8s_openapi::api::core::v1::{
    EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::crd::{ComponentSpec, DevfileRegistry};

use super::naming;

pub const DEFAULT_DEVFILE_INDEX_IMAGE: &str = "quay.io/devfile/devfile-index:next";
pub const DEFAULT_OCI_REGISTRY_IMAGE: &str = "quay.io/devfile/oci-registry:next";
pub const DEFAULT_REGISTRY_VIEWER_IMAGE: &str = "quay.io/devfile/registry-viewer:next";

pub const DEFAULT_IMAGE_PULL_POLICY: &str = "Always";
pub const DEFAULT_MEMORY_LIMIT: &str = "256Mi";

pub const DEFAULT_VOLUME_SIZE: &str = "1Gi";
pub const STORAGE_ENABLED_BY_DEFAULT: bool = false;
pub const TLS_ENABLED_BY_DEFAULT: bool = true;
pub const HEADLESS_BY_DEFAULT: bool = false;

pub const DEFAULT_INGRESS_CLASS: &str = "nginx";
pub const DEFAULT_TELEMETRY_REGISTRY_NAME: &str = "devfile-registry";

/// Name of the pod volume that backs the OCI registry
pub const REGISTRY_VOLUME_NAME: &str = "devfile-registry-storage";

fn resolve_image(component: &ComponentSpec, legacy: &Option<String>, default: &str) -> String {
    component
        .image
        .as_deref()
        .filter(|i| !i.is_empty())
        .or_else(|| legacy.as_deref().filter(|i| !i.is_empty()))
        .unwrap_or(default)
        .to_string()
}

fn resolve_pull_policy(component: &ComponentSpec) -> String {
    component
        .image_pull_policy
        .as_deref()
        .filter(|p| matches!(*p, "Always" | "IfNotPresent" | "Never"))
        .unwrap_or(DEFAULT_IMAGE_PULL_POLICY)
        .to_string()
}

fn resolve_memory_limit(component: &ComponentSpec) -> Quantity {
    let limit = component
        .memory_limit
        .as_deref()
        .filter(|m| is_valid_quantity(m))
        .unwrap_or(DEFAULT_MEMORY_LIMIT);
    Quantity(limit.to_string())
}

pub fn devfile_index_image(cr: &DevfileRegistry) -> String {
    resolve_image(
        &cr.spec.devfile_index,
        &cr.spec.devfile_index_image,
        DEFAULT_DEVFILE_INDEX_IMAGE,
    )
}

pub fn oci_registry_image(cr: &DevfileRegistry) -> String {
    resolve_image(
        &cr.spec.oci_registry,
        &cr.spec.oci_registry_image,
        DEFAULT_OCI_REGISTRY_IMAGE,
    )
}

pub fn registry_viewer_image(cr: &DevfileRegistry) -> String {
    resolve_image(
        &cr.spec.registry_viewer,
        &cr.spec.registry_viewer_image,
        DEFAULT_REGISTRY_VIEWER_IMAGE,
    )
}

pub fn devfile_index_pull_policy(cr: &DevfileRegistry) -> String {
    resolve_pull_policy(&cr.spec.devfile_index)
}

pub fn oci_registry_pull_policy(cr: &DevfileRegistry) -> String {
    resolve_pull_policy(&cr.spec.oci_registry)
}

pub fn registry_viewer_pull_policy(cr: &DevfileRegistry) -> String {
    resolve_pull_policy(&cr.spec.registry_viewer)
}

pub fn devfile_index_memory_limit(cr: &DevfileRegistry) -> Quantity {
    resolve_memory_limit(&cr.spec.devfile_index)
}

pub fn oci_registry_memory_limit(cr: &DevfileRegistry) -> Quantity {
    resolve_memory_limit(&cr.spec.oci_registry)
}

pub fn registry_viewer_memory_limit(cr: &DevfileRegistry) -> Quantity {
    resolve_memory_limit(&cr.spec.registry_viewer)
}

pub fn is_storage_enabled(cr: &DevfileRegistry) -> bool {
    cr.spec.storage.enabled.unwrap_or(STORAGE_ENABLED_BY_DEFAULT)
}

pub fn volume_size(cr: &DevfileRegistry) -> Quantity {
    let size = cr
        .spec
        .storage
        .registry_volume_size
        .as_deref()
        .filter(|s| is_valid_quantity(s))
        .unwrap_or(DEFAULT_VOLUME_SIZE);
    Quantity(size.to_string())
}

pub fn is_tls_enabled(cr: &DevfileRegistry) -> bool {
    cr.spec.tls.enabled.unwrap_or(TLS_ENABLED_BY_DEFAULT)
}

/// TLS secret for the ingress, `None` when unset or empty
pub fn tls_secret_name(cr: &DevfileRegistry) -> Option<String> {
    cr.spec
        .tls
        .secret_name
        .clone()
        .filter(|s| !s.is_empty())
}

pub fn is_headless(cr: &DevfileRegistry) -> bool {
    cr.spec.headless.unwrap_or(HEADLESS_BY_DEFAULT)
}

pub fn telemetry_registry_name(cr: &DevfileRegistry) -> String {
    cr.spec
        .telemetry
        .registry_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_TELEMETRY_REGISTRY_NAME.to_string())
}

pub fn telemetry_key(cr: &DevfileRegistry) -> String {
    cr.spec.telemetry.key.clone().unwrap_or_default()
}

pub fn registry_viewer_write_key(cr: &DevfileRegistry) -> String {
    cr.spec
        .telemetry
        .registry_viewer_write_key
        .clone()
        .unwrap_or_default()
}

pub fn ingress_class(cr: &DevfileRegistry) -> String {
    cr.spec
        .k8s
        .ingress_class
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_INGRESS_CLASS.to_string())
}

/// Storage volume: claim reference when storage is enabled, otherwise an emptyDir
pub fn registry_volume(cr: &DevfileRegistry) -> Volume {
    if is_storage_enabled(cr) {
        Volume {
            name: REGISTRY_VOLUME_NAME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: naming::pvc_name(cr),
                read_only: None,
            }),
            ..Default::default()
        }
    } else {
        Volume {
            name: REGISTRY_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    }
}

/// Loose check for a Kubernetes quantity such as `256Mi`, `1Gi` or `0.5G`
pub fn is_valid_quantity(value: &str) -> bool {
    const SUFFIXES: &[&str] = &[
        "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E", "",
    ];

    let Some(number) = SUFFIXES
        .iter()
        .find_map(|suffix| value.strip_suffix(suffix))
    else {
        return false;
    };

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match fraction {
        Some(f) => !(whole.is_empty() && f.is_empty()) && digits(whole) && digits(f),
        None => !whole.is_empty() && digits(whole),
    }
}
