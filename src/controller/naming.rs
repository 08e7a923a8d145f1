//! Names, labels and hostnames for resources owned by a DevfileRegistry

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::crd::DevfileRegistry;

/// Application name used when no override is set
pub const DEFAULT_APP_NAME: &str = "devfile-registry";

/// Maximum length of a Kubernetes object name
pub const MAX_NAME_LENGTH: usize = 63;

const CONFIG_MAP_SUFFIX: &str = "-registry-config";

/// Truncate `name` to 63 characters and trim a trailing `-`
pub fn truncate_name(name: &str) -> String {
    truncate_name_n(name, MAX_NAME_LENGTH)
}

/// Truncate `name` to `n` characters and trim a trailing `-`
pub fn truncate_name_n(name: &str, n: usize) -> String {
    let truncated: String = name.chars().take(n).collect();
    truncated
        .strip_suffix('-')
        .map(str::to_string)
        .unwrap_or(truncated)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Application name: `nameOverride` or `devfile-registry`
pub fn app_name(cr: &DevfileRegistry) -> String {
    let name = non_empty(&cr.spec.name_override).unwrap_or(DEFAULT_APP_NAME);
    truncate_name(name)
}

/// Full name shared by the Deployment, Service, PVC and Ingress/Route
pub fn full_name(cr: &DevfileRegistry) -> String {
    if let Some(fullname) = non_empty(&cr.spec.fullname_override) {
        return truncate_name(fullname);
    }

    let app = app_name(cr);
    let cr_name = cr.metadata.name.clone().unwrap_or_default();

    if cr_name.is_empty() {
        app
    } else if cr_name.contains(&app) {
        truncate_name(&cr_name)
    } else {
        truncate_name(&format!("{cr_name}-{app}"))
    }
}

pub fn deployment_name(cr: &DevfileRegistry) -> String {
    full_name(cr)
}

pub fn service_name(cr: &DevfileRegistry) -> String {
    full_name(cr)
}

pub fn pvc_name(cr: &DevfileRegistry) -> String {
    full_name(cr)
}

/// Name of the Ingress, or of the Route on OpenShift
pub fn ingress_name(cr: &DevfileRegistry) -> String {
    full_name(cr)
}

pub fn config_map_name(cr: &DevfileRegistry) -> String {
    let prefix = truncate_name_n(&full_name(cr), MAX_NAME_LENGTH - CONFIG_MAP_SUFFIX.len());
    format!("{prefix}{CONFIG_MAP_SUFFIX}")
}

/// Labels stamped on every owned resource and used as the pod selector
pub fn labels(cr: &DevfileRegistry) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app_name(cr));
    labels.insert("devfileregistry_cr".to_string(), cr.name_any());
    labels
}

/// Host prefix: `hostnameOverride` or `<fullname>-<namespace>`
pub fn hostname(cr: &DevfileRegistry) -> String {
    if let Some(hostname) = non_empty(&cr.spec.hostname_override) {
        return hostname.to_string();
    }
    match cr.namespace() {
        Some(ns) if !ns.is_empty() => format!("{}-{}", full_name(cr), ns),
        _ => full_name(cr),
    }
}

/// Host served by the Ingress; `localhost` when no ingress domain is configured
pub fn ingress_host(cr: &DevfileRegistry) -> String {
    match non_empty(&cr.spec.k8s.ingress_domain) {
        Some(domain) => format!("{}.{}", hostname(cr), domain),
        None => "localhost".to_string(),
    }
}
