//! Drift detection for DevfileRegistry child resources
//!
//! Each detector compares an observed object with the values derived from the
//! registry spec and patches the mismatched fields in place. All checks run on
//! every call so that one update carries every outstanding correction.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Container, EnvVar, PodSpec};
use k8s_openapi::api::networking::v1::Ingress;

use crate::crd::{DevfileRegistry, Route};

use super::defaults;
use super::resources::{
    self, DEVFILE_INDEX_CONTAINER, ENV_ANALYTICS_WRITE_KEY, ENV_DEVFILE_REGISTRIES,
    ENV_REGISTRY_HEADLESS, ENV_REGISTRY_NAME, ENV_TELEMETRY_KEY, OCI_REGISTRY_CONTAINER,
    REGISTRY_VIEWER_CONTAINER, VIEWER_ENV_VOLUME_NAME,
};

fn container_mut<'a>(pod: &'a mut PodSpec, name: &str) -> Option<&'a mut Container> {
    pod.containers.iter_mut().find(|c| c.name == name)
}

fn sync_string(field: &mut Option<String>, desired: String) -> bool {
    if field.as_deref() == Some(desired.as_str()) {
        return false;
    }
    *field = Some(desired);
    true
}

/// Set an env var on the container; unset and empty values compare equal
fn sync_env(container: &mut Container, name: &str, value: String) -> bool {
    let env = container.env.get_or_insert_with(Vec::new);
    match env.iter_mut().find(|e| e.name == name) {
        Some(var) => {
            if var.value_from.is_none() && var.value.as_deref().unwrap_or_default() == value {
                return false;
            }
            var.value = Some(value);
            var.value_from = None;
            true
        }
        None => {
            env.push(EnvVar {
                name: name.to_string(),
                value: Some(value),
                value_from: None,
            });
            true
        }
    }
}

/// Remove an env var only when it currently holds `value`
fn remove_env_with_value(container: &mut Container, name: &str, value: &str) -> bool {
    let Some(env) = container.env.as_mut() else {
        return false;
    };
    let before = env.len();
    env.retain(|e| !(e.name == name && e.value.as_deref() == Some(value)));
    env.len() != before
}

fn index_container_drift(cr: &DevfileRegistry, pod: &mut PodSpec) -> bool {
    let Some(index) = container_mut(pod, DEVFILE_INDEX_CONTAINER) else {
        return false;
    };
    let mut drifted = false;
    drifted |= sync_string(&mut index.image, defaults::devfile_index_image(cr));
    drifted |= sync_string(
        &mut index.image_pull_policy,
        defaults::devfile_index_pull_policy(cr),
    );
    drifted |= sync_env(index, ENV_REGISTRY_NAME, defaults::telemetry_registry_name(cr));
    drifted |= sync_env(index, ENV_TELEMETRY_KEY, defaults::telemetry_key(cr));
    drifted
}

fn oci_container_drift(cr: &DevfileRegistry, pod: &mut PodSpec) -> bool {
    let Some(oci) = container_mut(pod, OCI_REGISTRY_CONTAINER) else {
        return false;
    };
    let mut drifted = false;
    drifted |= sync_string(&mut oci.image, defaults::oci_registry_image(cr));
    drifted |= sync_string(
        &mut oci.image_pull_policy,
        defaults::oci_registry_pull_policy(cr),
    );
    drifted
}

fn storage_volume_drift(cr: &DevfileRegistry, pod: &mut PodSpec) -> bool {
    let storage_enabled = defaults::is_storage_enabled(cr);
    let volumes = pod.volumes.get_or_insert_with(Vec::new);

    match volumes
        .iter_mut()
        .find(|v| v.name == defaults::REGISTRY_VOLUME_NAME)
    {
        Some(volume) if volume.persistent_volume_claim.is_some() == storage_enabled => false,
        Some(volume) => {
            *volume = defaults::registry_volume(cr);
            true
        }
        None => {
            volumes.insert(0, defaults::registry_volume(cr));
            true
        }
    }
}

fn headless_drift(cr: &DevfileRegistry, pod: &mut PodSpec) -> bool {
    let headless = defaults::is_headless(cr);
    let mut drifted = false;

    if let Some(index) = container_mut(pod, DEVFILE_INDEX_CONTAINER) {
        drifted |= if headless {
            sync_env(index, ENV_REGISTRY_HEADLESS, "true".to_string())
        } else {
            remove_env_with_value(index, ENV_REGISTRY_HEADLESS, "true")
        };
    }

    let has_viewer = pod
        .containers
        .iter()
        .any(|c| c.name == REGISTRY_VIEWER_CONTAINER);

    if headless && has_viewer {
        pod.containers.retain(|c| c.name != REGISTRY_VIEWER_CONTAINER);
        if let Some(volumes) = pod.volumes.as_mut() {
            volumes.retain(|v| v.name != VIEWER_ENV_VOLUME_NAME);
        }
        drifted = true;
    } else if !headless && !has_viewer {
        pod.containers.push(resources::registry_viewer_container(cr));
        let volumes = pod.volumes.get_or_insert_with(Vec::new);
        if !volumes.iter().any(|v| v.name == VIEWER_ENV_VOLUME_NAME) {
            volumes.push(resources::registry_viewer_volume(cr));
        }
        drifted = true;
    }

    drifted
}

fn viewer_container_drift(cr: &DevfileRegistry, pod: &mut PodSpec) -> bool {
    let Some(viewer) = container_mut(pod, REGISTRY_VIEWER_CONTAINER) else {
        return false;
    };
    let mut drifted = false;
    drifted |= sync_env(
        viewer,
        ENV_ANALYTICS_WRITE_KEY,
        defaults::registry_viewer_write_key(cr),
    );
    drifted |= sync_env(
        viewer,
        ENV_DEVFILE_REGISTRIES,
        resources::devfile_registries_value(cr),
    );
    drifted |= sync_string(&mut viewer.image, defaults::registry_viewer_image(cr));
    drifted |= sync_string(
        &mut viewer.image_pull_policy,
        defaults::registry_viewer_pull_policy(cr),
    );
    drifted
}

/// Images, pull policies, env values, storage volume source and headless mode
///
/// Memory limits are not compared.
pub fn deployment_drift(cr: &DevfileRegistry, deployment: &mut Deployment) -> bool {
    let Some(pod) = deployment
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
    else {
        return false;
    };

    let mut drifted = false;
    drifted |= index_container_drift(cr, pod);
    drifted |= oci_container_drift(cr, pod);
    drifted |= storage_volume_drift(cr, pod);
    drifted |= headless_drift(cr, pod);
    drifted |= viewer_container_drift(cr, pod);
    drifted
}

/// TLS block, secret name, rule host and TLS hosts
pub fn ingress_drift(cr: &DevfileRegistry, host: &str, ingress: &mut Ingress) -> bool {
    let spec = ingress.spec.get_or_insert_with(Default::default);
    let tls_enabled = defaults::is_tls_enabled(cr);
    let mut drifted = false;

    if tls_enabled {
        let tls = spec.tls.get_or_insert_with(Vec::new);
        if tls.is_empty() {
            tls.push(resources::ingress_tls(cr, host));
            drifted = true;
        }
        let desired_secret = defaults::tls_secret_name(cr);
        let observed_secret = tls[0].secret_name.clone().filter(|s| !s.is_empty());
        if observed_secret != desired_secret {
            tls[0].secret_name = desired_secret;
            drifted = true;
        }
        if tls[0].hosts.as_deref() != Some(&[host.to_string()][..]) {
            tls[0].hosts = Some(vec![host.to_string()]);
            drifted = true;
        }
    } else if spec.tls.as_ref().is_some_and(|tls| !tls.is_empty()) {
        spec.tls = None;
        drifted = true;
    }

    let rules = spec.rules.get_or_insert_with(Vec::new);
    match rules.first_mut() {
        Some(rule) if rule.host.as_deref() == Some(host) => {}
        Some(rule) => {
            rule.host = Some(host.to_string());
            drifted = true;
        }
        None => {
            if let Some(desired) = resources::build_ingress(cr, host)
                .spec
                .and_then(|s| s.rules)
            {
                *rules = desired;
            }
            drifted = true;
        }
    }

    drifted
}

/// Edge TLS present exactly when TLS is enabled
pub fn route_drift(cr: &DevfileRegistry, route: &mut Route) -> bool {
    match (defaults::is_tls_enabled(cr), route.spec.tls.is_some()) {
        (true, false) => {
            route.spec.tls = Some(resources::route_tls());
            true
        }
        (false, true) => {
            route.spec.tls = None;
            true
        }
        _ => false,
    }
}

/// ConfigMap data is fully derived from the registry spec and compared verbatim
pub fn config_map_drift(cr: &DevfileRegistry, config_map: &mut ConfigMap) -> bool {
    let desired = resources::config_map_data(cr);
    if config_map.data.as_ref() == Some(&desired) {
        return false;
    }
    config_map.data = Some(desired);
    true
}
