//! Prometheus metrics for the devfile registry operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `devfile_registry_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `devfile_registry_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `devfile_registry_child_writes_total` (counter): child resource writes labeled by kind and operation.
//! - `devfile_registry_unreachable_registries` (gauge): unreachable entries labeled by list kind/namespace/name.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "devfileregistry"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Controller name, e.g. "devfileregistrieslist"
    pub controller: String,
    /// Error kind/category, e.g. "kube", "conflict", "http"
    pub kind: String,
}

/// Labels for child resource writes
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChildWriteLabels {
    /// Child kind, e.g. "Deployment"
    pub kind: String,
    /// "create", "update" or "delete"
    pub operation: String,
}

/// Labels identifying one registries list
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RegistryListLabels {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking writes issued against child resources
pub static CHILD_WRITES_TOTAL: Lazy<Family<ChildWriteLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Gauge tracking unreachable registries per list
pub static UNREACHABLE_REGISTRIES: Lazy<Family<RegistryListLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "devfile_registry_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );

    registry.register(
        "devfile_registry_reconcile_errors_total",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );

    registry.register(
        "devfile_registry_child_writes_total",
        "Total number of create/update/delete calls issued for child resources",
        CHILD_WRITES_TOTAL.clone(),
    );

    registry.register(
        "devfile_registry_unreachable_registries",
        "Number of entries in a registries list that failed validation",
        UNREACHABLE_REGISTRIES.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Count one write against a child resource
pub fn inc_child_write(kind: &str, operation: &str) {
    let labels = ChildWriteLabels {
        kind: kind.to_string(),
        operation: operation.to_string(),
    };
    CHILD_WRITES_TOTAL.get_or_create(&labels).inc();
}

/// Record how many entries of a list are currently unreachable
pub fn set_unreachable_registries(kind: &str, namespace: &str, name: &str, count: usize) {
    let labels = RegistryListLabels {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    UNREACHABLE_REGISTRIES
        .get_or_create(&labels)
        .set(count as i64);
}
