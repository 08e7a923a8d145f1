//! Admission Webhook Server
//!
//! Serves Kubernetes ValidatingAdmissionWebhook requests for DevfileRegistry
//! and the two registries list kinds over HTTPS.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use opentelemetry::{global, propagation::Extractor};
use tracing::{error, info, instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::validation::{review_list, review_registry, Verdict};
use crate::controller::{EndpointValidator, ResourceStore, StoreObject};
use crate::crd::{ClusterDevfileRegistriesList, DevfileRegistriesList, DevfileRegistry, RegistryList};
use crate::error::{Error, Result};

struct HeaderExtractor<'a>(&'a HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v: &HeaderValue| v.to_str().ok())
    }
    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k: &HeaderName| k.as_str()).collect()
    }
}

async fn extract_trace_context(request: Request, next: Next) -> Response {
    let parent_cx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    tracing::Span::current().set_parent(parent_cx);
    next.run(request).await
}

/// TLS material for the webhook listener
#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Webhook server state
pub struct WebhookServer<S> {
    store: S,
    validator: Arc<dyn EndpointValidator>,
}

impl<S: ResourceStore + 'static> WebhookServer<S> {
    pub fn new(store: S, validator: Arc<dyn EndpointValidator>) -> Self {
        Self { store, validator }
    }

    /// Routes served by the webhook
    pub fn router(self) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .route("/validate-devfileregistry", post(validate_registry_handler::<S>))
            .route(
                "/validate-devfileregistrieslist",
                post(validate_list_handler::<DevfileRegistriesList, S>),
            )
            .route(
                "/validate-clusterdevfileregistrieslist",
                post(validate_list_handler::<ClusterDevfileRegistriesList, S>),
            )
            .layer(middleware::from_fn(extract_trace_context))
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(Arc::new(self))
    }

    /// Start the webhook server with TLS
    pub async fn start(self, addr: SocketAddr, tls: TlsConfig) -> Result<()> {
        // reqwest and axum-server pull in different rustls backends; pick one
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                Error::ConfigError(format!(
                    "Failed to load webhook certificate {} / {}: {e}",
                    tls.cert_path, tls.key_path
                ))
            })?;

        info!("Starting webhook server on {}", addr);

        axum_server::bind_rustls(addr, rustls_config)
            .serve(self.router().into_make_service())
            .await
            .map_err(|e| Error::ConfigError(format!("Webhook server error: {e}")))
    }
}

// HTTP Handlers

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn parse_review<K: StoreObject>(
    review: AdmissionReview<K>,
) -> std::result::Result<AdmissionRequest<K>, (StatusCode, Json<AdmissionReview<DynamicObject>>)> {
    review.try_into().map_err(|e| {
        error!("Failed to parse admission request: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(AdmissionResponse::invalid(format!("Invalid admission request: {e}")).into_review()),
        )
    })
}

fn respond<K: StoreObject>(
    req: &AdmissionRequest<K>,
    verdict: Verdict,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    info!(
        "Admission {:?} {} {}: allowed={}",
        req.operation,
        K::kind(&()),
        req.name,
        verdict.allowed()
    );
    let response = match verdict.message() {
        None => AdmissionResponse::from(req),
        Some(message) => AdmissionResponse::from(req).deny(message),
    };
    (StatusCode::OK, Json(response.into_review()))
}

#[instrument(skip(state, review))]
async fn validate_registry_handler<S: ResourceStore + 'static>(
    State(state): State<Arc<WebhookServer<S>>>,
    Json(review): Json<AdmissionReview<DevfileRegistry>>,
) -> impl IntoResponse {
    let req = match parse_review(review) {
        Ok(req) => req,
        Err(invalid) => return invalid,
    };

    let verdict = match &req.object {
        Some(registry) => {
            let mut registry = registry.clone();
            if registry.metadata.namespace.is_none() {
                registry.metadata.namespace = req.namespace.clone();
            }
            review_registry(state.validator.as_ref(), &req.operation, &registry).await
        }
        None => Verdict::default(),
    };

    respond(&req, verdict)
}

#[instrument(skip(state, review))]
async fn validate_list_handler<L, S>(
    State(state): State<Arc<WebhookServer<S>>>,
    Json(review): Json<AdmissionReview<L>>,
) -> impl IntoResponse
where
    L: RegistryList + StoreObject,
    S: ResourceStore + 'static,
{
    let req = match parse_review(review) {
        Ok(req) => req,
        Err(invalid) => return invalid,
    };

    let verdict = match &req.object {
        Some(list) => {
            let mut list = list.clone();
            if list.meta().namespace.is_none() {
                list.meta_mut().namespace = req.namespace.clone();
            }
            review_list(&state.store, state.validator.as_ref(), &req.operation, &list).await
        }
        None => Verdict::default(),
    };

    respond(&req, verdict)
}
