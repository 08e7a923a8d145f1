//! Devfile registry endpoint validation
//!
//! A registry is valid when it serves a devfile index. The legacy index path is
//! tried first and the v2 index path second; either one is enough.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Index paths probed in order
pub const INDEX_PATHS: [&str; 2] = ["/index/all?icons=base64", "/v2index/all?icons=base64"];

const USER_AGENT: &str = concat!("devfile-registry-operator/", env!("CARGO_PKG_VERSION"));

/// Error message for a registry that answered neither index probe
pub fn invalid_registry_message(url: &str) -> String {
    format!(
        "Devfile {url} Registry is either invalid or unavailable, unable to add to the DevfileRegistryService list. Ensure you provide a valid Devfile Registry URL"
    )
}

/// Decides whether a URL hosts a devfile registry
#[async_trait]
pub trait EndpointValidator: Send + Sync {
    async fn validate(&self, url: &str, skip_tls_verify: bool) -> Result<()>;
}

/// Minimal view of one devfile index entry
#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[allow(dead_code)]
    name: String,
}

/// [`EndpointValidator`] that fetches the registry index over HTTP
#[derive(Clone)]
pub struct HttpIndexValidator {
    client: Client,
    insecure_client: Client,
}

impl HttpIndexValidator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::HttpError)?;
        let insecure_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(Error::HttpError)?;

        Ok(Self {
            client,
            insecure_client,
        })
    }

    async fn fetch_index(&self, client: &Client, index_url: &str) -> Result<usize> {
        let resp = client
            .get(index_url)
            .send()
            .await
            .map_err(Error::HttpError)?;

        if !resp.status().is_success() {
            return Err(Error::InvalidRegistry(format!(
                "HTTP {} from {}",
                resp.status(),
                index_url
            )));
        }

        let entries: Vec<IndexEntry> = resp.json().await.map_err(|e| {
            Error::InvalidRegistry(format!("malformed devfile index from {index_url}: {e}"))
        })?;
        Ok(entries.len())
    }
}

#[async_trait]
impl EndpointValidator for HttpIndexValidator {
    async fn validate(&self, url: &str, skip_tls_verify: bool) -> Result<()> {
        let client = if skip_tls_verify {
            &self.insecure_client
        } else {
            &self.client
        };
        let base_url = url.trim_end_matches('/');

        for path in INDEX_PATHS {
            let index_url = format!("{base_url}{path}");
            match self.fetch_index(client, &index_url).await {
                Ok(count) => {
                    debug!("Registry {} serves {} index entries", url, count);
                    return Ok(());
                }
                Err(e) => debug!("Index probe {} failed: {}", index_url, e),
            }
        }

        warn!("Registry {} failed every index probe", url);
        Err(Error::InvalidRegistry(invalid_registry_message(url)))
    }
}
