//! Object store seam between the controllers and the Kubernetes API
//!
//! Controllers only talk to the cluster through [`ResourceStore`], which keeps the
//! convergence and status logic testable against an in-memory store.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Builds an [`Api`] for a kind according to its resource scope
pub trait ApiScope {
    fn api<K: Resource<Scope = Self, DynamicType = ()>>(
        client: Client,
        namespace: Option<&str>,
    ) -> Api<K>;
}

impl ApiScope for NamespaceResourceScope {
    fn api<K: Resource<Scope = Self, DynamicType = ()>>(
        client: Client,
        namespace: Option<&str>,
    ) -> Api<K> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

impl ApiScope for ClusterResourceScope {
    fn api<K: Resource<Scope = Self, DynamicType = ()>>(
        client: Client,
        _namespace: Option<&str>,
    ) -> Api<K> {
        Api::all(client)
    }
}

/// Anything the store can read and write
pub trait StoreObject:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    fn scoped_api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

impl<K> StoreObject for K
where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
    K::Scope: ApiScope,
{
    fn scoped_api(client: Client, namespace: Option<&str>) -> Api<Self> {
        <K::Scope as ApiScope>::api::<K>(client, namespace)
    }
}

/// Get/List/Create/Update/Delete keyed by (kind, namespace, name)
///
/// `namespace` is `None` for cluster scoped kinds and for cluster wide lists.
/// Writes use the object's `resourceVersion` for optimistic concurrency and fail
/// with [`Error::Conflict`] when it is stale.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K>;

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn replace_status<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn delete<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<()>;

    /// Like [`ResourceStore::get`] but maps NotFound to `None`
    async fn get_opt<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>> {
        match self.get::<K>(namespace, name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// [`ResourceStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoreObject>(&self, namespace: Option<&str>) -> Api<K> {
        K::scoped_api(self.client.clone(), namespace)
    }
}

/// Map API errors onto the operator taxonomy
fn map_kube_error<K: StoreObject>(err: kube::Error, name: &str) -> Error {
    match err {
        kube::Error::Api(ref resp) if resp.code == 404 => Error::NotFound {
            kind: K::kind(&()).to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref resp) if resp.code == 409 => Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: name.to_string(),
        },
        other => Error::KubeError(other),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        self.api::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error::<K>(e, name))
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(Error::KubeError)?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        debug!("Creating {} {}", K::kind(&()), name);
        self.api::<K>(obj.namespace().as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        debug!("Updating {} {}", K::kind(&()), name);
        self.api::<K>(obj.namespace().as_deref())
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn replace_status<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let data = serde_json::to_vec(obj)?;
        self.api::<K>(obj.namespace().as_deref())
            .replace_status(&name, &PostParams::default(), data)
            .await
            .map_err(|e| map_kube_error::<K>(e, &name))
    }

    async fn delete<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        debug!("Deleting {} {}", K::kind(&()), name);
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error::<K>(e, name))
    }
}
