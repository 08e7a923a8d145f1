//! Cluster flavour detection

use kube::Client;
use tracing::info;

use crate::crd::route::ROUTE_API_GROUP;
use crate::error::Result;

/// Which external routing primitive the cluster offers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterPlatform {
    /// Plain Kubernetes, exposed through an Ingress
    #[default]
    Kubernetes,
    /// OpenShift, exposed through a Route
    OpenShift,
}

impl ClusterPlatform {
    pub fn from_api_groups<'a>(groups: impl IntoIterator<Item = &'a str>) -> Self {
        if groups.into_iter().any(|g| g == ROUTE_API_GROUP) {
            ClusterPlatform::OpenShift
        } else {
            ClusterPlatform::Kubernetes
        }
    }

    /// Ask API discovery whether Routes are served
    pub async fn detect(client: &Client) -> Result<Self> {
        let groups = client.list_api_groups().await?;
        let platform =
            Self::from_api_groups(groups.groups.iter().map(|g| g.name.as_str()));
        info!("Detected cluster platform: {:?}", platform);
        Ok(platform)
    }

    pub fn is_openshift(&self) -> bool {
        matches!(self, ClusterPlatform::OpenShift)
    }
}
