use crate::snapshot::ObjectList;
use kube::{
    api::{Api, ListParams},
    core::{DynamicObject, GroupVersionKind},
    discovery::{self, verbs, Scope},
    Client,
};
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::trace;

/// Lists the objects of a single GVK from a cluster.
#[async_trait::async_trait]
pub trait ClusterSource: Send + Sync {
    /// Lists all objects of `gvk` in `namespace`. An empty namespace lists
    /// across all namespaces.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<ObjectList, DataSourceError>;
}

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("failed to discover {}/{}: {source}", .gvk.api_version(), .gvk.kind)]
    Discovery {
        gvk: GroupVersionKind,
        namespace: String,
        #[source]
        source: kube::Error,
    },

    #[error("{}/{} does not support listing in namespace {namespace:?}", .gvk.api_version(), .gvk.kind)]
    Unsupported {
        gvk: GroupVersionKind,
        namespace: String,
    },

    #[error("failed to list {}/{} in namespace {namespace:?}: {source}", .gvk.api_version(), .gvk.kind)]
    List {
        gvk: GroupVersionKind,
        namespace: String,
        #[source]
        source: kube::Error,
    },

    #[error("listing {}/{} in namespace {namespace:?} timed out after {timeout:?}", .gvk.api_version(), .gvk.kind)]
    Timeout {
        gvk: GroupVersionKind,
        namespace: String,
        timeout: Duration,
    },
}

/// A [`ClusterSource`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    timeout: Duration,
}

// === impl KubeSource ===

impl KubeSource {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bounds each discovery and list round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn list_inner(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<ObjectList, DataSourceError> {
        let (resource, caps) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|source| DataSourceError::Discovery {
                gvk: gvk.clone(),
                namespace: namespace.to_string(),
                source,
            })?;
        if !caps.supports_operation(verbs::LIST) {
            return Err(DataSourceError::Unsupported {
                gvk: gvk.clone(),
                namespace: namespace.to_string(),
            });
        }

        // Cluster-scoped kinds are listed in full regardless of the namespace.
        let api: Api<DynamicObject> = match caps.scope {
            Scope::Namespaced if !namespace.is_empty() => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        };
        trace!(plural = %resource.plural, "Listing");
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|source| DataSourceError::List {
                gvk: gvk.clone(),
                namespace: namespace.to_string(),
                source,
            })?;

        Ok(ObjectList::new(gvk.clone(), list.items))
    }
}

#[async_trait::async_trait]
impl ClusterSource for KubeSource {
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<ObjectList, DataSourceError> {
        time::timeout(self.timeout, self.list_inner(gvk, namespace))
            .await
            .map_err(|_| DataSourceError::Timeout {
                gvk: gvk.clone(),
                namespace: namespace.to_string(),
                timeout: self.timeout,
            })?
    }
}
