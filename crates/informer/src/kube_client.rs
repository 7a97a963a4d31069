//! Kubernetes API backed [`ResourceClient`].

use crate::client::{ResourceClient, WatchStream};
use crate::error::InformerError;
use crate::event::{DeletedObject, ListSnapshot, RemoteEvent};
use futures::StreamExt;
use kube::api::{ListParams, WatchEvent, WatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

const GONE: u16 = 410;

/// List and watch one resource type through `kube::Api`.
#[derive(Clone)]
pub struct KubeResourceClient<K> {
    api: Api<K>,
    list_params: ListParams,
    watch_params: WatchParams,
}

impl<K: Resource> Debug for KubeResourceClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient")
            .field("resource_url", &self.api.resource_url())
            .field("label_selector", &self.list_params.label_selector)
            .finish()
    }
}

impl<K> KubeResourceClient<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    /// Client for every object of `K` across all namespaces (or cluster-scoped).
    pub fn all(client: Client) -> Self {
        Self::from_api(Api::all(client))
    }

    /// Client for objects of `K` in one namespace.
    pub fn namespaced(client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self::from_api(Api::namespaced(client, namespace))
    }

    /// Wrap an existing `Api`.
    pub fn from_api(api: Api<K>) -> Self {
        Self {
            api,
            list_params: ListParams::default(),
            // bookmarks are requested by default
            watch_params: WatchParams::default(),
        }
    }

    /// Only mirror objects matching a label selector, e.g. `app=web,tier!=cache`.
    #[must_use]
    pub fn with_label_selector(mut self, selector: &str) -> Self {
        self.list_params = self.list_params.labels(selector);
        self.watch_params = self.watch_params.labels(selector);
        self
    }
}

#[async_trait::async_trait]
impl<K> ResourceClient<K> for KubeResourceClient<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self) -> Result<ListSnapshot<K>, InformerError> {
        let list = self.api.list(&self.list_params).await?;
        let resource_version = list.metadata.resource_version.unwrap_or_default();
        debug!(
            resource_url = %self.api.resource_url(),
            items = list.items.len(),
            %resource_version,
            "Listed resources"
        );
        Ok(ListSnapshot {
            items: list.items,
            resource_version,
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError> {
        let stream = self.api.watch(&self.watch_params, resource_version).await?;
        Ok(stream
            .map(|item| item.map_err(InformerError::from).and_then(to_remote_event))
            .boxed())
    }
}

fn to_remote_event<K>(event: WatchEvent<K>) -> Result<RemoteEvent<K>, InformerError> {
    match event {
        WatchEvent::Added(obj) => Ok(RemoteEvent::Added(obj)),
        WatchEvent::Modified(obj) => Ok(RemoteEvent::Modified(obj)),
        WatchEvent::Deleted(obj) => Ok(RemoteEvent::Deleted(DeletedObject::Full(obj))),
        WatchEvent::Bookmark(bookmark) => Ok(RemoteEvent::Bookmark(bookmark.metadata.resource_version)),
        WatchEvent::Error(status) if status.code == GONE => {
            Err(InformerError::Expired(status.message))
        }
        WatchEvent::Error(status) => Err(InformerError::Watch(format!(
            "{} (code {})",
            status.message, status.code
        ))),
    }
}
