//! Remote resource client trait
//!
//! Abstracts the list and watch calls a mirror needs so the mirror can be
//! driven by the Kubernetes API in production and by a scripted client in
//! unit tests.

use crate::error::InformerError;
use crate::event::{ListSnapshot, RemoteEvent};
use futures::stream::BoxStream;

/// Stream of remote changes following a resource version.
///
/// `Err(InformerError::Malformed)` items are dropped by the mirror and the
/// stream keeps being read; any other error ends the current watch.
pub type WatchStream<K> = BoxStream<'static, Result<RemoteEvent<K>, InformerError>>;

/// List and watch access to one resource type, within the scope
/// (namespace, selectors) the client was built for.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceClient<K>: Send + Sync {
    /// Fetch every item together with the collection resource version.
    async fn list(&self) -> Result<ListSnapshot<K>, InformerError>;

    /// Follow changes made after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError>;
}
