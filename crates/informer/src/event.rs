//! Remote and normalized change events.

use crate::key::ObjectKey;
use std::sync::Arc;

/// A change received from the remote watch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent<K> {
    /// An object was created.
    Added(K),
    /// An object changed.
    Modified(K),
    /// An object was removed.
    Deleted(DeletedObject<K>),
    /// Progress marker carrying only a newer resource version.
    Bookmark(String),
}

/// Payload of a remote deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject<K> {
    /// The final state of the deleted object.
    Full(K),
    /// Only the key of the deleted object is known (tombstone).
    Tombstone(ObjectKey),
}

/// A normalized change, as delivered to observers.
///
/// `Updated::old` is always the value the cache held immediately before the
/// update was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<K> {
    /// A key entered the cache.
    Added(Arc<K>),
    /// A cached value was replaced.
    Updated {
        /// Value before the change.
        old: Arc<K>,
        /// Value after the change.
        new: Arc<K>,
    },
    /// A key left the cache, with its last known value.
    Deleted(Arc<K>),
}

impl<K> ChangeEvent<K> {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Added(_) => "added",
            ChangeEvent::Updated { .. } => "updated",
            ChangeEvent::Deleted(_) => "deleted",
        }
    }
}

/// Result of a full list: every item plus the collection resource version
/// to start watching from.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot<K> {
    /// Every listed object.
    pub items: Vec<K>,
    /// Collection version to start watching from.
    pub resource_version: String,
}
