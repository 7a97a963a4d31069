//! Keyed object cache shared between a mirror and its readers.

use crate::key::ObjectKey;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read handle over a mirror's cache.
///
/// Cloning is cheap; every clone observes the same cache. Only the owning
/// [`Mirror`](crate::Mirror) mutates it, one complete mutation per lock
/// acquisition, so readers never see a half-applied change.
#[derive(Debug)]
pub struct Store<K> {
    objects: Arc<RwLock<BTreeMap<ObjectKey, Arc<K>>>>,
}

impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
        }
    }
}

impl<K> Default for Store<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<K> Store<K> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// All cached keys, in key order, as of the time of the call.
    pub fn list_keys(&self) -> Vec<ObjectKey> {
        self.read().keys().cloned().collect()
    }

    /// Point lookup. A miss is a valid answer, not an error.
    pub fn get_by_key(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.read().get(key).cloned()
    }

    /// Lookup by rendered key (`namespace/name` or `name`).
    pub fn get(&self, key: &str) -> Option<Arc<K>> {
        let key = key.parse().ok()?;
        self.get_by_key(&key)
    }

    /// All cached objects, in key order.
    pub fn state(&self) -> Vec<Arc<K>> {
        self.read().values().cloned().collect()
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub(crate) fn insert(&self, key: ObjectKey, obj: Arc<K>) -> Option<Arc<K>> {
        self.write().insert(key, obj)
    }

    pub(crate) fn remove(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.write().remove(key)
    }

    pub(crate) fn entries(&self) -> Vec<(ObjectKey, Arc<K>)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }

    // Observers run outside the lock, so a poisoned lock still guards a
    // consistent map.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ObjectKey, Arc<K>>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ObjectKey, Arc<K>>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_under_same_key() {
        let store: Store<&str> = Store::new();
        let key = ObjectKey::namespaced("default", "a");

        assert!(store.insert(key.clone(), Arc::new("v1")).is_none());
        let previous = store.insert(key.clone(), Arc::new("v2"));

        assert_eq!(previous.as_deref(), Some(&"v1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_key(&key).as_deref(), Some(&"v2"));
    }

    #[test]
    fn test_clones_share_state() {
        let store: Store<u32> = Store::new();
        let reader = store.clone();
        store.insert(ObjectKey::cluster("n1"), Arc::new(1));

        assert_eq!(reader.list_keys(), vec![ObjectKey::cluster("n1")]);
        assert_eq!(reader.get("n1").as_deref(), Some(&1));
        assert!(reader.get("a/b/c").is_none());
    }

    #[test]
    fn test_list_keys_is_ordered() {
        let store: Store<u32> = Store::new();
        store.insert(ObjectKey::namespaced("default", "b"), Arc::new(2));
        store.insert(ObjectKey::namespaced("default", "a"), Arc::new(1));
        store.insert(ObjectKey::namespaced("kube-system", "dns"), Arc::new(3));

        let keys: Vec<String> = store.list_keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["default/a", "default/b", "kube-system/dns"]);
        assert_eq!(store.state().iter().map(|v| **v).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_missing_key_is_none() {
        let store: Store<u32> = Store::new();
        assert!(store.remove(&ObjectKey::cluster("ghost")).is_none());
        assert!(store.is_empty());
    }
}
