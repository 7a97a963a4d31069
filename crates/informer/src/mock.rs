//! Test doubles for mirrors
//!
//! `MockResourceClient` is a scripted, in-memory stand-in for the API server:
//! tests edit its "remote" collection, push watch events to open watches,
//! inject list/watch failures and drop connections. `RecordingObserver`
//! records every notification it receives.
//!
//! Available to this crate's tests and, with the `test-util` feature, to
//! dependent crates.

use crate::client::{ResourceClient, WatchStream};
use crate::error::InformerError;
use crate::event::{DeletedObject, ListSnapshot, RemoteEvent};
use crate::key::ObjectKey;
use crate::observer::ResourceObserver;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Sender<K> = UnboundedSender<Result<RemoteEvent<K>, InformerError>>;

struct MockState<K> {
    objects: BTreeMap<ObjectKey, K>,
    resource_version: u64,
    list_failures: u32,
    watch_failures: u32,
    list_calls: usize,
    watch_calls: Vec<String>,
    watchers: Vec<Sender<K>>,
}

/// Scripted [`ResourceClient`] for unit tests.
///
/// Clones share state, so a test keeps one clone while the mirror owns another.
pub struct MockResourceClient<K> {
    state: Arc<Mutex<MockState<K>>>,
    watch_opened: Arc<Notify>,
}

impl<K> Clone for MockResourceClient<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            watch_opened: Arc::clone(&self.watch_opened),
        }
    }
}

impl<K> std::fmt::Debug for MockResourceClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResourceClient").finish_non_exhaustive()
    }
}

impl<K: Resource + Clone> Default for MockResourceClient<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Resource + Clone> MockResourceClient<K> {
    /// Create a mock with an empty remote collection
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                objects: BTreeMap::new(),
                resource_version: 1,
                list_failures: 0,
                watch_failures: 0,
                list_calls: 0,
                watch_calls: Vec::new(),
                watchers: Vec::new(),
            })),
            watch_opened: Arc::new(Notify::new()),
        }
    }

    /// Create a mock whose remote collection holds `objects`
    pub fn with_objects(objects: impl IntoIterator<Item = K>) -> Self {
        let mock = Self::new();
        for obj in objects {
            mock.set_remote(obj);
        }
        mock
    }

    /// Change the remote collection without telling any watcher (a missed event)
    pub fn set_remote(&self, obj: K) {
        let mut state = self.state.lock().unwrap();
        let key = ObjectKey::from_resource(&obj).expect("test objects need a name");
        state.objects.insert(key, obj);
        state.resource_version += 1;
    }

    /// Remove an object from the remote collection without telling any watcher
    pub fn remove_remote(&self, key: &ObjectKey) {
        let mut state = self.state.lock().unwrap();
        state.objects.remove(key);
        state.resource_version += 1;
    }

    /// Apply an event to the remote collection and deliver it to open watches
    pub fn apply(&self, event: RemoteEvent<K>) {
        match &event {
            RemoteEvent::Added(obj) | RemoteEvent::Modified(obj) => self.set_remote(obj.clone()),
            RemoteEvent::Deleted(DeletedObject::Full(obj)) => {
                if let Some(key) = ObjectKey::from_resource(obj) {
                    self.remove_remote(&key);
                }
            }
            RemoteEvent::Deleted(DeletedObject::Tombstone(key)) => self.remove_remote(key),
            RemoteEvent::Bookmark(_) => {}
        }
        self.send(Ok(event));
    }

    /// Deliver a raw stream item to open watches, leaving the remote collection alone
    pub fn send(&self, item: Result<RemoteEvent<K>, InformerError>) {
        let mut state = self.state.lock().unwrap();
        state.watchers.retain(|tx| !tx.is_closed());
        let Some((newest, older)) = state.watchers.split_last() else {
            return;
        };
        // Errors are not Clone; only the newest watch gets them
        for tx in older {
            if let Ok(event) = &item {
                let _ = tx.unbounded_send(Ok(event.clone()));
            }
        }
        let _ = newest.unbounded_send(item);
    }

    /// Fail every open watch with a transport error
    pub fn disconnect(&self, reason: &str) {
        let mut state = self.state.lock().unwrap();
        for tx in state.watchers.drain(..) {
            let _ = tx.unbounded_send(Err(InformerError::Watch(reason.to_string())));
        }
    }

    /// Tell every open watch its resource version is too old
    pub fn expire_watches(&self) {
        let mut state = self.state.lock().unwrap();
        for tx in state.watchers.drain(..) {
            let _ = tx.unbounded_send(Err(InformerError::Expired("too old resource version".to_string())));
        }
    }

    /// End every open watch normally, as the API server does on timeout
    pub fn close_watches(&self) {
        self.state.lock().unwrap().watchers.clear();
    }

    /// Make the next `n` list calls fail
    pub fn fail_next_lists(&self, n: u32) {
        self.state.lock().unwrap().list_failures = n;
    }

    /// Make the next `n` watch calls fail
    pub fn fail_next_watches(&self, n: u32) {
        self.state.lock().unwrap().watch_failures = n;
    }

    /// Number of list calls, failed ones included
    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Resource versions passed to each watch call, in order
    pub fn watch_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().watch_calls.clone()
    }

    /// Wait until at least `count` watches have been opened successfully
    pub async fn wait_for_watches(&self, count: usize) {
        loop {
            let opened = self.watch_opened.notified();
            let open = {
                let state = self.state.lock().unwrap();
                state.watch_calls.len() - state.watch_failures_seen()
            };
            if open >= count {
                return;
            }
            opened.await;
        }
    }
}

impl<K> MockState<K> {
    // Failed calls are recorded with a `!` prefix
    fn watch_failures_seen(&self) -> usize {
        self.watch_calls.iter().filter(|v| v.starts_with('!')).count()
    }
}

#[async_trait::async_trait]
impl<K> ResourceClient<K> for MockResourceClient<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn list(&self) -> Result<ListSnapshot<K>, InformerError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(InformerError::Watch("mock list failure".to_string()));
        }
        Ok(ListSnapshot {
            items: state.objects.values().cloned().collect(),
            resource_version: state.resource_version.to_string(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError> {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if state.watch_failures > 0 {
                state.watch_failures -= 1;
                state.watch_calls.push(format!("!{resource_version}"));
                return Err(InformerError::Watch("mock watch failure".to_string()));
            }
            state.watch_calls.push(resource_version.to_string());
            let (tx, rx) = unbounded();
            state.watchers.push(tx);
            rx
        };
        self.watch_opened.notify_waiters();
        Ok(rx.boxed())
    }
}

/// One notification seen by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<K> {
    /// `on_add`
    Added(K),
    /// `on_update` with old and new values
    Updated(K, K),
    /// `on_delete`
    Deleted(K),
    /// `on_synced`
    Synced,
}

/// Observer that records everything it is told.
pub struct RecordingObserver<K> {
    events: Mutex<Vec<Recorded<K>>>,
    changed: Notify,
}

impl<K> std::fmt::Debug for RecordingObserver<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingObserver").finish_non_exhaustive()
    }
}

impl<K: Clone> Default for RecordingObserver<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> RecordingObserver<K> {
    /// Observer with an empty record
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            changed: Notify::new(),
        }
    }

    /// Everything recorded so far
    pub fn events(&self) -> Vec<Recorded<K>> {
        self.events.lock().unwrap().clone()
    }

    /// Everything recorded so far, clearing the record
    pub fn take(&self) -> Vec<Recorded<K>> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Wait until at least `count` notifications are recorded
    pub async fn wait_for(&self, count: usize) -> Vec<Recorded<K>> {
        loop {
            let changed = self.changed.notified();
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            changed.await;
        }
    }

    fn record(&self, event: Recorded<K>) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_waiters();
    }
}

impl<K: Clone + Send + Sync> ResourceObserver<K> for RecordingObserver<K> {
    fn on_add(&self, obj: &K) {
        self.record(Recorded::Added(obj.clone()));
    }

    fn on_update(&self, old: &K, new: &K) {
        self.record(Recorded::Updated(old.clone(), new.clone()));
    }

    fn on_delete(&self, obj: &K) {
        self.record(Recorded::Deleted(obj.clone()));
    }

    fn on_synced(&self) {
        self.record(Recorded::Synced);
    }
}

/// Test pod with the given identity and resource version
pub fn pod(namespace: &str, name: &str, resource_version: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Test node with the given labels and resource version
pub fn node(name: &str, resource_version: &str, labels: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            resource_version: Some(resource_version.to_string()),
            labels: (!labels.is_empty()).then(|| {
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}
