//! The local mirror.
//!
//! A mirror lists its resource type once, then follows the watch stream from
//! the listed resource version, applying every change to its [`Store`] and
//! fanning the normalized change out to its observers. A periodic resync
//! re-lists and reconciles the cache against the fresh snapshot.
//!
//! The resync timer and the watch stream are polled from the same loop, so a
//! resync never overlaps the application of a watch event. After a stream
//! failure the mirror waits out a Fibonacci backoff, re-lists, and resumes
//! watching from the new snapshot.

use crate::backoff::FibonacciBackoff;
use crate::client::{ResourceClient, WatchStream};
use crate::error::InformerError;
use crate::event::{ChangeEvent, DeletedObject, ListSnapshot, RemoteEvent};
use crate::key::ObjectKey;
use crate::observer::{ObserverRegistry, ResourceObserver};
use crate::stop::StopSignal;
use crate::store::Store;
use futures::StreamExt;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Objects a mirror can hold.
pub trait MirrorObject: Resource + Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> MirrorObject for T where T: Resource + Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Tuning for one mirror.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Resource name used in logs, e.g. `pods`.
    pub resource: String,
    /// Period of the full re-list.
    pub resync_interval: Duration,
    /// How many times the initial list is tried before `start` fails.
    pub initial_list_attempts: u32,
    /// Shortest delay between retries.
    pub backoff_min: Duration,
    /// Longest delay between retries.
    pub backoff_max: Duration,
}

impl MirrorConfig {
    /// Defaults: 60s resync, 5 initial list attempts, 1s..30s backoff.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            resync_interval: Duration::from_secs(60),
            initial_list_attempts: 5,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }

    /// Set the period of the full re-list. Must be non-zero.
    #[must_use]
    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Set how many times the initial list is tried.
    #[must_use]
    pub fn initial_list_attempts(mut self, attempts: u32) -> Self {
        self.initial_list_attempts = attempts;
        self
    }

    /// Set the retry delay bounds.
    #[must_use]
    pub fn backoff(mut self, min: Duration, max: Duration) -> Self {
        self.backoff_min = min;
        self.backoff_max = max;
        self
    }

    /// Rejects settings the watch loop cannot run with.
    pub fn validate(&self) -> Result<(), InformerError> {
        if self.resync_interval.is_zero() {
            return Err(InformerError::InvalidConfig(format!(
                "{}: resync interval must be non-zero",
                self.resource
            )));
        }
        Ok(())
    }
}

/// How one watch stream ended.
#[derive(Debug, PartialEq, Eq)]
enum WatchEnd {
    Stopped,
    /// The server closed the stream after delivering events.
    Closed,
    Disconnected,
    Expired,
}

/// Event-driven local mirror of one resource type.
pub struct Mirror<K, C> {
    client: C,
    config: MirrorConfig,
    store: Store<K>,
    observers: ObserverRegistry<K>,
    resource_version: String,
    started: bool,
}

impl<K, C> Debug for Mirror<K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .field("resource_version", &self.resource_version)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<K, C> Mirror<K, C>
where
    K: MirrorObject,
    C: ResourceClient<K>,
{
    /// Creates a mirror with an empty cache. Nothing is fetched until [`Mirror::start`].
    pub fn new(client: C, config: MirrorConfig) -> Self {
        Self {
            client,
            observers: ObserverRegistry::new(config.resource.clone()),
            config,
            store: Store::new(),
            resource_version: String::new(),
            started: false,
        }
    }

    /// Register an observer. Observers are invoked in registration order.
    pub fn register(&mut self, name: impl Into<String>, observer: Arc<dyn ResourceObserver<K>>) {
        let name = name.into();
        debug!(resource = %self.config.resource, observer = %name, "Registered observer");
        self.observers.register(name, observer);
    }

    /// Read handle for the cache, for callers outside the mirror's loop.
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Settings this mirror was built with.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Resource version the next watch starts from.
    pub fn resource_version(&self) -> &str {
        &self.resource_version
    }

    /// Performs the initial list and populates the cache.
    ///
    /// Every listed object is delivered as an add, followed by a single
    /// `on_synced`. The list is retried with backoff up to
    /// `initial_list_attempts` times; if it never succeeds the mirror cannot
    /// serve and the error is returned to the caller.
    pub async fn start(&mut self) -> Result<(), InformerError> {
        self.config.validate()?;
        let attempts = self.config.initial_list_attempts.max(1);
        let mut backoff = self.new_backoff();
        let mut attempt = 0;

        let snapshot = loop {
            attempt += 1;
            match self.client.list().await {
                Ok(snapshot) => break snapshot,
                Err(err) if attempt < attempts => {
                    let delay = backoff.next_backoff();
                    warn!(
                        resource = %self.config.resource,
                        attempt,
                        attempts,
                        error = %err,
                        "Initial list failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(resource = %self.config.resource, attempts, error = %err, "Initial list failed");
                    return Err(InformerError::InitialList {
                        resource: self.config.resource.clone(),
                        attempts,
                        source: Box::new(err),
                    });
                }
            }
        };

        self.reconcile(snapshot);
        self.started = true;
        info!(
            resource = %self.config.resource,
            objects = self.store.len(),
            resource_version = %self.resource_version,
            "Initial list complete"
        );
        Ok(())
    }

    /// Re-lists the collection and reconciles the cache against it.
    ///
    /// Objects that vanished are delivered as deletes, new ones as adds and
    /// changed ones as updates; unchanged objects produce no notification.
    /// `on_synced` follows once everything has been delivered. On error the
    /// cache is left untouched.
    pub async fn resync(&mut self) -> Result<(), InformerError> {
        let snapshot = self.client.list().await?;
        let changes = self.reconcile(snapshot);
        debug!(
            resource = %self.config.resource,
            changes,
            objects = self.store.len(),
            "Resync complete"
        );
        Ok(())
    }

    /// Applies one remote change to the cache and notifies observers.
    pub fn handle_event(&mut self, event: RemoteEvent<K>) {
        match event {
            RemoteEvent::Added(obj) | RemoteEvent::Modified(obj) => self.apply_upsert(obj),
            RemoteEvent::Deleted(deleted) => self.apply_delete(deleted),
            RemoteEvent::Bookmark(version) => {
                trace!(resource = %self.config.resource, %version, "Bookmark");
                self.resource_version = version;
            }
        }
    }

    /// Follows the watch stream until `stop` fires.
    ///
    /// Consumes the mirror: a stopped mirror cannot be restarted. Stream
    /// failures are retried internally and never returned.
    pub async fn run(mut self, mut stop: StopSignal) -> Result<(), InformerError> {
        if !self.started {
            return Err(InformerError::NotStarted(self.config.resource.clone()));
        }
        info!(resource = %self.config.resource, "Watch loop started");

        let period = self.config.resync_interval;
        let mut resync_timer = tokio::time::interval_at(Instant::now() + period, period);
        resync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = self.new_backoff();
        let mut needs_resync = false;

        loop {
            if needs_resync {
                let relisted = tokio::select! {
                    _ = stop.stopped() => break,
                    res = self.resync() => res,
                };
                match relisted {
                    Ok(()) => {
                        needs_resync = false;
                        resync_timer.reset();
                    }
                    Err(err) => {
                        warn!(resource = %self.config.resource, error = %err, "Relist after reconnect failed");
                        if !sleep_or_stop(backoff.next_backoff(), &mut stop).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let version = self.resource_version.clone();
            let opened = tokio::select! {
                _ = stop.stopped() => break,
                res = self.client.watch(&version) => res,
            };
            let stream = match opened {
                Ok(stream) => stream,
                Err(InformerError::Expired(reason)) => {
                    info!(resource = %self.config.resource, %reason, "Resource version expired, relisting");
                    needs_resync = true;
                    continue;
                }
                Err(err) => {
                    warn!(resource = %self.config.resource, error = %err, "Failed to open watch");
                    needs_resync = true;
                    if !sleep_or_stop(backoff.next_backoff(), &mut stop).await {
                        break;
                    }
                    continue;
                }
            };
            debug!(resource = %self.config.resource, %version, "Watch opened");

            match self.follow(stream, &mut stop, &mut resync_timer, &mut backoff).await {
                WatchEnd::Stopped => break,
                WatchEnd::Closed => {
                    debug!(resource = %self.config.resource, "Watch closed by server, re-watching");
                }
                WatchEnd::Expired => needs_resync = true,
                WatchEnd::Disconnected => {
                    needs_resync = true;
                    if !sleep_or_stop(backoff.next_backoff(), &mut stop).await {
                        break;
                    }
                }
            }
        }

        info!(resource = %self.config.resource, "Watch loop stopped");
        Ok(())
    }

    async fn follow(
        &mut self,
        mut stream: WatchStream<K>,
        stop: &mut StopSignal,
        resync_timer: &mut Interval,
        backoff: &mut FibonacciBackoff,
    ) -> WatchEnd {
        let mut received = false;
        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => return WatchEnd::Stopped,
                _ = resync_timer.tick() => {
                    let relisted = tokio::select! {
                        _ = stop.stopped() => return WatchEnd::Stopped,
                        res = self.resync() => res,
                    };
                    if let Err(err) = relisted {
                        warn!(resource = %self.config.resource, error = %err, "Periodic resync failed, keeping cache");
                    }
                }
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        received = true;
                        backoff.reset();
                        self.handle_event(event);
                    }
                    Some(Err(InformerError::Expired(reason))) => {
                        info!(resource = %self.config.resource, %reason, "Watch expired, relisting");
                        return WatchEnd::Expired;
                    }
                    Some(Err(err)) if err.is_recoverable_in_stream() => {
                        error!(resource = %self.config.resource, error = %err, "Dropping malformed event");
                    }
                    Some(Err(err)) => {
                        warn!(resource = %self.config.resource, error = %err, "Watch stream failed");
                        return WatchEnd::Disconnected;
                    }
                    // An empty stream is a misbehaving server, not a timeout
                    None if received => return WatchEnd::Closed,
                    None => return WatchEnd::Disconnected,
                },
            }
        }
    }

    fn apply_upsert(&mut self, obj: K) {
        let Some(key) = ObjectKey::from_resource(&obj) else {
            error!(resource = %self.config.resource, object = ?obj, "Event object has no name, dropping");
            return;
        };
        let new = Arc::new(obj);

        match self.store.get_by_key(&key) {
            None => {
                self.advance_version(&new);
                self.store.insert(key, Arc::clone(&new));
                self.observers.dispatch(&ChangeEvent::Added(new));
            }
            Some(old) if *old == *new => {
                trace!(resource = %self.config.resource, %key, "Duplicate event, ignoring");
            }
            Some(old) if is_stale(old.as_ref(), new.as_ref()) => {
                debug!(
                    resource = %self.config.resource,
                    %key,
                    cached = ?old.resource_version(),
                    incoming = ?new.resource_version(),
                    "Stale event, ignoring"
                );
            }
            Some(old) => {
                self.advance_version(&new);
                self.store.insert(key, Arc::clone(&new));
                self.observers.dispatch(&ChangeEvent::Updated { old, new });
            }
        }
    }

    fn apply_delete(&mut self, deleted: DeletedObject<K>) {
        let (key, payload) = match deleted {
            DeletedObject::Full(obj) => match ObjectKey::from_resource(&obj) {
                Some(key) => (key, Some(obj)),
                None => {
                    error!(resource = %self.config.resource, object = ?obj, "Deleted object has no name, dropping");
                    return;
                }
            },
            DeletedObject::Tombstone(key) => (key, None),
        };

        let Some(last_known) = self.store.get_by_key(&key) else {
            match payload {
                Some(_) => debug!(resource = %self.config.resource, %key, "Delete for uncached object, ignoring"),
                None => warn!(
                    resource = %self.config.resource,
                    %key,
                    "Tombstone for unknown object, final state unrecoverable; skipping"
                ),
            }
            return;
        };
        if let Some(obj) = &payload {
            if is_stale(last_known.as_ref(), obj) {
                debug!(
                    resource = %self.config.resource,
                    %key,
                    cached = ?last_known.resource_version(),
                    incoming = ?obj.resource_version(),
                    "Stale delete, ignoring"
                );
                return;
            }
        }
        self.store.remove(&key);

        let final_state = match payload {
            Some(obj) => {
                self.advance_version(&obj);
                Arc::new(obj)
            }
            None => {
                debug!(resource = %self.config.resource, %key, "Recovered tombstone from cache");
                last_known
            }
        };
        self.observers.dispatch(&ChangeEvent::Deleted(final_state));
    }

    /// Brings the cache in line with an authoritative snapshot.
    /// Returns the number of changes delivered.
    fn reconcile(&mut self, snapshot: ListSnapshot<K>) -> usize {
        let ListSnapshot {
            items,
            resource_version,
        } = snapshot;

        let mut remote = BTreeMap::new();
        for obj in items {
            match ObjectKey::from_resource(&obj) {
                Some(key) => {
                    remote.insert(key, obj);
                }
                None => error!(resource = %self.config.resource, object = ?obj, "Listed object has no name, skipping"),
            }
        }

        let mut changes = 0;
        for (key, last_known) in self.store.entries() {
            if !remote.contains_key(&key) {
                self.store.remove(&key);
                self.observers.dispatch(&ChangeEvent::Deleted(last_known));
                changes += 1;
            }
        }

        for (key, obj) in remote {
            let new = Arc::new(obj);
            match self.store.get_by_key(&key) {
                Some(old) if *old == *new => {}
                Some(old) => {
                    self.store.insert(key, Arc::clone(&new));
                    self.observers.dispatch(&ChangeEvent::Updated { old, new });
                    changes += 1;
                }
                None => {
                    self.store.insert(key, Arc::clone(&new));
                    self.observers.dispatch(&ChangeEvent::Added(new));
                    changes += 1;
                }
            }
        }

        self.resource_version = resource_version;
        self.observers.dispatch_synced();
        changes
    }

    /// Moves the watch position to `obj`'s version, never backwards when
    /// both versions are numeric.
    fn advance_version(&mut self, obj: &K) {
        let Some(version) = obj.resource_version() else {
            return;
        };
        let behind = match (self.resource_version.parse::<u64>(), version.parse::<u64>()) {
            (Ok(current), Ok(incoming)) => incoming < current,
            _ => false,
        };
        if !behind {
            self.resource_version = version;
        }
    }

    fn new_backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(self.config.backoff_min, self.config.backoff_max)
    }
}

/// Sleeps for `delay`, returning `false` if stop fired first.
async fn sleep_or_stop(delay: Duration, stop: &mut StopSignal) -> bool {
    tokio::select! {
        _ = stop.stopped() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Resource versions are opaque, but the API server hands out integers;
/// compare them only when both parse.
fn is_stale<K: Resource>(cached: &K, incoming: &K) -> bool {
    let parse = |obj: &K| obj.meta().resource_version.as_deref()?.parse::<u64>().ok();
    match (parse(cached), parse(incoming)) {
        (Some(cached), Some(incoming)) => incoming < cached,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{pod, MockResourceClient, Recorded, RecordingObserver};
    use k8s_openapi::api::core::v1::Pod;

    fn keys(store: &Store<Pod>) -> Vec<String> {
        store.list_keys().iter().map(ToString::to_string).collect()
    }

    fn mirror_with(
        client: MockResourceClient<Pod>,
    ) -> (Mirror<Pod, MockResourceClient<Pod>>, Arc<RecordingObserver<Pod>>) {
        let config = MirrorConfig::new("pods").backoff(Duration::from_millis(1), Duration::from_millis(5));
        let mut mirror = Mirror::new(client, config);
        let recorder = Arc::new(RecordingObserver::new());
        mirror.register("recorder", recorder.clone());
        (mirror, recorder)
    }

    #[tokio::test]
    async fn test_start_emits_adds_then_synced() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1"), pod("default", "b", "2")]);
        let (mut mirror, recorder) = mirror_with(client);

        mirror.start().await.unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                Recorded::Added(pod("default", "a", "1")),
                Recorded::Added(pod("default", "b", "2")),
                Recorded::Synced,
            ]
        );
        assert_eq!(keys(&mirror.store()), vec!["default/a", "default/b"]);
    }

    #[tokio::test]
    async fn test_start_retries_then_fails() {
        let client = MockResourceClient::<Pod>::new();
        client.fail_next_lists(3);
        let config = MirrorConfig::new("pods")
            .initial_list_attempts(3)
            .backoff(Duration::from_millis(1), Duration::from_millis(5));
        let mut mirror = Mirror::new(client.clone(), config);
        let recorder = Arc::new(RecordingObserver::new());
        mirror.register("recorder", recorder.clone());

        let err = mirror.start().await.unwrap_err();

        assert!(matches!(err, InformerError::InitialList { attempts: 3, .. }));
        assert_eq!(client.list_calls(), 3);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_start_succeeds_after_transient_failures() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1")]);
        client.fail_next_lists(2);
        let (mut mirror, recorder) = mirror_with(client.clone());

        mirror.start().await.unwrap();

        assert_eq!(client.list_calls(), 3);
        assert_eq!(recorder.events().last(), Some(&Recorded::Synced));
    }

    #[tokio::test]
    async fn test_modify_and_delete_scenario() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1"), pod("default", "b", "2")]);
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Modified(pod("default", "b", "3")));
        assert_eq!(
            recorder.take(),
            vec![Recorded::Updated(pod("default", "b", "2"), pod("default", "b", "3"))]
        );
        let store = mirror.store();
        assert_eq!(store.get("default/b").as_deref(), Some(&pod("default", "b", "3")));

        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Full(pod("default", "a", "4"))));
        assert_eq!(recorder.take(), vec![Recorded::Deleted(pod("default", "a", "4"))]);
        assert_eq!(keys(&store), vec!["default/b"]);
        assert_eq!(mirror.resource_version(), "4");
    }

    #[tokio::test]
    async fn test_duplicate_and_stale_events_are_ignored() {
        let client = MockResourceClient::with_objects([pod("default", "a", "5")]);
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Modified(pod("default", "a", "5")));
        mirror.handle_event(RemoteEvent::Added(pod("default", "a", "5")));
        mirror.handle_event(RemoteEvent::Modified(pod("default", "a", "4")));

        assert!(recorder.events().is_empty());
        assert_eq!(mirror.store().get("default/a").as_deref(), Some(&pod("default", "a", "5")));
        assert_eq!(mirror.store().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_delete_keeps_newer_object() {
        let client = MockResourceClient::with_objects([pod("default", "a", "5")]);
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();
        let listed_version = mirror.resource_version().to_string();

        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Full(pod("default", "a", "3"))));

        assert!(recorder.events().is_empty());
        assert_eq!(mirror.store().get("default/a").as_deref(), Some(&pod("default", "a", "5")));
        assert_eq!(mirror.resource_version(), listed_version);

        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Full(pod("default", "a", "6"))));
        assert_eq!(recorder.take(), vec![Recorded::Deleted(pod("default", "a", "6"))]);
        assert_eq!(mirror.resource_version(), "6");
    }

    #[tokio::test]
    async fn test_resource_version_never_moves_backwards() {
        let client = MockResourceClient::<Pod>::new();
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();
        mirror.handle_event(RemoteEvent::Bookmark("10".to_string()));

        // An object older than the watch position is still cached
        mirror.handle_event(RemoteEvent::Added(pod("default", "late", "7")));

        assert_eq!(recorder.take(), vec![Recorded::Added(pod("default", "late", "7"))]);
        assert_eq!(mirror.resource_version(), "10");

        mirror.handle_event(RemoteEvent::Modified(pod("default", "late", "11")));
        assert_eq!(mirror.resource_version(), "11");
    }

    #[tokio::test]
    async fn test_zero_resync_interval_is_rejected() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1")]);
        let mut mirror = Mirror::new(
            client.clone(),
            MirrorConfig::new("pods").resync_interval(Duration::ZERO),
        );

        let err = mirror.start().await.unwrap_err();
        assert!(matches!(err, InformerError::InvalidConfig(_)));
        assert_eq!(client.list_calls(), 0);

        // Without a successful start the loop refuses to run
        let (_stop, signal) = crate::stop::stop_channel();
        assert!(matches!(mirror.run(signal).await, Err(InformerError::NotStarted(_))));
    }

    #[tokio::test]
    async fn test_added_event_for_cached_key_is_an_update() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1")]);
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Added(pod("default", "a", "2")));

        assert_eq!(
            recorder.take(),
            vec![Recorded::Updated(pod("default", "a", "1"), pod("default", "a", "2"))]
        );
    }

    #[tokio::test]
    async fn test_tombstone_recovers_last_known_state() {
        let client = MockResourceClient::with_objects([pod("default", "a", "7")]);
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Tombstone(ObjectKey::namespaced(
            "default", "a",
        ))));

        assert_eq!(recorder.take(), vec![Recorded::Deleted(pod("default", "a", "7"))]);
        assert!(mirror.store().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tombstone_is_skipped() {
        let client = MockResourceClient::<Pod>::new();
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Tombstone(ObjectKey::namespaced(
            "default", "ghost",
        ))));
        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Full(pod("default", "ghost", "3"))));

        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_nameless_objects_are_dropped() {
        let client = MockResourceClient::<Pod>::new();
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Added(Pod::default()));
        mirror.handle_event(RemoteEvent::Deleted(DeletedObject::Full(Pod::default())));

        assert!(recorder.events().is_empty());
        assert!(mirror.store().is_empty());
    }

    #[tokio::test]
    async fn test_resync_reconciles_and_is_idempotent() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1"), pod("default", "b", "2")]);
        let (mut mirror, recorder) = mirror_with(client.clone());
        mirror.start().await.unwrap();
        recorder.take();

        // Changes the watch never reported
        client.remove_remote(&ObjectKey::namespaced("default", "a"));
        client.set_remote(pod("default", "b", "5"));
        client.set_remote(pod("default", "c", "6"));

        mirror.resync().await.unwrap();
        assert_eq!(
            recorder.take(),
            vec![
                Recorded::Deleted(pod("default", "a", "1")),
                Recorded::Updated(pod("default", "b", "2"), pod("default", "b", "5")),
                Recorded::Added(pod("default", "c", "6")),
                Recorded::Synced,
            ]
        );

        mirror.resync().await.unwrap();
        assert_eq!(recorder.take(), vec![Recorded::Synced]);
        assert_eq!(keys(&mirror.store()), vec!["default/b", "default/c"]);
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_cache() {
        let client = MockResourceClient::with_objects([pod("default", "a", "1")]);
        let (mut mirror, recorder) = mirror_with(client.clone());
        mirror.start().await.unwrap();
        recorder.take();

        client.fail_next_lists(1);
        client.remove_remote(&ObjectKey::namespaced("default", "a"));

        assert!(mirror.resync().await.is_err());
        assert!(recorder.events().is_empty());
        assert_eq!(keys(&mirror.store()), vec!["default/a"]);
    }

    #[tokio::test]
    async fn test_bookmark_advances_resource_version() {
        let client = MockResourceClient::<Pod>::new();
        let (mut mirror, recorder) = mirror_with(client);
        mirror.start().await.unwrap();
        recorder.take();

        mirror.handle_event(RemoteEvent::Bookmark("42".to_string()));

        assert_eq!(mirror.resource_version(), "42");
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_run_requires_start() {
        let (mirror, _recorder) = mirror_with(MockResourceClient::<Pod>::new());
        let (_stop, signal) = crate::stop::stop_channel();

        let err = mirror.run(signal).await.unwrap_err();
        assert!(matches!(err, InformerError::NotStarted(_)));
    }

    #[test]
    fn test_stale_comparison_needs_numeric_versions() {
        assert!(is_stale(&pod("d", "a", "10"), &pod("d", "a", "9")));
        assert!(!is_stale(&pod("d", "a", "9"), &pod("d", "a", "10")));
        assert!(!is_stale(&pod("d", "a", "abc"), &pod("d", "a", "1")));
    }
}
