//! Prometheus metrics fed by mirror observers.

use informer::{ResourceObserver, Store};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Metric families shared by every mirror, and the registry that exposes them.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    events: IntCounterVec,
    syncs: IntCounterVec,
    cached: IntGaugeVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create the metric families and register them.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let events = IntCounterVec::new(
            Opts::new("mirror_events_total", "Changes delivered to observers"),
            &["resource", "event"],
        )?;
        let syncs = IntCounterVec::new(
            Opts::new("mirror_syncs_total", "Completed full lists (initial and resync)"),
            &["resource"],
        )?;
        let cached = IntGaugeVec::new(
            Opts::new("mirror_cached_objects", "Objects currently held in the cache"),
            &["resource"],
        )?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(syncs.clone()))?;
        registry.register(Box::new(cached.clone()))?;
        Ok(Self {
            registry,
            events,
            syncs,
            cached,
        })
    }

    /// Observer recording the changes of one mirror.
    pub fn observer<K>(&self, resource: &str, store: Store<K>) -> MirrorMetrics<K> {
        MirrorMetrics {
            resource: resource.to_string(),
            metrics: self.clone(),
            store,
        }
    }

    /// Render every metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Counts the changes of one mirror and tracks its cache size.
#[derive(Debug)]
pub struct MirrorMetrics<K> {
    resource: String,
    metrics: Metrics,
    store: Store<K>,
}

impl<K> MirrorMetrics<K> {
    fn record(&self, event: &str) {
        self.metrics
            .events
            .with_label_values(&[self.resource.as_str(), event])
            .inc();
        self.update_size();
    }

    fn update_size(&self) {
        let size = i64::try_from(self.store.len()).unwrap_or(i64::MAX);
        self.metrics
            .cached
            .with_label_values(&[self.resource.as_str()])
            .set(size);
    }
}

impl<K: Send + Sync> ResourceObserver<K> for MirrorMetrics<K> {
    fn on_add(&self, _obj: &K) {
        self.record("added");
    }

    fn on_update(&self, _old: &K, _new: &K) {
        self.record("updated");
    }

    fn on_delete(&self, _obj: &K) {
        self.record("deleted");
    }

    fn on_synced(&self) {
        self.metrics
            .syncs
            .with_label_values(&[self.resource.as_str()])
            .inc();
        self.update_size();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use informer::mock::{pod, MockResourceClient};
    use informer::{Mirror, MirrorConfig, RemoteEvent};
    use k8s_openapi::api::core::v1::Pod;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counts_mirror_changes() {
        let metrics = Metrics::new().unwrap();
        let client = MockResourceClient::with_objects([pod("default", "a", "1"), pod("default", "b", "2")]);
        let mut mirror = Mirror::new(client, MirrorConfig::new("pods"));
        mirror.register("metrics", Arc::new(metrics.observer::<Pod>("pods", mirror.store())));

        mirror.start().await.unwrap();
        mirror.handle_event(RemoteEvent::Modified(pod("default", "a", "3")));

        let count = |event: &str| metrics.events.with_label_values(&["pods", event]).get();
        assert_eq!(count("added"), 2);
        assert_eq!(count("updated"), 1);
        assert_eq!(count("deleted"), 0);
        assert_eq!(metrics.syncs.with_label_values(&["pods"]).get(), 1);
        assert_eq!(metrics.cached.with_label_values(&["pods"]).get(), 2);

        let text = metrics.render().unwrap();
        assert!(text.contains("mirror_events_total"));
        assert!(text.contains("mirror_cached_objects"));
    }
}
