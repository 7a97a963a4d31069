//! Logs every change a mirror delivers.

use informer::{ObjectKey, ResourceObserver};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

/// Logs adds, updates and deletes of one resource type.
#[derive(Debug)]
pub struct EventLogger {
    resource: String,
}

impl EventLogger {
    /// Logger for `resource`, used as the log field value.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

fn describe<K: Resource>(obj: &K) -> String {
    ObjectKey::from_resource(obj).map_or_else(|| "<unnamed>".to_string(), |key| key.to_string())
}

impl<K: Resource> ResourceObserver<K> for EventLogger {
    fn on_add(&self, obj: &K) {
        info!(
            resource = %self.resource,
            key = %describe(obj),
            resource_version = ?obj.resource_version(),
            "Added"
        );
    }

    fn on_update(&self, old: &K, new: &K) {
        info!(
            resource = %self.resource,
            key = %describe(new),
            old_version = ?old.resource_version(),
            new_version = ?new.resource_version(),
            "Updated"
        );
    }

    fn on_delete(&self, obj: &K) {
        info!(resource = %self.resource, key = %describe(obj), "Deleted");
    }

    fn on_synced(&self) {
        debug!(resource = %self.resource, "Synced");
    }
}
