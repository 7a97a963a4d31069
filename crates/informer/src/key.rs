//! Object keys.
//!
//! Cached objects are identified by `(namespace, name)`. Cluster-scoped
//! resources such as nodes carry no namespace.

use kube::{Resource, ResourceExt};
use std::fmt;
use std::str::FromStr;

/// Composite identity of a cached object.
///
/// Renders as `namespace/name`, or just `name` for cluster-scoped objects.
/// Keys order by namespace first, cluster-scoped keys sorting before all
/// namespaced ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    /// Key for a namespaced object. An empty namespace yields a cluster-scoped key.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: (!namespace.is_empty()).then_some(namespace),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Derive the key of a Kubernetes object.
    ///
    /// Returns `None` when the object carries no name, which never happens
    /// for objects served by the API server.
    pub fn from_resource<K: Resource>(obj: &K) -> Option<Self> {
        let name = obj.meta().name.as_deref().filter(|n| !n.is_empty())?;
        Some(Self::namespaced(obj.namespace().unwrap_or_default(), name))
    }

    /// Namespace, `None` for cluster-scoped objects.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Object name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Error returned when a string is not a valid object key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object key: {0:?}")]
pub struct ParseKeyError(String);

impl FromStr for ObjectKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.split_once('/') {
            Some((ns, name)) if !name.contains('/') => Self::namespaced(ns, name),
            Some(_) => return Err(ParseKeyError(s.to_string())),
            None => Self::cluster(s),
        };
        if parsed.name.is_empty() {
            return Err(ParseKeyError(s.to_string()));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Node, Pod};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_display_namespaced_and_cluster_keys() {
        assert_eq!(ObjectKey::namespaced("default", "a").to_string(), "default/a");
        assert_eq!(ObjectKey::cluster("n1").to_string(), "n1");
        assert_eq!(ObjectKey::namespaced("", "n1"), ObjectKey::cluster("n1"));
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("default/b".parse(), Ok(ObjectKey::namespaced("default", "b")));
        assert_eq!("n1".parse(), Ok(ObjectKey::cluster("n1")));
        assert!("a/b/c".parse::<ObjectKey>().is_err());
        assert!("default/".parse::<ObjectKey>().is_err());
        assert!("".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn test_key_from_resources() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let node = Node {
            metadata: ObjectMeta {
                name: Some("n1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ObjectKey::from_resource(&pod), Some(ObjectKey::namespaced("prod", "web")));
        assert_eq!(ObjectKey::from_resource(&node), Some(ObjectKey::cluster("n1")));
        assert_eq!(ObjectKey::from_resource(&Pod::default()), None);
    }

    #[test]
    fn test_cluster_keys_sort_first() {
        let mut keys = vec![
            ObjectKey::namespaced("default", "b"),
            ObjectKey::cluster("z"),
            ObjectKey::namespaced("default", "a"),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["z", "default/a", "default/b"]);
    }
}
