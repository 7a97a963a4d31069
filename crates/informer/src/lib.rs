//! Informer
//!
//! An event-driven local mirror of a remote Kubernetes resource collection.
//!
//! A [`Mirror`] performs an initial list of a resource type, follows the
//! change stream from that snapshot's resource version, keeps a keyed
//! [`Store`] consistent with the cluster, and republishes normalized
//! add/update/delete notifications to registered [`ResourceObserver`]s.
//! A periodic resync re-lists the collection and reconciles the cache
//! against the authoritative snapshot, healing any events missed while the
//! watch was disconnected.
//!
//! # Example
//!
//! ```no_run
//! use informer::{stop_channel, KubeResourceClient, Mirror, MirrorConfig};
//! use k8s_openapi::api::core::v1::Pod;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let pods = KubeResourceClient::<Pod>::namespaced(client, "default");
//!
//! let mut mirror = Mirror::new(pods, MirrorConfig::new("pods"));
//! let store = mirror.store();
//! mirror.start().await?;
//!
//! let (stop, signal) = stop_channel();
//! let task = tokio::spawn(mirror.run(signal));
//!
//! println!("cached pods: {:?}", store.list_keys());
//!
//! stop.stop();
//! task.await??;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Event application and observer dispatch are serialized per mirror: the
//! mirror is the single writer of its store and observers never see two
//! events for the same resource type concurrently. Readers holding a
//! [`Store`] handle may run concurrently with the mirror and always observe
//! fully applied mutations.

pub mod backoff;
pub mod client;
pub mod error;
pub mod event;
pub mod key;
pub mod kube_client;
pub mod mirror;
pub mod observer;
pub mod stop;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use backoff::FibonacciBackoff;
pub use client::{ResourceClient, WatchStream};
pub use error::InformerError;
pub use event::{ChangeEvent, DeletedObject, ListSnapshot, RemoteEvent};
pub use key::ObjectKey;
pub use kube_client::KubeResourceClient;
pub use mirror::{Mirror, MirrorConfig, MirrorObject};
pub use observer::{ObserverRegistry, ResourceObserver};
pub use stop::{stop_channel, StopHandle, StopSignal};
pub use store::Store;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockResourceClient, Recorded, RecordingObserver};
