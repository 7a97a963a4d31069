//! Observers registered on the controller's mirrors.

mod event_log;
mod metrics;
mod node_labels;

pub use event_log::EventLogger;
pub use metrics::{Metrics, MirrorMetrics};
pub use node_labels::{notify_label_changes, LabelChange, LabelWatcher};
