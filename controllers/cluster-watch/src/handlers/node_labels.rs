//! Reports changes of one node label.
//!
//! The watcher filters raw node events down to changes of a single label
//! and hands them to a notifier task over a channel, so the mirror's
//! dispatch never waits on the notification itself.

use informer::{ResourceObserver, StopSignal};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// A change of the watched label on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelChange {
    /// The label was set on a node that did not carry it.
    Appeared { node: String, value: String },
    /// The label value changed.
    Changed { node: String, old: String, new: String },
    /// The label was removed.
    Removed { node: String, old: String },
}

/// Observer that signals when a node label appears, changes or disappears.
#[derive(Debug)]
pub struct LabelWatcher {
    key: String,
    notify_removal: bool,
    tx: UnboundedSender<LabelChange>,
}

impl LabelWatcher {
    /// Create a watcher for `key` and the receiving end of its signals.
    pub fn new(key: impl Into<String>, notify_removal: bool) -> (Self, UnboundedReceiver<LabelChange>) {
        let (tx, rx) = unbounded_channel();
        let watcher = Self {
            key: key.into(),
            notify_removal,
            tx,
        };
        (watcher, rx)
    }

    fn label<'a>(&self, node: &'a Node) -> Option<&'a str> {
        node.labels().get(&self.key).map(String::as_str)
    }

    fn classify(&self, node: String, old: Option<&str>, new: Option<&str>) -> Option<LabelChange> {
        match (old, new) {
            (None, Some(value)) => Some(LabelChange::Appeared {
                node,
                value: value.to_string(),
            }),
            (Some(old), Some(new)) if old != new => Some(LabelChange::Changed {
                node,
                old: old.to_string(),
                new: new.to_string(),
            }),
            (Some(old), None) if self.notify_removal => Some(LabelChange::Removed {
                node,
                old: old.to_string(),
            }),
            _ => None,
        }
    }

    fn emit(&self, change: LabelChange) {
        if self.tx.send(change).is_err() {
            debug!(label = %self.key, "Label notifier gone, dropping change");
        }
    }
}

impl ResourceObserver<Node> for LabelWatcher {
    fn on_add(&self, node: &Node) {
        debug!(node = %node.name_any(), labels = ?node.labels(), "Node added");
        if let Some(change) = self.classify(node.name_any(), None, self.label(node)) {
            self.emit(change);
        }
    }

    fn on_update(&self, old: &Node, new: &Node) {
        if let Some(change) = self.classify(new.name_any(), self.label(old), self.label(new)) {
            self.emit(change);
        }
    }

    // A deleted node takes its labels with it; nothing to report
    fn on_delete(&self, _node: &Node) {}
}

/// Consume label changes until the channel closes or `stop` fires.
pub async fn notify_label_changes(mut rx: UnboundedReceiver<LabelChange>, mut stop: StopSignal) {
    loop {
        let change = tokio::select! {
            _ = stop.stopped() => break,
            change = rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };
        match change {
            LabelChange::Appeared { node, value } => {
                info!(%node, %value, "send message: node label created");
            }
            LabelChange::Changed { node, old, new } => {
                info!(%node, %old, %new, "send message: node label updated");
            }
            LabelChange::Removed { node, old } => {
                info!(%node, %old, "send message: node label removed");
            }
        }
    }
    debug!("Label notifier stopped");
}
