//! Main controller implementation.
//!
//! The `Controller` builds the pod and node mirrors, waits for both initial
//! lists, then runs the two watch loops, the label notifier and the HTTP
//! shell as background tasks until SIGINT or SIGTERM arrives, or until any
//! of them exits.

use crate::config::Config;
use crate::error::ControllerError;
use crate::handlers::{notify_label_changes, EventLogger, LabelWatcher, Metrics};
use crate::http::{self, AppState};
use informer::{stop_channel, KubeResourceClient, Mirror, MirrorConfig, StopHandle};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

type TaskOutput = (&'static str, Result<(), ControllerError>);

/// Owns every background task and the handles that stop them.
pub struct Controller {
    tasks: JoinSet<TaskOutput>,
    stops: Vec<StopHandle>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Builds both mirrors, performs their initial lists and starts serving.
    ///
    /// Fails if the Kubernetes client cannot be built, if either initial list
    /// never succeeds, or if the HTTP address cannot be bound.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing cluster watch controller");
        let client = kube_client(&config).await?;
        let metrics = Metrics::new()?;

        let mut pods = Mirror::new(
            pod_client(client.clone(), &config),
            MirrorConfig::new("pods")
                .resync_interval(config.pod_resync)
                .initial_list_attempts(config.initial_list_attempts),
        );
        pods.register("event-log", Arc::new(EventLogger::new("pods")));
        pods.register("metrics", Arc::new(metrics.observer("pods", pods.store())));

        let mut nodes = Mirror::new(
            KubeResourceClient::<Node>::all(client),
            MirrorConfig::new("nodes")
                .resync_interval(config.node_resync)
                .initial_list_attempts(config.initial_list_attempts),
        );
        let (label_watcher, label_changes) =
            LabelWatcher::new(config.node_label_key.clone(), config.notify_label_removal);
        nodes.register("event-log", Arc::new(EventLogger::new("nodes")));
        nodes.register("node-labels", Arc::new(label_watcher));
        nodes.register("metrics", Arc::new(metrics.observer("nodes", nodes.store())));

        pods.start().await?;
        nodes.start().await?;

        let listener = TcpListener::bind(config.listen_addr).await?;
        let state = AppState {
            pods: pods.store(),
            nodes: nodes.store(),
            metrics,
        };

        let (pod_stop, pod_signal) = stop_channel();
        let (node_stop, node_signal) = stop_channel();
        let (shell_stop, shell_signal) = stop_channel();

        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        tasks.spawn(async move { ("pod mirror", pods.run(pod_signal).await.map_err(Into::into)) });
        tasks.spawn(async move { ("node mirror", nodes.run(node_signal).await.map_err(Into::into)) });
        let notifier_signal = shell_signal.clone();
        tasks.spawn(async move {
            notify_label_changes(label_changes, notifier_signal).await;
            ("label notifier", Ok(()))
        });
        tasks.spawn(async move {
            (
                "http server",
                http::serve(listener, state, shell_signal).await.map_err(Into::into),
            )
        });

        Ok(Self {
            tasks,
            stops: vec![pod_stop, node_stop, shell_stop],
        })
    }

    /// Runs until SIGINT/SIGTERM or until a background task exits, then
    /// stops everything and waits for every task to finish.
    pub async fn run(self) -> Result<(), ControllerError> {
        let mut signals = ShutdownSignals::new()?;
        self.run_until(async move { signals.recv().await }).await
    }

    async fn run_until(
        mut self,
        shutdown: impl Future<Output = &'static str>,
    ) -> Result<(), ControllerError> {
        info!("Cluster watch controller running");

        let mut result = tokio::select! {
            signal = shutdown => {
                info!(signal, "Received shutdown signal");
                Ok(())
            }
            Some(joined) = self.tasks.join_next() => {
                warn!("Background task exited, shutting down");
                task_outcome(joined)
            }
        };

        for stop in &self.stops {
            stop.stop();
        }

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = task_outcome(joined) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        info!("Cluster watch controller stopped");
        result
    }
}

/// Process signals that request shutdown.
///
/// Handlers are installed on construction, so a signal delivered before the
/// first `recv` is not lost.
struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownSignals {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves with the name of the first signal received.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

fn task_outcome(joined: Result<TaskOutput, JoinError>) -> Result<(), ControllerError> {
    match joined {
        Ok((task, Ok(()))) => {
            info!(task, "Task finished");
            Ok(())
        }
        Ok((task, Err(e))) => {
            error!(task, error = %e, "Task failed");
            Err(e)
        }
        Err(e) => {
            error!(error = %e, "Task panicked or was cancelled");
            Err(ControllerError::Task(e.to_string()))
        }
    }
}

/// Client from the configured credential file, or inferred credentials
/// (in-cluster service account or `~/.kube/config`) when none is set.
async fn kube_client(config: &Config) -> Result<Client, ControllerError> {
    match &config.kubeconfig_path {
        Some(path) => {
            info!(path = %path.display(), "Loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)?;
            let client_config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
            Ok(Client::try_from(client_config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

fn pod_client(client: Client, config: &Config) -> KubeResourceClient<Pod> {
    let pods = match &config.watch_namespace {
        Some(namespace) => KubeResourceClient::namespaced(client, namespace),
        None => KubeResourceClient::all(client),
    };
    match &config.pod_label_selector {
        Some(selector) => pods.with_label_selector(selector),
        None => pods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use informer::mock::{pod, MockResourceClient};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    async fn running_mirror(tasks: &mut JoinSet<TaskOutput>) -> (StopHandle, MockResourceClient<Pod>) {
        let client = MockResourceClient::with_objects([pod("default", "a", "1")]);
        let mut mirror = Mirror::new(client.clone(), MirrorConfig::new("pods"));
        mirror.start().await.unwrap();
        let (stop, signal) = stop_channel();
        tasks.spawn(async move { ("pod mirror", mirror.run(signal).await.map_err(Into::into)) });
        tokio::time::timeout(WAIT, client.wait_for_watches(1)).await.unwrap();
        (stop, client)
    }

    #[tokio::test]
    async fn test_shutdown_stops_and_awaits_every_task() {
        let mut tasks = JoinSet::new();
        let (stop, _client) = running_mirror(&mut tasks).await;
        let controller = Controller {
            tasks,
            stops: vec![stop],
        };

        let result = tokio::time::timeout(WAIT, controller.run_until(async { "SIGTERM" }))
            .await
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failed_task_stops_the_others() {
        let mut tasks = JoinSet::new();
        let (stop, _client) = running_mirror(&mut tasks).await;
        tasks.spawn(async {
            (
                "http server",
                Err(ControllerError::InvalidConfig("address in use".to_string())),
            )
        });
        let controller = Controller {
            tasks,
            stops: vec![stop],
        };

        let result = tokio::time::timeout(WAIT, controller.run_until(std::future::pending()))
            .await
            .unwrap();
        assert!(matches!(result, Err(ControllerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_sigterm_requests_shutdown() {
        let mut signals = ShutdownSignals::new().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(WAIT, signals.recv()).await.unwrap();
        assert_eq!(received, "SIGTERM");
    }
}
