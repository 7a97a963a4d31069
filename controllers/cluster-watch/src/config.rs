//! Controller configuration, read once from the environment at startup.

use crate::error::ControllerError;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Namespace value meaning "every namespace".
const ALL_NAMESPACES: &str = "*";

/// Settings for the whole controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Credential file; `None` means inferred or in-cluster credentials.
    pub kubeconfig_path: Option<PathBuf>,
    /// Bind address of the HTTP shell.
    pub listen_addr: SocketAddr,
    /// Namespace of the pod mirror; `None` mirrors all namespaces.
    pub watch_namespace: Option<String>,
    /// Label selector narrowing the pod mirror.
    pub pod_label_selector: Option<String>,
    /// Pod resync period.
    pub pod_resync: Duration,
    /// Node resync period.
    pub node_resync: Duration,
    /// Node label the label watcher reports on.
    pub node_label_key: String,
    /// Also report when the watched label disappears.
    pub notify_label_removal: bool,
    /// Attempts for each initial list before startup fails.
    pub initial_list_attempts: u32,
}

impl Config {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        let cwd = std::env::current_dir()?;
        Self::from_lookup(|key| std::env::var(key).ok(), &cwd)
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// A relative `KUBECONFIG_PATH` is resolved against `cwd`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cwd: &Path,
    ) -> Result<Self, ControllerError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let kubeconfig_path = non_empty("KUBECONFIG_PATH").map(|p| cwd.join(p));
        let watch_namespace = match non_empty("WATCH_NAMESPACE") {
            Some(ns) if ns == ALL_NAMESPACES => None,
            Some(ns) => Some(ns),
            None => Some("default".to_string()),
        };

        Ok(Self {
            kubeconfig_path,
            listen_addr: parse(&non_empty, "LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            watch_namespace,
            pod_label_selector: non_empty("POD_LABEL_SELECTOR"),
            pod_resync: parse_period(&non_empty, "POD_RESYNC_SECS", 60)?,
            node_resync: parse_period(&non_empty, "NODE_RESYNC_SECS", 10)?,
            node_label_key: non_empty("NODE_LABEL_KEY").unwrap_or_else(|| "marwin".to_string()),
            notify_label_removal: parse(&non_empty, "NODE_LABEL_NOTIFY_REMOVAL", true)?,
            initial_list_attempts: parse(&non_empty, "INITIAL_LIST_ATTEMPTS", 5)?,
        })
    }
}

/// Whole seconds, rejecting zero.
fn parse_period(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_secs: u64,
) -> Result<Duration, ControllerError> {
    match parse(lookup, key, default_secs)? {
        0 => Err(ControllerError::InvalidConfig(format!("{key} must be at least 1"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}
