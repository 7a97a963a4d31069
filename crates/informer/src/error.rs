//! Informer errors

use thiserror::Error;

/// HTTP status the API server uses when a watch resource version is too old.
const GONE: u16 = 410;

/// Errors that can occur while mirroring a remote resource collection
#[derive(Debug, Error)]
pub enum InformerError {
    /// Kubernetes API or transport error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),

    /// An event payload did not have the expected shape
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// The resource version the watch was started from is no longer available
    #[error("Resource version expired: {0}")]
    Expired(String),

    /// The watch stream reported an error
    #[error("Watch failed: {0}")]
    Watch(String),

    /// The initial list never succeeded, so the mirror cannot start
    #[error("Initial list of {resource} failed after {attempts} attempts: {source}")]
    InitialList {
        resource: String,
        attempts: u32,
        #[source]
        source: Box<InformerError>,
    },

    /// `run` was called before a successful `start`
    #[error("Mirror for {0} was run before it was started")]
    NotStarted(String),

    /// The mirror was configured with settings it cannot run with
    #[error("Invalid mirror configuration: {0}")]
    InvalidConfig(String),
}

impl InformerError {
    /// Whether the stream can keep going after this error.
    ///
    /// Malformed payloads are dropped individually; everything else ends the
    /// current watch.
    pub fn is_recoverable_in_stream(&self) -> bool {
        matches!(self, InformerError::Malformed(_))
    }
}

impl From<kube::Error> for InformerError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::SerdeError(e) => InformerError::Malformed(e.to_string()),
            kube::Error::Api(resp) if resp.code == GONE => {
                InformerError::Expired(resp.message.clone())
            }
            other => InformerError::Kube(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_errors_become_malformed() {
        let serde_err = serde_json_error();
        let err = InformerError::from(kube::Error::SerdeError(serde_err));
        assert!(matches!(err, InformerError::Malformed(_)));
        assert!(err.is_recoverable_in_stream());
    }

    #[test]
    fn test_watch_errors_end_the_stream() {
        assert!(!InformerError::Watch("connection reset".to_string()).is_recoverable_in_stream());
        assert!(!InformerError::Expired("too old".to_string()).is_recoverable_in_stream());
    }

    #[test]
    fn test_initial_list_error_message() {
        let err = InformerError::InitialList {
            resource: "pods".to_string(),
            attempts: 3,
            source: Box::new(InformerError::Watch("refused".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Initial list of pods failed after 3 attempts: Watch failed: refused"
        );
    }

    fn serde_json_error() -> serde_json::Error {
        serde_json::from_str::<u32>("not a number").unwrap_err()
    }
}
