use std::time::Duration;

use thiserror::Error;

/// Failure of a single remote operation against one access point.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The ssh client could not be started.
    #[error("failed to start remote session to {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error talking to {host}: {source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Covers unreachable hosts and rejected credentials as well, since the
    /// ssh client reports those through its exit status.
    #[error("remote command on {host} exited with {code:?}: {stderr}")]
    ExitStatus {
        host: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("remote command on {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },
}

/// Reasons an inbound command is not executed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed topic {0:?}")]
    MalformedTopic(String),

    #[error("unknown device {0:?}")]
    UnknownDevice(String),

    #[error("unknown attribute {suffix:?} for device {device:?}")]
    UnknownAttribute { device: String, suffix: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
