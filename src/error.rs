use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single webhook exchange. Both kinds feed the retry policy.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook returned status {status}")]
    Status { status: u16 },

    #[error("could not decode webhook reply: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transport-class failures: network errors and non-2xx statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Status { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Raised only when the restart request cannot even be issued.
/// Server-side failures of the restart are logged and swallowed.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("invalid restart endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("restart task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}
