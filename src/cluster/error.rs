use thiserror::Error;

/// Failures reported by a [`ClusterAccess`](super::ClusterAccess) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
}

impl ClusterError {
    /// True for the distinct "not found" condition that triggers the create fallback
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        ClusterError::Transport(err.to_string())
    }
}
