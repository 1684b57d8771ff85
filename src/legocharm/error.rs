//! Errors returned by the LegoCharm API client

use reqwest::StatusCode;

/// Result alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced while talking to the LegoCharm API
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0} is required")]
    MissingSetting(&'static str),

    #[error("invalid address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid LEGOCHARM_API_TIMEOUT {0:?}: expected a duration such as \"30s\" or a number of seconds")]
    InvalidTimeout(String),

    #[error("failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("failed to execute request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("not found")]
    NotFound,

    #[error("unexpected status {status}, body: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to parse {what} response: {source} (body: {body})")]
    Decode {
        what: &'static str,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedProbeStatus(StatusCode),
}

impl ClientError {
    /// True when the remote service reported that the entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}
