use std::time::Duration;

use reqwest::StatusCode;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unauthorized ({status}): {body}")]
    Unauthorized { status: StatusCode, body: String },
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    #[error("session was replaced while a refresh was in flight")]
    SessionSuperseded,
    #[error("timed out after {0:?} waiting for token refresh")]
    Timeout(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }
}

/// Failure of a single refresh call. Cloned once per waiter when a refresh settles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("refresh endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("refresh response rejected: {0}")]
    InvalidResponse(String),
    #[error("refresh abandoned before it settled")]
    Abandoned,
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        RefreshError::Transport(err.to_string())
    }
}
