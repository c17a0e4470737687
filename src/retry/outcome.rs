use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::Level;
use tracing::event;
use uuid::Uuid;

/// Final tally for one logical call through the session client.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub call_id: Uuid,
    pub method: Method,
    pub path: String,
    pub attempts: u8,
    pub retried: bool,
    pub status: Option<StatusCode>,
    pub success: bool,
    pub elapsed: Duration,
}

impl RetryOutcome {
    pub fn log(&self) {
        let status = self.status.map(|s| s.as_u16()).unwrap_or(0);
        event!(
            Level::INFO,
            call_id = %self.call_id,
            method = %self.method,
            path = %self.path,
            attempts = self.attempts,
            retried = self.retried,
            status,
            success = self.success,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "retry.outcome"
        );
    }
}
