#![allow(dead_code)]

use std::sync::Arc;

use session_client::{
    ClearReason, Config, MemoryCredentialStore, SessionClient, SessionEvent, StaticCsrfSource,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use wiremock::MockServer;

pub const REFRESH_PATH: &str = "/auth/refresh-token";

pub fn config(server: &MockServer) -> Config {
    Config::from_values(server.uri(), None, None, None, None, Some(5))
}

pub fn client(server: &MockServer, credential: Option<&str>, csrf: Option<&str>) -> SessionClient {
    let store = match credential {
        Some(value) => MemoryCredentialStore::with_credential(value),
        None => MemoryCredentialStore::new(),
    };
    SessionClient::builder(config(server))
        .expect("builder")
        .credential_store(Arc::new(store))
        .csrf_source(Arc::new(StaticCsrfSource::new(csrf)))
        .build()
        .expect("client")
}

/// Drains everything buffered on `rx` and returns the `Cleared` events seen.
pub fn cleared_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<ClearReason> {
    let mut cleared = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(SessionEvent::Cleared(reason)) => cleared.push(reason),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return cleared,
        }
    }
}

pub async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == REFRESH_PATH)
        .count()
}
