use crate::{Config, MemoryCredentialStore, SessionClient, StaticCsrfSource};
use std::sync::{Arc, Mutex};
use tracing::subscriber::{DefaultGuard, set_default};
use tracing_subscriber::{Registry, fmt, layer::SubscriberExt};

pub fn base_config(server_uri: &str) -> Config {
    Config::from_values(server_uri, None, None, None, None, Some(5))
}

/// Client against `server_uri` holding `credential`, with a fixed CSRF token.
pub fn session_client(
    server_uri: &str,
    credential: Option<&str>,
    csrf: Option<&str>,
) -> (SessionClient, Arc<StaticCsrfSource>) {
    let store = match credential {
        Some(value) => MemoryCredentialStore::with_credential(value),
        None => MemoryCredentialStore::new(),
    };
    let csrf = Arc::new(StaticCsrfSource::new(csrf));
    let client = SessionClient::builder(base_config(server_uri))
        .expect("builder")
        .credential_store(Arc::new(store))
        .csrf_source(csrf.clone())
        .build()
        .expect("client");
    (client, csrf)
}

struct VecWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl std::io::Write for VecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.lines.lock().unwrap();
        guard.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_subscriber(lines: Arc<Mutex<Vec<String>>>) -> impl tracing::Subscriber + Send + Sync {
    let writer_lines = lines.clone();
    Registry::default().with(
        fmt::Layer::default()
            .with_writer(move || VecWriter {
                lines: writer_lines.clone(),
            })
            .with_target(false)
            .with_level(true)
            .with_ansi(false),
    )
}

pub fn capture_logs() -> (Arc<Mutex<Vec<String>>>, DefaultGuard) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let guard = set_default(make_subscriber(lines.clone()));
    (lines, guard)
}

pub fn drain_logs(lines: Arc<Mutex<Vec<String>>>) -> Vec<String> {
    lines.lock().unwrap().clone()
}
