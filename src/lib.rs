//! HTTP client that keeps a short-lived bearer credential and an anti-forgery
//! token attached to every request, and recovers from credential expiry with a
//! single shared refresh.

mod client;
pub mod config;
pub mod credential;
pub mod csrf;
pub mod decorator;
pub mod errors;
pub mod refresh;
pub mod request;
pub mod request_context;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use client::{SessionClient, SessionClientBuilder};
pub use config::{Config, ConfigLocation};
pub use credential::{Credential, CredentialStore, MemoryCredentialStore};
pub use csrf::{CookieCsrfSource, CsrfSource, CsrfToken, StaticCsrfSource};
pub use errors::{Error, RefreshError, Result};
pub use refresh::{RefreshCoordinator, RefreshState, RetryDecision};
pub use request::OutboundRequest;
pub use session::{ClearReason, SessionEvent, SessionEvents};

#[cfg(test)]
mod tests;
