use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::HeaderName;

use crate::{
    SessionClient,
    client::ClientInner,
    config::Config,
    credential::{CredentialStore, MemoryCredentialStore},
    csrf::{CookieCsrfSource, CsrfSource},
    errors::Error,
    refresh::{RefreshCoordinator, RefreshEndpoint},
    session::SessionEvents,
    transport::Transport,
};

/// Assembles a [`SessionClient`] from its collaborators.
///
/// Defaults: an in-memory credential store, a reqwest client with a cookie
/// jar, and a CSRF source reading the configured cookie from that same jar.
/// Swapping the transport keeps the default CSRF source pointed at the
/// builder's jar, so custom transports usually want a custom CSRF source too.
pub struct SessionClientBuilder<T: Transport> {
    config: Config,
    transport: T,
    jar: Arc<Jar>,
    store: Option<Arc<dyn CredentialStore>>,
    csrf: Option<Arc<dyn CsrfSource>>,
    events: Option<SessionEvents>,
}

impl SessionClientBuilder<reqwest::Client> {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let jar = Arc::new(Jar::default());
        let transport = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            config,
            transport,
            jar,
            store: None,
            csrf: None,
            events: None,
        })
    }
}

impl<T: Transport> SessionClientBuilder<T> {
    /// Replaces the transport every request, retry and refresh call goes through.
    pub fn transport<U: Transport>(self, transport: U) -> SessionClientBuilder<U> {
        SessionClientBuilder {
            config: self.config,
            transport,
            jar: self.jar,
            store: self.store,
            csrf: self.csrf,
            events: self.events,
        }
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn csrf_source(mut self, csrf: Arc<dyn CsrfSource>) -> Self {
        self.csrf = Some(csrf);
        self
    }

    /// Shares an existing notification hub instead of creating one.
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// The cookie jar the default transport and default CSRF source share.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    pub fn build(self) -> Result<SessionClient<T>, Error> {
        let config = self.config;
        let csrf_header = HeaderName::from_bytes(config.csrf_header.as_bytes()).map_err(|e| {
            Error::Config(format!("Invalid csrf header '{}': {}", config.csrf_header, e))
        })?;
        let refresh = RefreshEndpoint::from_config(&config)?;
        let store: Arc<dyn CredentialStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let csrf: Arc<dyn CsrfSource> = match self.csrf {
            Some(csrf) => csrf,
            None => Arc::new(CookieCsrfSource::new(
                self.jar,
                config.base()?,
                config.csrf_cookie.clone(),
            )),
        };
        let coordinator = RefreshCoordinator::new(
            store,
            csrf,
            self.events.unwrap_or_default(),
            config.request_timeout(),
        );
        Ok(SessionClient {
            inner: Arc::new(ClientInner {
                config,
                transport: self.transport,
                coordinator,
                refresh,
                csrf_header,
            }),
        })
    }
}
