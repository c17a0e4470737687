use std::sync::Arc;
use std::time::Instant;

use reqwest::header::HeaderName;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    config::{Config, ConfigLocation, read_config},
    credential::Credential,
    decorator::decorate,
    errors::Error,
    refresh::{RefreshCoordinator, RefreshEndpoint, RefreshState, RetryDecision},
    request::OutboundRequest,
    request_context::CallContext,
    retry::{self, RetryOutcome},
    session::SessionEvent,
    transport::Transport,
};

mod builder;

pub use builder::SessionClientBuilder;

/// HTTP client that attaches session credentials and recovers from expired access tokens.
///
/// Cloning is cheap; every clone shares one [`RefreshCoordinator`], so
/// concurrent calls from any clone trigger at most one refresh.
pub struct SessionClient<T: Transport = reqwest::Client> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for SessionClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T> {
    config: Config,
    transport: T,
    coordinator: RefreshCoordinator,
    refresh: RefreshEndpoint,
    csrf_header: HeaderName,
}

impl SessionClient<reqwest::Client> {
    /// Client with an in-memory credential store and cookie-backed CSRF source.
    pub fn new(config: Config) -> Result<Self, Error> {
        SessionClient::builder(config)?.build()
    }

    /// Loads the config from `location`, then builds as [`SessionClient::new`] does.
    /// # ENV Vars (when using `ConfigLocation::Env`)
    /// * `SESSION_API_BASE_URL` - base URL every request path is resolved against
    /// * `SESSION_REFRESH_PATH` - optional, defaults to `/auth/refresh-token`
    /// * `SESSION_LOGOUT_PATH` - optional, defaults to `/auth/logout`
    /// * `SESSION_CSRF_COOKIE` - optional, defaults to `XSRF-TOKEN`
    /// * `SESSION_CSRF_HEADER` - optional, defaults to `X-XSRF-TOKEN`
    /// * `SESSION_REQUEST_TIMEOUT_SECS` - optional, defaults to 30
    pub fn from_location(location: ConfigLocation) -> Result<Self, Error> {
        Self::new(read_config(location)?)
    }

    pub fn builder(config: Config) -> Result<SessionClientBuilder<reqwest::Client>, Error> {
        SessionClientBuilder::new(config)
    }
}

impl<T: Transport> SessionClient<T> {
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.coordinator.state()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.coordinator.snapshot().credential
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.coordinator.events().subscribe()
    }

    /// Starts a request against `path`, resolved relative to the configured base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<OutboundRequest, Error> {
        let url = self.inner.config.endpoint(path)?;
        Ok(OutboundRequest::new(method, url))
    }

    pub async fn get(&self, path: &str) -> Result<Response, Error> {
        self.send(self.request(Method::GET, path)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, Error> {
        self.send(self.request(Method::DELETE, path)?).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.send(self.request(Method::POST, path)?.json(body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.send(self.request(Method::PUT, path)?.json(body)?).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.send(self.request(Method::PATCH, path)?.json(body)?).await
    }

    /// Sends `request` with the current credentials attached.
    ///
    /// Any status other than 401 comes back as `Ok(response)` untouched. A 401
    /// goes through the refresh coordinator and, if a new credential is
    /// issued, the request is resent exactly once.
    pub async fn send(&self, request: OutboundRequest) -> Result<Response, Error> {
        let inner = &self.inner;
        let started = Instant::now();
        let mut ctx = CallContext::new(request);

        let snapshot = inner.coordinator.snapshot();
        ctx.observe_generation(snapshot.generation);
        let csrf = inner.coordinator.csrf_token();
        let outbound = decorate(
            ctx.request(),
            snapshot.credential.as_ref(),
            csrf.as_ref(),
            &inner.csrf_header,
        );
        let mut attempts: u8 = 1;
        let mut response = inner.transport.execute(outbound).await?;

        loop {
            if response.status() != StatusCode::UNAUTHORIZED {
                self.outcome(&ctx, attempts, Some(response.status()), true, started)
                    .log();
                return Ok(response);
            }

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                call_id = %ctx.id(),
                method = %ctx.request().method(),
                path = ctx.request().url().path(),
                retried = ctx.retried(),
                "request got 401 unauthorized"
            );
            let original = Error::Unauthorized { status, body };
            let decision = inner
                .coordinator
                .handle_unauthorized(&mut ctx, original, |token| async move {
                    inner.refresh.call(&inner.transport, &token).await
                })
                .await;

            match decision {
                RetryDecision::Retry(credential) => {
                    attempts += 1;
                    let csrf = inner.coordinator.csrf_token();
                    let resent = retry::resend(
                        &inner.transport,
                        &ctx,
                        &credential,
                        csrf.as_ref(),
                        &inner.csrf_header,
                    )
                    .await;
                    response = match resent {
                        Ok(response) => response,
                        Err(err) => {
                            self.outcome(&ctx, attempts, None, false, started).log();
                            return Err(err.into());
                        }
                    };
                }
                RetryDecision::Fail(err) => {
                    self.outcome(&ctx, attempts, Some(status), false, started)
                        .log();
                    return Err(err);
                }
            }
        }
    }

    /// Stores a credential obtained out of band, e.g. from a login response.
    pub fn sign_in(&self, credential: impl Into<Credential>) {
        self.inner.coordinator.sign_in(credential.into());
    }

    /// Tells the server the session is over, then clears local credentials.
    ///
    /// The server call is best effort; local state is cleared and the
    /// session notification emitted whatever it returns.
    pub async fn sign_out(&self) {
        let inner = &self.inner;
        if let Some(credential) = inner.coordinator.snapshot().credential {
            match self.logout_call(&credential).await {
                Ok(status) => debug!(status = %status, "logout call finished"),
                Err(err) => warn!(error = %err, "logout call failed; clearing locally"),
            }
        }
        inner.coordinator.sign_out();
    }

    async fn logout_call(&self, credential: &Credential) -> Result<StatusCode, Error> {
        let inner = &self.inner;
        let request = self
            .request(Method::POST, &inner.config.logout_path)?
            .json(&serde_json::json!({ "token": credential.value() }))?;
        let csrf = inner.coordinator.csrf_token();
        let outbound = decorate(&request, Some(credential), csrf.as_ref(), &inner.csrf_header);
        let response = inner.transport.execute(outbound).await?;
        Ok(response.status())
    }

    /// Re-establishes a session from the anti-forgery cookie alone.
    ///
    /// Returns `Ok(true)` when a credential is held afterwards, `Ok(false)`
    /// when there was nothing to restore from. Shares the single refresh
    /// flight with any 401 recovery running at the same time.
    pub async fn restore_session(&self) -> Result<bool, Error> {
        let inner = &self.inner;
        if inner.coordinator.snapshot().credential.is_some() {
            return Ok(true);
        }
        let restored = inner
            .coordinator
            .refresh_now(|token| async move { inner.refresh.call(&inner.transport, &token).await })
            .await?;
        Ok(restored.is_some())
    }

    fn outcome(
        &self,
        ctx: &CallContext,
        attempts: u8,
        status: Option<StatusCode>,
        success: bool,
        started: Instant,
    ) -> RetryOutcome {
        RetryOutcome {
            call_id: ctx.id(),
            method: ctx.request().method().clone(),
            path: ctx.request().url().path().to_string(),
            attempts,
            retried: ctx.retried(),
            status,
            success,
            elapsed: started.elapsed(),
        }
    }
}
