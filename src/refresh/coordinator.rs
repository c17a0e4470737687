use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::oneshot;
use tracing::debug;

use crate::credential::{Credential, CredentialStore};
use crate::csrf::{CsrfSource, CsrfToken};
use crate::errors::{Error, RefreshError};
use crate::request_context::CallContext;
use crate::session::{ClearReason, SessionEvent, SessionEvents};
use crate::telemetry::refresh::{self as telemetry, RefreshOutcome, RefreshTelemetry};

use super::state::{Flight, RefreshState, RetryDecision, Settled};

/// Credential as seen by one outbound attempt, plus the generation it belongs to.
#[derive(Clone, Debug)]
pub struct CredentialSnapshot {
    pub credential: Option<Credential>,
    pub generation: u64,
}

struct Inner {
    flight: Flight,
    /// Bumped on every credential write so stale refreshes and repeated teardowns can be detected.
    generation: u64,
}

/// Single-flight owner of the refresh lifecycle and every credential write.
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
    store: Arc<dyn CredentialStore>,
    csrf: Arc<dyn CsrfSource>,
    events: SessionEvents,
    wait_timeout: Duration,
}

enum Step {
    Retry(Credential),
    /// The session this call was sent with has already been cleared.
    AlreadyCleared,
    Teardown,
    Claimed(Claim),
}

enum Claim {
    Join(oneshot::Receiver<Settled>),
    Lead(CsrfToken, u64),
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        csrf: Arc<dyn CsrfSource>,
        events: SessionEvents,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                flight: Flight::Idle,
                generation: 0,
            }),
            store,
            csrf,
            events,
            wait_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RefreshState {
        self.lock().flight.state()
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn csrf_token(&self) -> Option<CsrfToken> {
        self.csrf.read()
    }

    /// Reads the credential and its generation under the same lock writers take.
    pub fn snapshot(&self) -> CredentialSnapshot {
        let inner = self.lock();
        CredentialSnapshot {
            credential: self.store.get(),
            generation: inner.generation,
        }
    }

    pub fn sign_in(&self, credential: Credential) {
        {
            let mut inner = self.lock();
            self.store.set(credential);
            inner.generation += 1;
        }
        self.events.emit(SessionEvent::SignedIn);
    }

    /// Clears unconditionally. Any refresh still in flight will find its generation stale.
    pub fn sign_out(&self) {
        let generation = {
            let mut inner = self.lock();
            self.store.clear();
            inner.generation += 1;
            inner.generation
        };
        telemetry::emit_session_cleared(ClearReason::SignedOut, generation);
        self.events.emit(SessionEvent::Cleared(ClearReason::SignedOut));
    }

    /// Clears the store only if nothing has written it since `observed`.
    /// Returns whether this call performed the teardown.
    fn teardown(&self, observed: u64, reason: ClearReason) -> bool {
        let generation = {
            let mut inner = self.lock();
            if inner.generation != observed {
                return false;
            }
            self.store.clear();
            inner.generation += 1;
            inner.generation
        };
        telemetry::emit_session_cleared(reason, generation);
        self.events.emit(SessionEvent::Cleared(reason));
        true
    }

    /// Decides the fate of a call whose last attempt came back 401.
    ///
    /// At most one refresh runs at a time; callers arriving while one is in
    /// flight wait for its outcome instead of starting another.
    pub async fn handle_unauthorized<F, Fut>(
        &self,
        ctx: &mut CallContext,
        original: Error,
        refresh: F,
    ) -> RetryDecision
    where
        F: FnOnce(CsrfToken) -> Fut,
        Fut: Future<Output = Result<Credential, RefreshError>>,
    {
        if ctx.retried() {
            debug!(call_id = %ctx.id(), "unauthorized after retry; giving up");
            return RetryDecision::Fail(original);
        }
        ctx.mark_retried();

        let csrf = self.csrf.read();
        let step = {
            let mut inner = self.lock();
            if inner.generation != ctx.generation() {
                match self.store.get() {
                    Some(credential) => Step::Retry(credential),
                    None => Step::AlreadyCleared,
                }
            } else {
                match csrf {
                    None => Step::Teardown,
                    Some(token) => Step::Claimed(Self::join_or_claim(&mut inner, token)),
                }
            }
        };

        match step {
            Step::Retry(credential) => {
                debug!(
                    call_id = %ctx.id(),
                    "credential renewed since request was sent; retrying without refresh"
                );
                RetryDecision::Retry(credential)
            }
            Step::AlreadyCleared => {
                debug!(
                    call_id = %ctx.id(),
                    "session cleared since request was sent; not refreshing"
                );
                RetryDecision::Fail(original)
            }
            Step::Teardown => {
                self.teardown(ctx.generation(), ClearReason::CsrfMissing);
                RetryDecision::Fail(original)
            }
            Step::Claimed(Claim::Join(rx)) => {
                telemetry::emit_queued(ctx.id(), self.queue_depth());
                self.wait(rx).await
            }
            Step::Claimed(Claim::Lead(token, generation)) => self
                .lead(token, generation, ctx.id().to_string(), refresh)
                .await
                .into_decision(),
        }
    }

    /// Refreshes without a failed request behind it, e.g. to restore a session on start-up.
    ///
    /// Joins a refresh already in flight. Returns `Ok(None)` when there is no
    /// anti-forgery token to refresh with.
    pub async fn refresh_now<F, Fut>(&self, refresh: F) -> Result<Option<Credential>, Error>
    where
        F: FnOnce(CsrfToken) -> Fut,
        Fut: Future<Output = Result<Credential, RefreshError>>,
    {
        let Some(csrf) = self.csrf.read() else {
            return Ok(None);
        };
        let claim = {
            let mut inner = self.lock();
            Self::join_or_claim(&mut inner, csrf)
        };
        let decision = match claim {
            Claim::Join(rx) => self.wait(rx).await,
            Claim::Lead(token, generation) => self
                .lead(token, generation, "restore".to_string(), refresh)
                .await
                .into_decision(),
        };
        match decision {
            RetryDecision::Retry(credential) => Ok(Some(credential)),
            RetryDecision::Fail(err) => Err(err),
        }
    }

    /// Queues behind the refresh in flight, or claims the idle coordinator for a new one.
    fn join_or_claim(inner: &mut Inner, token: CsrfToken) -> Claim {
        match &mut inner.flight {
            Flight::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Claim::Join(rx)
            }
            Flight::Idle => {
                inner.flight = Flight::Refreshing {
                    waiters: Vec::new(),
                };
                Claim::Lead(token, inner.generation)
            }
        }
    }

    fn queue_depth(&self) -> usize {
        match &self.lock().flight {
            Flight::Refreshing { waiters } => waiters.len(),
            Flight::Idle => 0,
        }
    }

    async fn wait(&self, rx: oneshot::Receiver<Settled>) -> RetryDecision {
        match tokio::time::timeout(self.wait_timeout, rx).await {
            Ok(Ok(settled)) => settled.into_decision(),
            Ok(Err(_)) => Settled::Failed(RefreshError::Abandoned).into_decision(),
            Err(_) => {
                debug!(
                    timeout_ms = self.wait_timeout.as_millis() as u64,
                    "refresh wait timed out"
                );
                RetryDecision::Fail(Error::Timeout(self.wait_timeout))
            }
        }
    }

    async fn lead<F, Fut>(
        &self,
        token: CsrfToken,
        generation: u64,
        context: String,
        refresh: F,
    ) -> Settled
    where
        F: FnOnce(CsrfToken) -> Fut,
        Fut: Future<Output = Result<Credential, RefreshError>>,
    {
        let telemetry = RefreshTelemetry::new(context);
        let mut guard = FlightGuard {
            coordinator: self,
            armed: true,
        };
        telemetry.emit_start(generation, SystemTime::now());
        let started = Instant::now();
        let result = refresh(token).await;
        guard.armed = false;
        self.settle(generation, result, &telemetry, started.elapsed())
    }

    fn settle(
        &self,
        generation: u64,
        result: Result<Credential, RefreshError>,
        telemetry: &RefreshTelemetry,
        elapsed: Duration,
    ) -> Settled {
        let (settled, waiters, cleared) = {
            let mut inner = self.lock();
            let waiters = inner.flight.land();
            let current = inner.generation == generation;
            let mut cleared = false;
            let settled = match result {
                Ok(credential) if current => {
                    self.store.set(credential.clone());
                    inner.generation += 1;
                    Settled::Renewed(credential)
                }
                Ok(_) => Settled::Superseded,
                Err(err) => {
                    // Nothing to tear down when no credential was held.
                    if current && self.store.get().is_some() {
                        self.store.clear();
                        inner.generation += 1;
                        cleared = true;
                    }
                    Settled::Failed(err)
                }
            };
            (settled, waiters, cleared)
        };

        let queued = waiters.len();
        match &settled {
            Settled::Renewed(_) => {
                telemetry.emit_success(queued, elapsed);
                self.events.emit(SessionEvent::Refreshed);
            }
            Settled::Failed(err) => {
                telemetry.emit_failure(err, queued, elapsed);
                if cleared {
                    telemetry::emit_session_cleared(ClearReason::RefreshFailed, generation + 1);
                    self.events
                        .emit(SessionEvent::Cleared(ClearReason::RefreshFailed));
                }
            }
            Settled::Superseded => {
                telemetry.emit_discarded(RefreshOutcome::Superseded, queued);
            }
        }

        for waiter in waiters {
            let _ = waiter.send(settled.clone());
        }
        settled
    }
}

/// Releases waiters if the future leading a refresh is dropped before it settles.
struct FlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waiters = self.coordinator.lock().flight.land();
        RefreshTelemetry::new("abandoned").emit_discarded(RefreshOutcome::Abandoned, waiters.len());
        for waiter in waiters {
            let _ = waiter.send(Settled::Failed(RefreshError::Abandoned));
        }
    }
}
