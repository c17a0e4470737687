use tokio::sync::oneshot;

use crate::credential::Credential;
use crate::errors::{Error, RefreshError};

/// Observable phase of the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// What a caller that just saw a 401 should do next.
#[derive(Debug)]
pub enum RetryDecision {
    /// Resend the original request once with this credential.
    Retry(Credential),
    /// Give up and surface this error.
    Fail(Error),
}

/// Result of one refresh flight, cloned to every waiter.
#[derive(Clone, Debug)]
pub(crate) enum Settled {
    Renewed(Credential),
    Failed(RefreshError),
    Superseded,
}

impl Settled {
    pub(crate) fn into_decision(self) -> RetryDecision {
        match self {
            Settled::Renewed(credential) => RetryDecision::Retry(credential),
            Settled::Failed(err) => RetryDecision::Fail(Error::Refresh(err)),
            Settled::Superseded => RetryDecision::Fail(Error::SessionSuperseded),
        }
    }
}

pub(crate) type Waiter = oneshot::Sender<Settled>;

pub(crate) enum Flight {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

impl Flight {
    pub(crate) fn state(&self) -> RefreshState {
        match self {
            Flight::Idle => RefreshState::Idle,
            Flight::Refreshing { .. } => RefreshState::Refreshing,
        }
    }

    /// Returns to idle, handing back whoever was queued on the flight.
    pub(crate) fn land(&mut self) -> Vec<Waiter> {
        match std::mem::replace(self, Flight::Idle) {
            Flight::Refreshing { waiters } => waiters,
            Flight::Idle => Vec::new(),
        }
    }
}
