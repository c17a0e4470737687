use std::time::{Duration, SystemTime};

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::RefreshError;
use crate::session::ClearReason;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failed,
    Superseded,
    Abandoned,
}

/// Structured events for one refresh flight, keyed by a random attempt id.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn emit_start(&self, generation: u64, at: SystemTime) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            generation,
            timestamp = ?at,
            "refresh.start"
        );
    }

    pub fn emit_success(&self, waiters: usize, elapsed: Duration) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?RefreshOutcome::Success,
            waiters,
            elapsed_ms = elapsed.as_millis() as u64,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, error: &RefreshError, waiters: usize, elapsed: Duration) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?RefreshOutcome::Failed,
            waiters,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "refresh.failure"
        );
    }

    pub fn emit_discarded(&self, outcome: RefreshOutcome, waiters: usize) {
        event!(
            Level::WARN,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?outcome,
            waiters,
            "refresh.discarded"
        );
    }
}

/// A caller found a refresh already in flight and is waiting on it.
pub fn emit_queued(call_id: Uuid, queue_depth: usize) {
    event!(
        Level::DEBUG,
        call_id = %call_id,
        queue_depth,
        "refresh.queued"
    );
}

pub fn emit_session_cleared(reason: ClearReason, generation: u64) {
    event!(
        Level::WARN,
        reason = ?reason,
        generation,
        "session.cleared"
    );
}
