use tokio::sync::broadcast;
use tracing::{Level, event};

/// Why the credential store was emptied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearReason {
    SignedOut,
    CsrfMissing,
    RefreshFailed,
}

/// Process-wide session notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    Refreshed,
    Cleared(ClearReason),
}

/// Fan-out point for [`SessionEvent`]s. Sending with no subscribers is not an error.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, session_event: SessionEvent) {
        let receivers = self.sender.send(session_event).unwrap_or(0);
        event!(
            Level::DEBUG,
            kind = ?session_event,
            receivers,
            "session.event"
        );
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
