mod coordinator;
mod endpoint;
mod state;

pub use coordinator::{CredentialSnapshot, RefreshCoordinator};
pub use endpoint::RefreshEndpoint;
pub use state::{RefreshState, RetryDecision};
