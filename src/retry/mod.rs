mod dispatcher;
mod outcome;

pub use dispatcher::resend;
pub use outcome::RetryOutcome;
