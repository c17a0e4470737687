use std::future::Future;

use reqwest::{Request, Response};

/// Sends one HTTP request and yields one response or a transport error.
///
/// The session layer never looks below this boundary; any status, including
/// errors, comes back as a `Response`.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send;
}

impl Transport for reqwest::Client {
    fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        reqwest::Client::execute(self, request)
    }
}
