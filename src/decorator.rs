//! Attaches the bearer credential and anti-forgery token to outbound requests.

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

use crate::credential::Credential;
use crate::csrf::CsrfToken;
use crate::request::OutboundRequest;

/// Produces a transport request from `request` with credentials attached.
///
/// A missing credential or token simply leaves its header off; an anonymous
/// request is valid. Values that cannot be encoded as a header are skipped the
/// same way rather than failing the call.
pub fn decorate(
    request: &OutboundRequest,
    credential: Option<&Credential>,
    csrf: Option<&CsrfToken>,
    csrf_header: &HeaderName,
) -> reqwest::Request {
    let mut outbound = request.to_reqwest();
    let headers = outbound.headers_mut();
    headers.remove(AUTHORIZATION);
    if let Some(value) = credential
        .filter(|c| !c.is_empty())
        .and_then(|c| HeaderValue::from_str(&format!("Bearer {}", c.value())).ok())
    {
        headers.insert(AUTHORIZATION, value);
    }
    if let Some(value) = csrf.and_then(|t| HeaderValue::from_str(t.value()).ok()) {
        headers.insert(csrf_header.clone(), value);
    }
    outbound
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, Url};

    use super::*;

    fn request() -> OutboundRequest {
        OutboundRequest::new(Method::GET, Url::parse("http://localhost/me").unwrap())
    }

    fn xsrf() -> HeaderName {
        HeaderName::from_static("x-xsrf-token")
    }

    #[test]
    fn attaches_bearer_and_csrf() {
        let credential = Credential::new("tok");
        let csrf = CsrfToken::new("xs");
        let decorated = decorate(&request(), Some(&credential), Some(&csrf), &xsrf());
        assert_eq!(decorated.headers()[AUTHORIZATION], "Bearer tok");
        assert_eq!(decorated.headers()["x-xsrf-token"], "xs");
    }

    #[test]
    fn anonymous_request_has_no_auth_headers() {
        let decorated = decorate(&request(), None, None, &xsrf());
        assert!(decorated.headers().get(AUTHORIZATION).is_none());
        assert!(decorated.headers().get("x-xsrf-token").is_none());
    }

    #[test]
    fn replaces_stale_authorization_from_previous_attempt() {
        let stale = request().header("Authorization", "Bearer old").unwrap();
        let fresh = Credential::new("new");
        let decorated = decorate(&stale, Some(&fresh), None, &xsrf());
        assert_eq!(decorated.headers()[AUTHORIZATION], "Bearer new");
    }

    #[test]
    fn empty_credential_is_treated_as_anonymous() {
        let empty = Credential::new("");
        let decorated = decorate(&request(), Some(&empty), None, &xsrf());
        assert!(decorated.headers().get(AUTHORIZATION).is_none());
    }
}
