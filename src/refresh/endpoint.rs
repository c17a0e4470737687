use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::credential::Credential;
use crate::csrf::CsrfToken;
use crate::errors::{Error, RefreshError};
use crate::transport::Transport;

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    data: Option<String>,
}

/// The refresh call: anti-forgery headers only, never the expired bearer credential.
#[derive(Clone, Debug)]
pub struct RefreshEndpoint {
    url: Url,
    csrf_headers: Vec<HeaderName>,
}

impl RefreshEndpoint {
    pub fn new(url: Url, csrf_headers: Vec<HeaderName>) -> Self {
        Self { url, csrf_headers }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let url = config.endpoint(&config.refresh_path)?;
        let csrf_headers = config
            .refresh_csrf_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| Error::Config(format!("Invalid refresh header '{name}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(url, csrf_headers))
    }

    pub async fn call<T: Transport>(
        &self,
        transport: &T,
        csrf: &CsrfToken,
    ) -> Result<Credential, RefreshError> {
        let token = HeaderValue::from_str(csrf.value()).map_err(|_| {
            RefreshError::Transport("csrf token cannot be sent as a header value".into())
        })?;
        let mut request = Request::new(Method::POST, self.url.clone());
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for name in &self.csrf_headers {
            headers.insert(name.clone(), token.clone());
        }
        *request.body_mut() = Some("{}".into());

        let response = transport.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, url = %self.url, "refresh endpoint rejected session");
            return Err(RefreshError::Status { status, body });
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(format!("malformed refresh body: {e}")))?;
        match parsed.data {
            Some(token) if !token.is_empty() => {
                debug!(token_len = token.len(), "refresh endpoint issued credential");
                Ok(Credential::new(token))
            }
            _ => Err(RefreshError::InvalidResponse(
                "refresh body carried no access token".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn endpoint(server: &MockServer) -> RefreshEndpoint {
        RefreshEndpoint::from_config(&Config::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn posts_empty_json_with_every_csrf_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .and(header("X-XSRF-TOKEN", "xs"))
            .and(header("X-CSRF-TOKEN", "xs"))
            .and(body_json(serde_json::json!({})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": "new" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let credential = endpoint(&server)
            .call(&client, &CsrfToken::new("xs"))
            .await
            .unwrap();
        assert_eq!(credential.value(), "new");
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = endpoint(&server)
            .call(&reqwest::Client::new(), &CsrfToken::new("xs"))
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn rejected_refresh_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("csrf mismatch"))
            .mount(&server)
            .await;

        let err = endpoint(&server)
            .call(&reqwest::Client::new(), &CsrfToken::new("xs"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RefreshError::Status {
                status: reqwest::StatusCode::FORBIDDEN,
                body: "csrf mismatch".into(),
            }
        );
    }
}
