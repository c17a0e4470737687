//! read client configuration from a file or the environment

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::errors::Error;

pub enum ConfigLocation {
    File(String),
    Env,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,
    #[serde(default = "default_refresh_csrf_headers")]
    pub refresh_csrf_headers: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_refresh_path() -> String {
    "/auth/refresh-token".into()
}

fn default_logout_path() -> String {
    "/auth/logout".into()
}

fn default_csrf_cookie() -> String {
    "XSRF-TOKEN".into()
}

fn default_csrf_header() -> String {
    "X-XSRF-TOKEN".into()
}

fn default_refresh_csrf_headers() -> Vec<String> {
    vec!["X-XSRF-TOKEN".into(), "X-CSRF-TOKEN".into()]
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("session-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Config with every optional field at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            csrf_cookie: default_csrf_cookie(),
            csrf_header: default_csrf_header(),
            refresh_csrf_headers: default_refresh_csrf_headers(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    pub fn from_values(
        base_url: impl Into<String>,
        refresh_path: Option<String>,
        logout_path: Option<String>,
        csrf_cookie: Option<String>,
        csrf_header: Option<String>,
        request_timeout_secs: Option<u64>,
    ) -> Self {
        let mut config = Self::new(base_url);
        if let Some(path) = refresh_path {
            config.refresh_path = path;
        }
        if let Some(path) = logout_path {
            config.logout_path = path;
        }
        if let Some(name) = csrf_cookie {
            config.csrf_cookie = name;
        }
        if let Some(name) = csrf_header {
            config.csrf_header = name;
        }
        if let Some(secs) = request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("SESSION_API_BASE_URL")
            .map_err(|_| Error::Config("Missing SESSION_API_BASE_URL env var".to_string()))?;
        let timeout = match std::env::var("SESSION_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
                Error::Config(format!("Invalid SESSION_REQUEST_TIMEOUT_SECS '{raw}': {e}"))
            })?),
            Err(_) => None,
        };
        let config = Self::from_values(
            base_url,
            std::env::var("SESSION_REFRESH_PATH").ok(),
            std::env::var("SESSION_LOGOUT_PATH").ok(),
            std::env::var("SESSION_CSRF_COOKIE").ok(),
            std::env::var("SESSION_CSRF_HEADER").ok(),
            timeout,
        );
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.base()?;
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".into()));
        }
        if self.csrf_cookie.is_empty() {
            return Err(Error::Config("csrf_cookie must not be empty".into()));
        }
        Ok(())
    }

    /// Parsed base URL, always ending in `/` so relative joins keep its path.
    pub fn base(&self) -> Result<Url, Error> {
        let raw = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Url::parse(&raw)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))
    }

    /// Resolves an API path such as `/auth/refresh-token` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path)
                .map_err(|e| Error::InvalidRequest(format!("Invalid URL '{path}': {e}")));
        }
        self.base()?
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidRequest(format!("Invalid path '{path}': {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub(crate) fn read_config(loc: ConfigLocation) -> Result<Config, Error> {
    match loc {
        ConfigLocation::File(path) => Config::from_file(path),
        ConfigLocation::Env => Config::from_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = Config::new("https://api.example.com/v1");
        let url = config.endpoint("/auth/refresh-token").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/auth/refresh-token");
    }

    #[test]
    fn absolute_endpoint_is_used_verbatim() {
        let config = Config::new("https://api.example.com");
        let url = config.endpoint("https://other.example.com/x").unwrap();
        assert_eq!(url.host_str(), Some("other.example.com"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = Config::from_values("https://api.example.com", None, None, None, None, Some(0));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn json_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"base_url": "http://localhost:8080"}"#).unwrap();
        assert_eq!(config.refresh_path, "/auth/refresh-token");
        assert_eq!(config.csrf_cookie, "XSRF-TOKEN");
        assert_eq!(config.refresh_csrf_headers, vec!["X-XSRF-TOKEN", "X-CSRF-TOKEN"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
