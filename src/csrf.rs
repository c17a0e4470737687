//! Anti-forgery token sources.
//!
//! The token is read fresh on every request and every refresh attempt. The
//! server rotates the cookie independently of the access credential.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};

#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CsrfToken(len={})", self.0.len())
    }
}

/// Synchronous side channel the anti-forgery token is read from.
pub trait CsrfSource: Send + Sync {
    fn read(&self) -> Option<CsrfToken>;
}

/// A token slot set by the application, mostly useful outside of browsers and in tests.
#[derive(Default)]
pub struct StaticCsrfSource {
    token: RwLock<Option<CsrfToken>>,
}

impl StaticCsrfSource {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: RwLock::new(token.map(CsrfToken::new)),
        }
    }

    pub fn set(&self, token: Option<&str>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token.map(CsrfToken::new);
    }
}

impl CsrfSource for StaticCsrfSource {
    fn read(&self) -> Option<CsrfToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Reads the anti-forgery cookie out of the cookie jar shared with the transport.
pub struct CookieCsrfSource {
    jar: Arc<Jar>,
    url: Url,
    cookie_name: String,
}

impl CookieCsrfSource {
    pub fn new(jar: Arc<Jar>, url: Url, cookie_name: impl Into<String>) -> Self {
        Self {
            jar,
            url,
            cookie_name: cookie_name.into(),
        }
    }
}

impl CsrfSource for CookieCsrfSource {
    fn read(&self) -> Option<CsrfToken> {
        let header = self.jar.cookies(&self.url)?;
        let raw = header.to_str().ok()?;
        find_cookie(raw, &self.cookie_name)
    }
}

/// Picks `name` out of a `Cookie:` header value, percent-decoding it.
fn find_cookie(header: &str, name: &str) -> Option<CsrfToken> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
        .map(CsrfToken)
}
