//! Credential classification for the GridHub API.
//!
//! The service accepts three credential shapes, and which one is in play
//! determines capability: bearer tokens and header providers grant
//! read/write access, an API key grants read-only access to public
//! documents. Capability is derived from the variant, never stored
//! separately.

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;

/// A callable producing extra request headers (e.g. a service-account signer
/// refreshing its own token).
pub type HeaderProvider = dyn Fn() -> HeaderMap + Send + Sync;

/// Credentials for the GridHub API.
#[derive(Clone)]
pub enum Credentials {
    /// OAuth-style bearer token, sent as `Authorization: Bearer ...`.
    Bearer(String),
    /// API key, sent as the `key` query parameter. Read-only.
    ApiKey(String),
    /// Callable invoked per request to produce auth headers.
    HeaderProvider(Arc<HeaderProvider>),
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer(token.into())
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Credentials::ApiKey(key.into())
    }

    pub fn header_provider(f: impl Fn() -> HeaderMap + Send + Sync + 'static) -> Self {
        Credentials::HeaderProvider(Arc::new(f))
    }

    /// Whether these credentials can perform mutating calls.
    pub fn can_write(&self) -> bool {
        !matches!(self, Credentials::ApiKey(_))
    }

    pub fn is_api_key(&self) -> bool {
        matches!(self, Credentials::ApiKey(_))
    }

    /// Attach these credentials to an outgoing request.
    pub(crate) fn decorate(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::ApiKey(key) => req.query(&[("key", key.as_str())]),
            Credentials::HeaderProvider(provider) => req.headers(provider()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret itself.
        match self {
            Credentials::Bearer(_) => f.write_str("Credentials::Bearer(<redacted>)"),
            Credentials::ApiKey(_) => f.write_str("Credentials::ApiKey(<redacted>)"),
            Credentials::HeaderProvider(_) => f.write_str("Credentials::HeaderProvider(<fn>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, AUTHORIZATION};

    #[test]
    fn capability_is_derived_from_shape() {
        assert!(Credentials::bearer("tok").can_write());
        assert!(Credentials::header_provider(HeaderMap::new).can_write());
        assert!(!Credentials::api_key("key").can_write());
        assert!(Credentials::api_key("key").is_api_key());
    }

    #[test]
    fn debug_redacts_secrets() {
        let out = format!("{:?}", Credentials::bearer("super-secret"));
        assert!(!out.contains("super-secret"));
        let out = format!("{:?}", Credentials::api_key("super-secret"));
        assert!(!out.contains("super-secret"));
    }

    #[test]
    fn decorate_bearer_sets_authorization_header() {
        let http = reqwest::Client::new();
        let req = Credentials::bearer("tok")
            .decorate(http.get("http://localhost/x"))
            .build()
            .unwrap();
        assert_eq!(
            req.headers().get(AUTHORIZATION),
            Some(&HeaderValue::from_static("Bearer tok"))
        );
    }

    #[test]
    fn decorate_api_key_appends_query_param() {
        let http = reqwest::Client::new();
        let req = Credentials::api_key("k123")
            .decorate(http.get("http://localhost/x"))
            .build()
            .unwrap();
        assert_eq!(req.url().query(), Some("key=k123"));
    }

    #[test]
    fn decorate_header_provider_applies_headers() {
        let http = reqwest::Client::new();
        let creds = Credentials::header_provider(|| {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_static("Custom scheme"));
            headers
        });
        let req = creds.decorate(http.get("http://localhost/x")).build().unwrap();
        assert_eq!(
            req.headers().get(AUTHORIZATION),
            Some(&HeaderValue::from_static("Custom scheme"))
        );
    }
}
