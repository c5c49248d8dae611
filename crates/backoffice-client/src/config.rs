//! Client configuration.

use std::time::Duration;

use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time the client must stay busy before it reports itself as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(1000);
/// Cookie holding the CSRF token.
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
/// Header carrying the CSRF token on state-changing requests.
pub const CSRF_HEADER: &str = "x-csrftoken";
/// Header carrying the caller's trace identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Settings for an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the back-office API; always ends with `/`.
    pub api_base: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Busy duration after which the client reports itself as slow.
    pub slow_threshold: Duration,
    /// CSRF token attached to POST and PUT requests.
    pub csrf_token: Option<String>,
    /// Raw `Cookie` header sent with every request (session and CSRF cookies).
    pub cookie: Option<String>,
    /// Trace identifier attached to every request.
    pub request_id: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for the given API base.
    #[must_use]
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base: normalize_base(api_base),
            timeout: DEFAULT_TIMEOUT,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            csrf_token: None,
            cookie: None,
            request_id: None,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the slow-indicator threshold.
    #[must_use]
    pub const fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Use an explicit CSRF token.
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Send `cookie_header` with every request and take the CSRF token from
    /// its `csrftoken` cookie.
    ///
    /// Leaves the current token untouched when that cookie is absent. A blank
    /// header is ignored.
    #[must_use]
    pub fn with_cookie(mut self, cookie_header: &str) -> Self {
        let cookie_header = cookie_header.trim();
        if cookie_header.is_empty() {
            return self;
        }
        if let Some(token) = csrf_token_from_cookie(cookie_header, CSRF_COOKIE_NAME) {
            self.csrf_token = Some(token);
        }
        self.cookie = Some(cookie_header.to_string());
        self
    }

    /// Attach a trace identifier to every request.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Extract a cookie value from a `Cookie` header.
#[must_use]
pub fn csrf_token_from_cookie(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Ensure the base path ends with `/` so relative joins stay under it.
#[must_use]
pub fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_gains_trailing_slash() {
        let url = Url::parse("http://localhost:8000/backoffice/api").expect("url");
        let config = ClientConfig::new(url);
        assert_eq!(config.api_base.as_str(), "http://localhost:8000/backoffice/api/");
    }

    #[test]
    fn csrf_token_is_read_from_cookie_header() {
        let header = "sessionid=abc; csrftoken=tok123; theme=dark";
        assert_eq!(
            csrf_token_from_cookie(header, CSRF_COOKIE_NAME).as_deref(),
            Some("tok123")
        );
        assert_eq!(csrf_token_from_cookie("sessionid=abc", CSRF_COOKIE_NAME), None);
        assert_eq!(csrf_token_from_cookie("csrftoken=", CSRF_COOKIE_NAME), None);
    }

    #[test]
    fn missing_cookie_keeps_explicit_token() {
        let url = Url::parse("http://localhost/api/").expect("url");
        let config = ClientConfig::new(url)
            .with_csrf_token("explicit")
            .with_cookie("sessionid=abc");
        assert_eq!(config.csrf_token.as_deref(), Some("explicit"));
        assert_eq!(config.cookie.as_deref(), Some("sessionid=abc"));
    }

    #[test]
    fn cookie_header_supplies_token_and_is_kept() {
        let url = Url::parse("http://localhost/api/").expect("url");
        let config = ClientConfig::new(url.clone()).with_cookie(" sessionid=abc; csrftoken=tok ");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        assert_eq!(config.cookie.as_deref(), Some("sessionid=abc; csrftoken=tok"));

        let blank = ClientConfig::new(url).with_cookie("  ");
        assert_eq!(blank.cookie, None);
    }
}
