//! HTTP transport shared by every view session.
//!
//! # Design
//!
//! - All requests resolve against one API base and decode the
//!   `{messages, response_data}` envelope, routing messages to the
//!   [`NotificationBus`] before the caller sees the payload.
//! - An in-flight counter guards every request so loading indicators stay
//!   balanced on success, failure, and cancellation alike.
//! - State-changing verbs carry the CSRF token.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use backoffice_api_models::Envelope;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{CSRF_HEADER, ClientConfig, REQUEST_ID_HEADER};
use crate::error::{ClientError, ClientResult};
use crate::notify::NotificationBus;
use crate::query::QueryParams;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Thin HTTP client for the back-office API.
///
/// Cloning is cheap; clones share the connection pool, the in-flight counter
/// and the notification bus.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    api_base: Url,
    csrf_token: Option<HeaderValue>,
    slow_threshold: Duration,
    activity: Mutex<Activity>,
    notifications: NotificationBus,
}

#[derive(Debug, Default)]
struct Activity {
    outstanding: usize,
    busy_since: Option<Instant>,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured header is not a valid header value
    /// or the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig, notifications: NotificationBus) -> ClientResult<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(request_id) = config.request_id.as_deref() {
            let value = HeaderValue::from_str(request_id).map_err(|_| {
                ClientError::InvalidHeader {
                    name: REQUEST_ID_HEADER,
                }
            })?;
            default_headers.insert(REQUEST_ID_HEADER, value);
        }
        if let Some(cookie) = config.cookie.as_deref() {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|_| ClientError::InvalidHeader { name: "cookie" })?;
            value.set_sensitive(true);
            default_headers.insert(COOKIE, value);
        }
        let csrf_token = config
            .csrf_token
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|_| ClientError::InvalidHeader { name: CSRF_HEADER })?;

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| ClientError::HttpClient { source })?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                api_base: config.api_base,
                csrf_token,
                slow_threshold: config.slow_threshold,
                activity: Mutex::new(Activity::default()),
                notifications,
            }),
        })
    }

    /// API base every method name resolves against.
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.inner.api_base
    }

    /// Notification sink fed by response envelopes.
    #[must_use]
    pub fn notifications(&self) -> &NotificationBus {
        &self.inner.notifications
    }

    /// Requests issued but not yet settled.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        lock(&self.inner.activity).outstanding
    }

    /// Whether any request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.outstanding() > 0
    }

    /// Whether requests have been in flight continuously for longer than the
    /// slow threshold.
    #[must_use]
    pub fn is_slow(&self) -> bool {
        lock(&self.inner.activity)
            .busy_since
            .is_some_and(|since| since.elapsed() >= self.inner.slow_threshold)
    }

    /// Resolve `<api_base>/<method>/<suffix>`.
    ///
    /// A suffix starting with `?` is appended as a query string.
    ///
    /// # Errors
    ///
    /// Returns an error when the joined URL does not parse.
    pub fn endpoint(&self, method: &str, suffix: Option<&str>) -> ClientResult<Url> {
        let relative = format!("{}/{}", method.trim_matches('/'), suffix.unwrap_or_default());
        self.inner
            .api_base
            .join(&relative)
            .map_err(|source| ClientError::InvalidUrl {
                input: relative,
                source,
            })
    }

    /// Absolute navigation URL for `method` with `params` as its query.
    ///
    /// # Errors
    ///
    /// Returns an error when the joined URL does not parse.
    pub fn link(&self, method: &str, params: &QueryParams) -> ClientResult<Url> {
        let mut url = self.endpoint(method, None)?;
        if !params.is_empty() {
            url.set_query(Some(&params.encode()));
        }
        Ok(url)
    }

    /// `GET <method>/?<params>`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable body.
    pub async fn get(&self, method: &str, params: &QueryParams) -> ClientResult<Value> {
        let url = self.link(method, params)?;
        let request = self.inner.http.get(url.clone());
        self.dispatch(url, request).await
    }

    /// `POST <method>/<suffix>` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable body.
    pub async fn post<B>(&self, method: &str, body: &B, suffix: Option<&str>) -> ClientResult<Value>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(method, suffix)?;
        let request = self.with_csrf(self.inner.http.post(url.clone()).json(body));
        self.dispatch(url, request).await
    }

    /// `POST <method>/?<query>` with a url-encoded form body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable body.
    pub async fn post_form(
        &self,
        method: &str,
        query: &QueryParams,
        form: &QueryParams,
    ) -> ClientResult<Value> {
        let url = self.link(method, query)?;
        let request = self.with_csrf(
            self.inner
                .http
                .post(url.clone())
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(form.encode()),
        );
        self.dispatch(url, request).await
    }

    /// `PUT <method>/` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable body.
    pub async fn put<B>(&self, method: &str, body: &B) -> ClientResult<Value>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(method, None)?;
        let request = self.with_csrf(self.inner.http.put(url.clone()).json(body));
        self.dispatch(url, request).await
    }

    /// `GET` an HTML fragment from an absolute URL, returning the raw body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn fetch_fragment(&self, url: Url) -> ClientResult<String> {
        let _in_flight = InFlight::begin(&self.inner.activity);
        let response = self
            .inner
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| network(&url, source))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| network(&url, source))?;
        if !status.is_success() {
            warn!(endpoint = %url, status = status.as_u16(), "fragment request failed");
            return Err(ClientError::Transport {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.inner.csrf_token {
            Some(token) => request.header(CSRF_HEADER, token.clone()),
            None => request,
        }
    }

    async fn dispatch(&self, url: Url, request: RequestBuilder) -> ClientResult<Value> {
        let _in_flight = InFlight::begin(&self.inner.activity);
        debug!(endpoint = %url, outstanding = self.outstanding(), "dispatching request");

        let response = request.send().await.map_err(|source| {
            warn!(endpoint = %url, error = %source, "request could not be sent");
            network(&url, source)
        })?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| network(&url, source))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(endpoint = %url, status = status.as_u16(), "request failed");
            return Err(ClientError::Transport {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|source| ClientError::decode("response body", source))?
        };
        let envelope = Envelope::split(body)
            .map_err(|source| ClientError::decode("response messages", source))?;
        self.inner.notifications.extend(envelope.messages);
        Ok(envelope.response_data)
    }
}

fn network(url: &Url, source: reqwest::Error) -> ClientError {
    ClientError::Network {
        endpoint: url.to_string(),
        source,
    }
}

fn lock(activity: &Mutex<Activity>) -> MutexGuard<'_, Activity> {
    activity.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts one request for as long as it lives.
struct InFlight<'a> {
    activity: &'a Mutex<Activity>,
}

impl<'a> InFlight<'a> {
    fn begin(activity: &'a Mutex<Activity>) -> Self {
        let mut guard = lock(activity);
        if guard.outstanding == 0 {
            guard.busy_since = Some(Instant::now());
        }
        guard.outstanding += 1;
        drop(guard);
        Self { activity }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = lock(self.activity);
        guard.outstanding = guard.outstanding.saturating_sub(1);
        if guard.outstanding == 0 {
            guard.busy_since = None;
        }
    }
}
