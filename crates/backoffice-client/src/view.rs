//! Client-side handle on a server-rendered view.
//!
//! # Design
//!
//! - A session is identified by its parameter bag; `view_slug` is mandatory.
//! - Content is fetched on open and replaced on every reload; failures are
//!   stored as content rather than dropped.
//! - Success handlers are keyed by method name, with a wildcard that fires
//!   after every method-specific handler.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use backoffice_api_models::{ViewActionRequest, ViewPayload};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::query::QueryParams;
use crate::transport::ApiClient;

/// Parameter naming the server-side view.
pub const VIEW_SLUG_PARAM: &str = "view_slug";
/// Handler key that fires for every successful method.
pub const WILDCARD_HANDLER: &str = "__all__";

const VIEW_ENDPOINT: &str = "view";
const VIEW_ACTION_ENDPOINT: &str = "view_action";
const VIEW_LINK_ENDPOINT: &str = "view_view";
const LINK_METHOD_PARAM: &str = "method";

/// Callback invoked with the payload of a successful method.
pub type SuccessHandler = Box<dyn FnMut(&Value) + Send>;

/// Rendered state of a view session.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewContent {
    /// Nothing fetched yet.
    Pending,
    /// Latest successful render.
    Rendered(ViewPayload),
    /// Latest fetch failed.
    Failed(ViewFailure),
}

impl ViewContent {
    /// Rendered HTML, if any.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Rendered(payload) => Some(payload.content.as_str()),
            _ => None,
        }
    }
}

/// Failure captured in place of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFailure {
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    /// Response body or error description.
    pub message: String,
}

impl From<&ClientError> for ViewFailure {
    fn from(error: &ClientError) -> Self {
        Self {
            status: error.status(),
            message: error
                .body()
                .map_or_else(|| error.to_string(), str::to_string),
        }
    }
}

/// Result of posting a form to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// The server accepted the form.
    Saved(ViewPayload),
    /// The server re-rendered the form with validation errors.
    ValidationFailed(ViewPayload),
}

/// Hook for closing a modal dialog before a form is posted.
#[async_trait]
pub trait ModalCloser: Send {
    /// Close the dialog.
    async fn close(&mut self);
}

/// Session against one server-side view.
pub struct ViewSession {
    client: ApiClient,
    params: QueryParams,
    content: ViewContent,
    handlers: HashMap<String, SuccessHandler>,
}

impl fmt::Debug for ViewSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ViewSession")
            .field("params", &self.params)
            .field("content", &self.content)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ViewSession {
    /// Create a session without fetching.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingViewSlug`] when `view_slug` is absent or
    /// empty.
    pub fn new(client: ApiClient, params: QueryParams) -> ClientResult<Self> {
        if params.get(VIEW_SLUG_PARAM).is_none_or(str::is_empty) {
            return Err(ClientError::MissingViewSlug);
        }
        Ok(Self {
            client,
            params,
            content: ViewContent::Pending,
            handlers: HashMap::new(),
        })
    }

    /// Create a session and fetch its content.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingViewSlug`] when `view_slug` is absent.
    /// Fetch failures are stored as [`ViewContent::Failed`].
    pub async fn open(client: ApiClient, params: QueryParams) -> ClientResult<Self> {
        let mut session = Self::new(client, params)?;
        session.fetch().await;
        Ok(session)
    }

    /// Current parameters.
    #[must_use]
    pub const fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Look up one parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Slug of the view.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.params.get(VIEW_SLUG_PARAM).unwrap_or_default()
    }

    /// Latest content.
    #[must_use]
    pub const fn content(&self) -> &ViewContent {
        &self.content
    }

    /// Transport used by this session.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Register a handler for a method, or for [`WILDCARD_HANDLER`].
    ///
    /// Handlers fire only for [`ViewSession::action`] and saved posts, never
    /// for [`ViewSession::call`]. A later registration for the same key replaces the earlier one.
    pub fn on_success(
        &mut self,
        method: impl Into<String>,
        handler: impl FnMut(&Value) + Send + 'static,
    ) {
        self.handlers.insert(method.into(), Box::new(handler));
    }

    /// Invoke the handler for `method`, then the wildcard handler.
    pub fn trigger_success(&mut self, method: &str, payload: &Value) {
        self.trigger_handler(method, payload);
        if method != WILDCARD_HANDLER {
            self.trigger_handler(WILDCARD_HANDLER, payload);
        }
    }

    /// Invoke only the handler registered under `key`.
    ///
    /// Returns whether a handler was registered.
    pub fn trigger_handler(&mut self, key: &str, payload: &Value) -> bool {
        match self.handlers.get_mut(key) {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Reload the view content.
    pub async fn fetch(&mut self) -> &ViewContent {
        debug!(view = self.slug(), "fetching view");
        let result = self.client.get(VIEW_ENDPOINT, &self.params).await;
        self.content = match result.and_then(decode_payload) {
            Ok(payload) => ViewContent::Rendered(payload),
            Err(error) => ViewContent::Failed(ViewFailure::from(&error)),
        };
        &self.content
    }

    /// Post a url-encoded form to the view.
    ///
    /// When a modal closer is given it runs before the request is sent. A
    /// saved form fires the `post` handler and replaces the content.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable body.
    pub async fn post(
        &mut self,
        form: &QueryParams,
        close_modal_first: Option<&mut dyn ModalCloser>,
    ) -> ClientResult<PostOutcome> {
        if let Some(closer) = close_modal_first {
            closer.close().await;
        }
        let raw = self
            .client
            .post_form(VIEW_ENDPOINT, &self.params, form)
            .await?;
        let payload = decode_payload(raw.clone())?;
        if payload.is_success() {
            info!(view = self.slug(), "form saved");
            self.trigger_success("post", &raw);
            self.content = ViewContent::Rendered(payload.clone());
            Ok(PostOutcome::Saved(payload))
        } else {
            debug!(view = self.slug(), "form rejected");
            self.content = ViewContent::Rendered(payload.clone());
            Ok(PostOutcome::ValidationFailed(payload))
        }
    }

    /// Invoke a server-side method without firing any success handler.
    ///
    /// Used for reads such as report fetches and autocomplete lookups, which
    /// are not user actions and must not trigger the wildcard handler.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn call(
        &self,
        method: &str,
        params: &Value,
        suffix: Option<&str>,
    ) -> ClientResult<Value> {
        debug!(view = self.slug(), method, "calling view method");
        self.client
            .post(
                VIEW_ACTION_ENDPOINT,
                &ViewActionRequest {
                    method,
                    params,
                    view_params: self.params.as_map(),
                },
                suffix,
            )
            .await
    }

    /// Invoke a server-side method on the view and fire its success handlers.
    ///
    /// `suffix` is appended to the action endpoint (typically `?query`). With
    /// `reload` the view content is refetched after the call succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. No handlers fire in that case,
    /// and a reloading call stores the failure as the view content.
    pub async fn action(
        &mut self,
        method: &str,
        params: &Value,
        reload: bool,
        suffix: Option<&str>,
    ) -> ClientResult<Value> {
        debug!(view = self.slug(), method, reload, "invoking view action");
        let response = match self.call(method, params, suffix).await {
            Ok(response) => response,
            Err(error) => {
                if reload {
                    self.content = ViewContent::Failed(ViewFailure::from(&error));
                }
                return Err(error);
            }
        };
        self.trigger_success(method, &response);
        if reload {
            self.fetch().await;
        }
        Ok(response)
    }

    /// Navigation URL for a link-style method.
    ///
    /// The view parameters and `action_params` are merged into the query,
    /// with `action_params` winning on conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL cannot be built.
    pub fn action_link(&self, method: &str, action_params: &QueryParams) -> ClientResult<Url> {
        let mut query = self.params.clone();
        query.extend(action_params.iter());
        query.insert(LINK_METHOD_PARAM, method);
        self.client.link(VIEW_LINK_ENDPOINT, &query)
    }
}

fn decode_payload(raw: Value) -> ClientResult<ViewPayload> {
    serde_json::from_value(raw).map_err(|source| ClientError::decode("view payload", source))
}
