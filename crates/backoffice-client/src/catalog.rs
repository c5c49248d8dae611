//! Lookups against the models registered with the back office.
//!
//! Both calls are plain reads: they carry no view parameters and fire no
//! session handlers.

use backoffice_api_models::{ModelInstance, SearchResults};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::query::QueryParams;
use crate::transport::ApiClient;

const MODEL_ENDPOINT: &str = "model";
const SEARCH_ENDPOINT: &str = "search";

/// Global search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Search text.
    pub q: String,
    /// One-based page; the server defaults to the first.
    pub page: Option<u32>,
    /// Restrict hits to one model slug. Counts still cover every model.
    pub filter_model: Option<String>,
}

impl SearchQuery {
    /// Search for `q` on the first page across every model.
    #[must_use]
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }

    fn params(&self) -> ClientResult<QueryParams> {
        let q = self.q.trim();
        if q.is_empty() {
            return Err(ClientError::EmptyParameter { name: "q" });
        }
        let mut params = QueryParams::new().with("q", q);
        if let Some(page) = self.page {
            params.insert("page", page.to_string());
        }
        if let Some(model) = self.filter_model.as_deref().filter(|model| !model.is_empty()) {
            params.insert("filter_model", model);
        }
        Ok(params)
    }
}

/// Fetch one model instance with its tabs and relations.
///
/// # Errors
///
/// Returns an error when `model_slug` or `pk` is blank, on transport failure,
/// or when the body is not a serialized instance.
pub async fn model_detail(
    client: &ApiClient,
    model_slug: &str,
    pk: &str,
) -> ClientResult<ModelInstance> {
    let model_slug = required("model_slug", model_slug)?;
    let pk = required("pk", pk)?;
    debug!(model = model_slug, pk, "fetching model instance");
    let params = QueryParams::new()
        .with("model_slug", model_slug)
        .with("pk", pk);
    let raw = client.get(MODEL_ENDPOINT, &params).await?;
    serde_json::from_value(raw).map_err(|source| ClientError::decode("model instance", source))
}

/// Run a global search across registered models.
///
/// # Errors
///
/// Returns an error when the query text is blank, on transport failure, or
/// when the body is not a result page.
pub async fn search(client: &ApiClient, query: &SearchQuery) -> ClientResult<SearchResults> {
    let params = query.params()?;
    debug!(query = %query.q, page = ?query.page, "searching");
    let raw = client.get(SEARCH_ENDPOINT, &params).await?;
    serde_json::from_value(raw).map_err(|source| ClientError::decode("search results", source))
}

fn required<'a>(name: &'static str, value: &'a str) -> ClientResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(ClientError::EmptyParameter { name })
    } else {
        Ok(value)
    }
}
