//! Deferred detail fragments referenced from a row's extra information.

use tracing::warn;
use url::Url;

use crate::transport::ApiClient;

const BIND_MARKER: &str = "ng-bind-html-unsafe=\"";
const LAZY_PREFIX: &str = "lazydiv";
const KEY_SEPARATOR: &str = "__";

/// Placeholder recorded when a fragment fails to load.
pub const FRAGMENT_ERROR: &str = "error";

/// A fragment placeholder of the form `lazydiv__<object id>__<method>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyFragment {
    /// Full placeholder key.
    pub key: String,
    /// Object the fragment describes.
    pub object_id: String,
    /// Method rendering the fragment.
    pub method: String,
}

impl LazyFragment {
    /// Path relative to the report base.
    #[must_use]
    pub fn path(&self) -> String {
        format!("action/{}/{}/", self.method, self.object_id)
    }
}

/// Loaded state of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentContent {
    /// Raw HTML returned by the server.
    Loaded(String),
    /// Loading failed.
    Failed,
}

impl FragmentContent {
    /// Text to render in place of the placeholder.
    #[must_use]
    pub fn as_html(&self) -> &str {
        match self {
            Self::Loaded(html) => html,
            Self::Failed => FRAGMENT_ERROR,
        }
    }
}

/// Find every lazy placeholder bound in `extra_information`.
#[must_use]
pub fn lazy_fragments(extra_information: &str) -> Vec<LazyFragment> {
    extra_information
        .split(BIND_MARKER)
        .skip(1)
        .filter_map(|tail| tail.split('"').next())
        .filter_map(parse_key)
        .collect()
}

fn parse_key(key: &str) -> Option<LazyFragment> {
    let mut parts = key.split(KEY_SEPARATOR);
    if parts.next()? != LAZY_PREFIX {
        return None;
    }
    let object_id = parts.next()?;
    let method = parts.next()?;
    Some(LazyFragment {
        key: key.to_string(),
        object_id: object_id.to_string(),
        method: method.to_string(),
    })
}

/// Fetch one fragment relative to `report_base`.
///
/// Failures are logged and reported as [`FragmentContent::Failed`].
pub async fn load_fragment(
    client: &ApiClient,
    report_base: &Url,
    fragment: &LazyFragment,
) -> FragmentContent {
    let url = match report_base.join(&fragment.path()) {
        Ok(url) => url,
        Err(error) => {
            warn!(key = %fragment.key, error = %error, "invalid fragment url");
            return FragmentContent::Failed;
        }
    };
    match client.fetch_fragment(url).await {
        Ok(html) => FragmentContent::Loaded(html),
        Err(error) => {
            warn!(key = %fragment.key, error = %error, "fragment failed to load");
            FragmentContent::Failed
        }
    }
}
