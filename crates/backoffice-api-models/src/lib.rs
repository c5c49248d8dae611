#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::pedantic, clippy::nursery)]
//! Shared wire DTOs for the back-office view and report API.
//!
//! Every shape the server emits or accepts lives here so the client library
//! and the CLI decode the same contract. Duck-typed payloads from the server
//! (`item` vs `removed_item_id`, truthy `success` markers) are normalised into
//! tagged types at this boundary.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Suffix marking an action as a navigation link rather than an RPC call.
pub const LINK_ACTION_SUFFIX: &str = "_view";

/// Message level used for locally generated success notifications.
pub const SUCCESS_LEVEL: u16 = 25;

/// Evaluate a JSON value the way the dashboard front-end treats truthiness.
///
/// `null`, `false`, `0` and the empty string are falsy; arrays and objects are
/// always truthy, even when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Opaque report item identifier.
///
/// The server emits primary keys either as strings or integers; both decode
/// into the same textual form so selection maps stay stable across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.pad(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Signed(number) => Self(number.to_string()),
            Raw::Unsigned(number) => Self(number.to_string()),
        })
    }
}

/// Server-pushed notification attached to any response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Human-readable notification text.
    pub message: String,
    /// Numeric severity (10 debug, 20 info, 25 success, 30 warning, 40 error).
    pub level: u16,
}

impl Message {
    /// Build a success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: SUCCESS_LEVEL,
        }
    }

    /// Display category derived from the numeric level.
    #[must_use]
    pub const fn category(&self) -> MessageCategory {
        MessageCategory::from_level(self.level)
    }
}

/// Display category for a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Level 10.
    Debug,
    /// Level 20, and any level outside the known set.
    Info,
    /// Level 25.
    Success,
    /// Level 30.
    Warning,
    /// Level 40.
    Error,
}

impl MessageCategory {
    /// Map a numeric message level onto a display category.
    #[must_use]
    pub const fn from_level(level: u16) -> Self {
        match level {
            10 => Self::Debug,
            25 => Self::Success,
            30 => Self::Warning,
            40 => Self::Error,
            _ => Self::Info,
        }
    }

    /// Lowercase label used by renderers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Response envelope split into side-channel messages and the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Notifications attached by the server.
    pub messages: Vec<Message>,
    /// Payload returned to the caller.
    pub response_data: Value,
}

impl Envelope {
    /// Split a decoded response body.
    ///
    /// Bodies shaped as `{messages, response_data}` are unwrapped; any other
    /// body is passed through untouched with no messages.
    ///
    /// # Errors
    ///
    /// Returns an error when the `messages` member is present but malformed.
    pub fn split(body: Value) -> Result<Self, serde_json::Error> {
        match body {
            Value::Object(mut object) if object.contains_key("response_data") => {
                let response_data = object.remove("response_data").unwrap_or(Value::Null);
                let messages = match object.remove("messages") {
                    Some(Value::Null) | None => Vec::new(),
                    Some(raw) => serde_json::from_value(raw)?,
                };
                Ok(Self {
                    messages,
                    response_data,
                })
            }
            other => Ok(Self {
                messages: Vec::new(),
                response_data: other,
            }),
        }
    }
}

/// Rendered view fragment returned by `GET view` and `POST view`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewPayload {
    /// Slug of the view that rendered the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Server-rendered HTML.
    #[serde(default)]
    pub content: String,
    /// Success marker set by form posts that validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<Value>,
    /// Additional context the view attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ViewPayload {
    /// Whether the payload carries a truthy success marker.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success.as_ref().is_some_and(is_truthy)
    }
}

/// JSON body for `POST view_action`.
#[derive(Debug, Clone, Serialize)]
pub struct ViewActionRequest<'a> {
    /// Name of the view method to invoke.
    pub method: &'a str,
    /// Method-specific parameters.
    pub params: &'a Value,
    /// Current parameters of the view session.
    pub view_params: &'a BTreeMap<String, String>,
}

/// Single action offered on a report item or as a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique action name.
    pub method: String,
    /// Caption shown on the action control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    /// Confirmation prompt; empty or missing means no confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
    /// Form markup (or flag) required before invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Value>,
    /// Whether the form is submitted through the action endpoint.
    #[serde(default)]
    pub form_via_ajax: bool,
    /// Expand the following row after a successful invocation.
    #[serde(default)]
    pub next_on_success: bool,
    /// Success message template echoed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
}

impl ActionDescriptor {
    /// Link actions navigate instead of posting.
    #[must_use]
    pub fn is_link(&self) -> bool {
        self.method.ends_with(LINK_ACTION_SUFFIX)
    }

    /// Whether a form must be rendered before invocation.
    #[must_use]
    pub fn requires_form(&self) -> bool {
        self.form.as_ref().is_some_and(is_truthy)
    }

    /// Rendered as a plain button (no form, or a form posted via ajax).
    #[must_use]
    pub fn is_button(&self) -> bool {
        !self.requires_form() || self.form_via_ajax
    }

    /// Rendered as a form inline in the expanded row.
    #[must_use]
    pub fn is_inline_form(&self) -> bool {
        self.requires_form() && !self.form_via_ajax
    }

    /// Non-empty confirmation prompt, if any.
    #[must_use]
    pub fn confirmation_prompt(&self) -> Option<&str> {
        self.confirm.as_deref().filter(|prompt| !prompt.is_empty())
    }

    /// Form markup when the server sent HTML rather than a flag.
    #[must_use]
    pub fn form_markup(&self) -> Option<&str> {
        self.form.as_ref().and_then(Value::as_str)
    }
}

/// One row of a report listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Stable identifier.
    pub item_id: ItemId,
    /// Client-only expansion flag.
    #[serde(skip)]
    pub expanded: bool,
    /// Detail HTML, possibly referencing lazy fragments.
    #[serde(default)]
    pub extra_information: String,
    /// Actions available on this row.
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
    /// Column values and any other row attributes.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ReportItem {
    /// Build an empty row, mostly useful for fixtures.
    #[must_use]
    pub fn new(item_id: impl Into<ItemId>) -> Self {
        Self {
            item_id: item_id.into(),
            expanded: false,
            extra_information: String::new(),
            actions: Vec::new(),
            fields: Map::new(),
        }
    }

    /// Whether expanding the row would show anything.
    #[must_use]
    pub fn has_expanded_content(&self) -> bool {
        !self.extra_information.is_empty() || !self.actions.is_empty()
    }

    /// Find an action on this row by method name.
    #[must_use]
    pub fn find_action(&self, method: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|action| action.method == method)
    }

    /// Merge a refreshed copy into this row key by key.
    ///
    /// Only keys present in `update` are assigned; the client-only
    /// `expanded` flag survives the merge.
    pub fn merge_from(&mut self, update: ReportItemUpdate) {
        self.item_id = update.item_id;
        if let Some(extra_information) = update.extra_information {
            self.extra_information = extra_information;
        }
        if let Some(actions) = update.actions {
            self.actions = actions;
        }
        self.fields.extend(update.fields);
    }
}

/// Partial row returned by a single-item action.
///
/// Absent members stay `None` so a merge leaves the listed row untouched for
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItemUpdate {
    /// Identifier of the refreshed row.
    pub item_id: ItemId,
    /// Replacement detail HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_information: Option<String>,
    /// Replacement action list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionDescriptor>>,
    /// Column values carried by the update.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<ReportItem> for ReportItemUpdate {
    fn from(item: ReportItem) -> Self {
        Self {
            item_id: item.item_id,
            extra_information: Some(item.extra_information),
            actions: Some(item.actions),
            fields: item.fields,
        }
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Current ordering echoed back for column highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportExtra {
    /// Field the listing is ordered by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Ascending when true.
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

impl Default for ReportExtra {
    fn default() -> Self {
        Self {
            order_by: None,
            ascending: true,
        }
    }
}

const fn default_ascending() -> bool {
    true
}

/// Server response to a report fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// Rows on the current page.
    #[serde(default)]
    pub items: Vec<ReportItem>,
    /// Total matching rows across all pages.
    pub item_count: u64,
    /// Page size used by the server.
    pub items_per_page: u64,
    /// Whether the header (search, bulk select) is shown.
    #[serde(default)]
    pub report_header_visible: bool,
    /// Filter field schema.
    #[serde(default)]
    pub filter_fields: Vec<Value>,
    /// Search field schema.
    #[serde(default)]
    pub search_fields: Vec<Value>,
    /// Whether bulk actions are enabled.
    #[serde(default)]
    pub multiple_actions: bool,
    /// Named bulk operations.
    #[serde(default)]
    pub multiple_action_list: Vec<ActionDescriptor>,
    /// Ordering echo.
    #[serde(default)]
    pub extra: ReportExtra,
    /// Every row matching the query (not just this page) is selected.
    #[serde(default)]
    pub all_selected_global: bool,
}

impl ReportPayload {
    /// Number of pages the pager shows.
    ///
    /// Mirrors the server arithmetic `floor(item_count / items_per_page) + 1`,
    /// which yields one trailing empty page when the count divides evenly.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        if self.items_per_page == 0 {
            return 1;
        }
        self.item_count / self.items_per_page + 1
    }

    /// Whether any filter or search inputs exist.
    #[must_use]
    pub fn has_search(&self) -> bool {
        !self.filter_fields.is_empty() || !self.search_fields.is_empty()
    }
}

/// Outcome of a single-item action, normalised from the server's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResponse {
    /// The row changed; merge the new copy.
    Mutated {
        /// Members of the row that changed.
        item: Box<ReportItemUpdate>,
        /// Success message to surface.
        success: Option<String>,
    },
    /// The row no longer belongs in the listing.
    Removed {
        /// Identifier reported by the server.
        item_id: ItemId,
        /// Success message to surface.
        success: Option<String>,
    },
    /// Informational content to display read-only.
    Info(Value),
}

impl ActionResponse {
    /// Classify a raw action result.
    ///
    /// # Errors
    ///
    /// Returns an error when `item` is present but does not decode as a row.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let success = success_text(&value);
        if let Some(item) = value.get("item").filter(|item| is_truthy(item)) {
            let item = serde_json::from_value::<ReportItemUpdate>(item.clone())?;
            return Ok(Self::Mutated {
                item: Box::new(item),
                success,
            });
        }
        if let Some(raw) = value.get("removed_item_id").filter(|id| is_truthy(id)) {
            let item_id = serde_json::from_value::<ItemId>(raw.clone())?;
            return Ok(Self::Removed { item_id, success });
        }
        Ok(Self::Info(value))
    }
}

/// Extract a textual success marker from an action result.
#[must_use]
pub fn success_text(value: &Value) -> Option<String> {
    value
        .get("success")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Result of a bulk action, keyed by item id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleActionResult {
    /// Items the action succeeded on, with their success message.
    #[serde(default)]
    pub succeeded: BTreeMap<String, Option<String>>,
    /// Items the action failed on, with the failure reason.
    #[serde(default)]
    pub failed: BTreeMap<String, Option<String>>,
}

impl MultipleActionResult {
    /// Number of items that succeeded.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of items that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Registration metadata for a searchable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Model slug, e.g. `user`.
    pub slug: String,
    /// Singular display name.
    #[serde(default)]
    pub verbose_name: Option<String>,
    /// Plural display name.
    #[serde(default)]
    pub verbose_name_plural: Option<String>,
    /// Tabs, layout flags, and anything else the server includes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One serialized model instance, as returned by model detail and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInstance {
    /// Primary key.
    pub id: ItemId,
    /// Model slug the instance belongs to.
    pub model: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Model metadata, omitted by some listings.
    #[serde(default)]
    pub meta: Option<ModelMeta>,
    /// Tabs, relations, templates, and other detail members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hit count for one model in a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCount {
    /// Model the count applies to.
    pub meta: ModelMeta,
    /// Number of matching instances.
    pub count: u64,
}

/// One page of global search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matching instances on the requested page.
    #[serde(default)]
    pub results: Vec<ModelInstance>,
    /// Per-model totals across every page, ordered by model priority.
    #[serde(default)]
    pub model_counts: Vec<ModelCount>,
    /// Query the server searched for.
    #[serde(default)]
    pub query: String,
}

impl SearchResults {
    /// Total hits across every model.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.model_counts.iter().map(|count| count.count).sum()
    }
}
