//! Async driver for a report listing bound to a view session.
//!
//! # Design
//!
//! - [`ReportListState`] owns every decision; this type performs the calls
//!   those decisions require and feeds the results back.
//! - Every state change that alters the query triggers exactly one fetch.
//! - Listeners observe expansions, location changes, and bulk results over a
//!   broadcast channel.

use backoffice_api_models::{
    ActionDescriptor, ActionResponse, ItemId, Message, MultipleActionResult, ReportPayload,
    is_truthy, success_text,
};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::query::QueryParams;
use crate::report::lazy::{LazyFragment, load_fragment};
use crate::report::state::{
    ActionPlan, BulkPlan, BulkRequest, Expansion, FetchDisposition, ItemUpdate, PendingAction,
    ReportListState,
};
use crate::view::ViewSession;

/// View method returning the report payload.
pub const FETCH_METHOD: &str = "fetch";
/// View method running a row action.
pub const ACTION_METHOD: &str = "action";
/// View method running a bulk action.
pub const MULTIPLE_ACTION_METHOD: &str = "multiple_action";
/// Link method for row actions.
pub const ACTION_LINK_METHOD: &str = "action_view";
/// Link method for bulk actions.
pub const MULTIPLE_ACTION_LINK_METHOD: &str = "multiple_action_view";
/// View method answering autocomplete lookups.
pub const AUTO_COMPLETE_METHOD: &str = "auto_complete";
/// View parameter asking the controller to publish location changes.
pub const UPDATE_LOCATION_PARAM: &str = "updateLocation";

const EVENT_CAPACITY: usize = 64;

/// Notification for listeners of a report listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// A fetch landed.
    Loaded {
        /// Current page.
        page: u32,
        /// Total matching rows.
        item_count: u64,
    },
    /// A row opened.
    ItemExpanded(ItemId),
    /// The canonical query changed and should be reflected in the location.
    LocationChanged(QueryParams),
    /// A bulk action finished.
    BulkCompleted {
        /// Rows the action succeeded on.
        succeeded: usize,
        /// Rows the action failed on.
        failed: usize,
    },
}

/// Result of a row action request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Navigate to this URL.
    Navigate(Url),
    /// Render the action's form, then call
    /// [`ReportListController::submit_form`].
    OpenForm(ActionDescriptor),
    /// Staged; call [`ReportListController::confirm_pending`] to run it.
    AwaitingConfirmation(String),
    /// The row was refreshed in place.
    Updated(ItemId),
    /// The row was removed from the listing.
    Removed(ItemId),
    /// The action returned read-only content.
    Detail {
        /// Action that produced the content.
        action: ActionDescriptor,
        /// Content to display.
        content: Value,
    },
    /// The submitted form was rejected.
    FormErrors {
        /// Action whose form failed.
        action: ActionDescriptor,
        /// Re-rendered form with field errors.
        form: Option<String>,
    },
}

/// Result of a bulk action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// No action chosen.
    Skipped,
    /// Navigate to this URL.
    Navigate(Url),
    /// Staged; call [`ReportListController::confirm_pending`] to run it.
    AwaitingConfirmation(String),
    /// Finished with per-row results.
    Completed(MultipleActionResult),
}

/// Result of confirming a staged action.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedOutcome {
    /// Nothing was staged.
    Nothing,
    /// A row action ran.
    Action(ActionOutcome),
    /// A bulk action ran.
    Bulk(BulkOutcome),
}

/// Report listing driven over a [`ViewSession`].
#[derive(Debug)]
pub struct ReportListController {
    session: ViewSession,
    state: ReportListState,
    fragment_base: Url,
    update_location: bool,
    events: broadcast::Sender<ReportEvent>,
}

impl ReportListController {
    /// Bind a controller to a session.
    ///
    /// `fragment_base` is the report URL lazy fragments resolve against.
    #[must_use]
    pub fn new(session: ViewSession, fragment_base: Url) -> Self {
        let state = ReportListState::from_view_params(session.params());
        let update_location = session
            .param(UPDATE_LOCATION_PARAM)
            .is_some_and(|flag| !flag.is_empty() && flag != "false");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session,
            state,
            fragment_base,
            update_location,
            events,
        }
    }

    /// Listing state.
    #[must_use]
    pub const fn state(&self) -> &ReportListState {
        &self.state
    }

    /// Listing state for edits that need no network (filters, selection).
    pub const fn state_mut(&mut self) -> &mut ReportListState {
        &mut self.state
    }

    /// Underlying view session.
    #[must_use]
    pub const fn session(&self) -> &ViewSession {
        &self.session
    }

    /// Underlying view session, e.g. to register success handlers.
    pub const fn session_mut(&mut self) -> &mut ViewSession {
        &mut self.session
    }

    /// Listen for listing events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.events.subscribe()
    }

    /// Adopt location search parameters and fetch.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails.
    pub async fn navigate(&mut self, search: &QueryParams) -> ClientResult<()> {
        self.state.navigate(search);
        self.fetch_report().await
    }

    /// Fetch the report for the current query.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the payload is malformed;
    /// the failure is also recorded on the state.
    pub async fn fetch_report(&mut self) -> ClientResult<()> {
        let ticket = self.state.begin_fetch();
        if self.update_location {
            self.emit(ReportEvent::LocationChanged(ticket.query.to_params()));
        }
        let query_string = ticket.query.query_string();
        debug!(report = self.session.slug(), query = %query_string, seq = ticket.seq, "fetching report");

        let result = self
            .session
            .call(FETCH_METHOD, &json!({}), Some(&query_string))
            .await
            .and_then(|raw| {
                serde_json::from_value::<ReportPayload>(raw)
                    .map_err(|source| ClientError::Decode {
                        what: "report payload",
                        source,
                    })
            });
        let payload = match result {
            Ok(payload) => payload,
            Err(error) => {
                warn!(report = self.session.slug(), error = %error, "report fetch failed");
                self.state.fail_fetch(ticket.seq, error.to_string());
                return Err(error);
            }
        };

        let item_count = payload.item_count;
        match self.state.apply_fetch(ticket.seq, payload) {
            FetchDisposition::Applied { auto_expanded } => {
                self.emit(ReportEvent::Loaded {
                    page: ticket.query.page,
                    item_count,
                });
                if let Some(expansion) = auto_expanded {
                    self.after_expansion(expansion).await;
                }
            }
            FetchDisposition::Stale => {
                debug!(seq = ticket.seq, "discarding stale report payload");
            }
        }
        Ok(())
    }

    /// Move to another page; fetches only when the page actually changes.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails.
    pub async fn change_page(&mut self, page: u32) -> ClientResult<bool> {
        if !self.state.change_page(page) {
            return Ok(false);
        }
        self.fetch_report().await?;
        Ok(true)
    }

    /// Order by a column and fetch.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails.
    pub async fn change_order(&mut self, field: &str) -> ClientResult<()> {
        self.state.change_order(field);
        self.fetch_report().await
    }

    /// Apply edited filters and fetch.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails.
    pub async fn apply_filters(&mut self) -> ClientResult<()> {
        self.state.apply_filters();
        self.fetch_report().await
    }

    /// Drop every filter and fetch.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails.
    pub async fn remove_filters(&mut self) -> ClientResult<()> {
        self.state.remove_filters();
        self.fetch_report().await
    }

    /// Open or close a row, loading its lazy fragments on open.
    pub async fn toggle_expand(&mut self, item_id: &ItemId) -> Expansion {
        let expansion = self.state.toggle_expand(item_id);
        self.after_expansion(expansion.clone()).await;
        expansion
    }

    /// Run an action on a row.
    ///
    /// Without `force`, actions carrying a confirmation prompt are staged.
    ///
    /// # Errors
    ///
    /// Returns an error when the row or action is unknown or the call fails.
    pub async fn execute_action(
        &mut self,
        item_id: &ItemId,
        method: &str,
        force: bool,
    ) -> ClientResult<ActionOutcome> {
        match self.state.plan_action(item_id, method, force)? {
            ActionPlan::Navigate(action) => self
                .row_link(item_id, &action)
                .map(ActionOutcome::Navigate),
            ActionPlan::OpenForm(action) => Ok(ActionOutcome::OpenForm(action)),
            ActionPlan::AwaitConfirmation(prompt) => {
                Ok(ActionOutcome::AwaitingConfirmation(prompt))
            }
            ActionPlan::Execute(action) => self.run_action(item_id, action).await,
        }
    }

    /// Run the selected bulk action.
    ///
    /// # Errors
    ///
    /// Returns an error when the action is unknown, nothing is selected, or
    /// the call fails.
    pub async fn execute_multiple_action(
        &mut self,
        method: &str,
        force: bool,
    ) -> ClientResult<BulkOutcome> {
        match self.state.plan_multiple(method, force)? {
            BulkPlan::Skip => Ok(BulkOutcome::Skipped),
            BulkPlan::Navigate(request) => self
                .session
                .action_link(MULTIPLE_ACTION_LINK_METHOD, &request.link_params())
                .map(BulkOutcome::Navigate),
            BulkPlan::AwaitConfirmation(prompt) => Ok(BulkOutcome::AwaitingConfirmation(prompt)),
            BulkPlan::Execute(request) => self.run_bulk(request).await,
        }
    }

    /// Run the staged action.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn confirm_pending(&mut self) -> ClientResult<ConfirmedOutcome> {
        match self.state.take_pending() {
            None => Ok(ConfirmedOutcome::Nothing),
            Some(PendingAction::Single { item_id, action }) => self
                .run_action(&item_id, action)
                .await
                .map(ConfirmedOutcome::Action),
            Some(PendingAction::Multiple(request)) => {
                self.run_bulk(request).await.map(ConfirmedOutcome::Bulk)
            }
        }
    }

    /// Drop the staged action without running it.
    pub fn cancel_pending(&mut self) -> bool {
        self.state.cancel_pending()
    }

    /// Submit a serialized form for a row action.
    ///
    /// A truthy `success` applies the result like a plain action; otherwise
    /// the re-rendered form is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the row or action is unknown or the call fails.
    pub async fn submit_form(
        &mut self,
        item_id: &ItemId,
        method: &str,
        form_data: &str,
    ) -> ClientResult<ActionOutcome> {
        let action = self.state.row_action(item_id, method)?;
        let params = json!({"method": action.method, "pk": item_id, "data": form_data});
        let raw = self.call_action(&params).await?;

        if !raw.get("success").is_some_and(is_truthy) {
            debug!(method = %action.method, "action form rejected");
            let form = raw
                .get("response_form")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(ActionOutcome::FormErrors { action, form });
        }
        let response = ActionResponse::from_value(raw.clone())
            .map_err(|source| ClientError::Decode {
                what: "action result",
                source,
            })?;
        let response = match response {
            ActionResponse::Info(_) => ActionResponse::Removed {
                item_id: item_id.clone(),
                success: success_text(&raw),
            },
            other => other,
        };
        self.apply_response(item_id, &action, response, &raw).await
    }

    /// Ask the view for autocomplete suggestions.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn auto_complete(
        &mut self,
        partial: &str,
        mut params: Map<String, Value>,
    ) -> ClientResult<Value> {
        params.insert("partial".into(), Value::String(partial.to_string()));
        self.session
            .call(AUTO_COMPLETE_METHOD, &Value::Object(params), None)
            .await
    }

    /// Navigation URL for a link action on a row, if `method` is one.
    ///
    /// # Errors
    ///
    /// Returns an error when the row or action is unknown.
    pub fn action_link_for(&self, item_id: &ItemId, method: &str) -> ClientResult<Option<Url>> {
        let action = self.state.row_action(item_id, method)?;
        if !action.is_link() {
            return Ok(None);
        }
        self.row_link(item_id, &action).map(Some)
    }

    fn row_link(&self, item_id: &ItemId, action: &ActionDescriptor) -> ClientResult<Url> {
        let params = QueryParams::new()
            .with("report_method", action.method.clone())
            .with("pk", item_id.as_str());
        self.session.action_link(ACTION_LINK_METHOD, &params)
    }

    async fn call_action(&mut self, params: &Value) -> ClientResult<Value> {
        self.session
            .action(ACTION_METHOD, params, false, None)
            .await
            .inspect_err(|error| self.state.set_error(error.to_string()))
    }

    async fn run_action(
        &mut self,
        item_id: &ItemId,
        action: ActionDescriptor,
    ) -> ClientResult<ActionOutcome> {
        let params = json!({"method": action.method, "pk": item_id});
        let raw = self.call_action(&params).await?;
        let response = ActionResponse::from_value(raw.clone())
            .map_err(|source| ClientError::Decode {
                what: "action result",
                source,
            })?;
        match response {
            ActionResponse::Info(content) => Ok(ActionOutcome::Detail { action, content }),
            response => self.apply_response(item_id, &action, response, &raw).await,
        }
    }

    async fn apply_response(
        &mut self,
        item_id: &ItemId,
        action: &ActionDescriptor,
        response: ActionResponse,
        raw: &Value,
    ) -> ClientResult<ActionOutcome> {
        let removed = matches!(response, ActionResponse::Removed { .. });
        let success = match &response {
            ActionResponse::Mutated { success, .. } | ActionResponse::Removed { success, .. } => {
                success.clone()
            }
            ActionResponse::Info(_) => None,
        };
        let ItemUpdate {
            expansions,
            fragments,
        } = self
            .state
            .apply_action_response(item_id, response, action.next_on_success)?;

        if let Some(text) = success {
            self.session.client().notifications().push(Message::success(text));
        }
        self.session.trigger_handler(&action.method, raw);
        info!(method = %action.method, item = %item_id, removed, "action applied");

        for expansion in expansions {
            self.after_expansion(expansion).await;
        }
        self.load_fragments(fragments).await;

        Ok(if removed {
            ActionOutcome::Removed(item_id.clone())
        } else {
            ActionOutcome::Updated(item_id.clone())
        })
    }

    async fn run_bulk(&mut self, request: BulkRequest) -> ClientResult<BulkOutcome> {
        let raw = self
            .session
            .action(MULTIPLE_ACTION_METHOD, &request.params(), false, None)
            .await
            .inspect_err(|error| self.state.set_error(error.to_string()))?;
        let result = serde_json::from_value::<MultipleActionResult>(raw)
            .map_err(|source| ClientError::Decode {
                what: "bulk action result",
                source,
            })?;
        info!(
            method = %request.action.method,
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            "bulk action finished"
        );
        self.state.record_bulk_result(result.clone());
        self.emit(ReportEvent::BulkCompleted {
            succeeded: result.succeeded_count(),
            failed: result.failed_count(),
        });
        self.fetch_report().await?;
        Ok(BulkOutcome::Completed(result))
    }

    async fn after_expansion(&mut self, expansion: Expansion) {
        if let Expansion::Expanded { item_id, fragments } = expansion {
            self.emit(ReportEvent::ItemExpanded(item_id));
            self.load_fragments(fragments).await;
        }
    }

    async fn load_fragments(&mut self, fragments: Vec<LazyFragment>) {
        for fragment in fragments {
            let content =
                load_fragment(self.session.client(), &self.fragment_base, &fragment).await;
            self.state.record_fragment(fragment.key, content);
        }
    }

    fn emit(&self, event: ReportEvent) {
        let _ = self.events.send(event);
    }
}
