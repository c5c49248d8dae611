//! Pure state transitions for a report listing.
//!
//! Nothing here performs I/O; the controller drives the network and feeds
//! results back through [`ReportListState::apply_fetch`] and
//! [`ReportListState::apply_action_response`].

use std::collections::{BTreeMap, BTreeSet};

use backoffice_api_models::{
    ActionDescriptor, ActionResponse, ItemId, MultipleActionResult, ReportItem, ReportPayload,
};
use serde_json::{Value, json};

use crate::error::{ClientError, ClientResult};
use crate::query::QueryParams;
use crate::report::lazy::{FragmentContent, LazyFragment, lazy_fragments};
use crate::report::query::ReportQuery;

/// View parameter enabling multi-select mode.
pub const SELECT_MODE_PARAM: &str = "selectMode";
/// View parameter restricting rows to one action (`*` or a comma list).
pub const SINGLE_ACTION_PARAM: &str = "action";

/// Outcome of toggling a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The row opened; its lazy fragments should be loaded.
    Expanded {
        /// Row that opened.
        item_id: ItemId,
        /// Placeholders found in the row's detail HTML.
        fragments: Vec<LazyFragment>,
    },
    /// The row closed.
    Collapsed(ItemId),
    /// Nothing changed.
    Ignored,
}

/// Bulk action together with the rows it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    /// Action to run.
    pub action: ActionDescriptor,
    /// Selected rows on the current page.
    pub items: Vec<ItemId>,
    /// Every row matching the query is selected.
    pub global: bool,
}

impl BulkRequest {
    fn joined_items(&self) -> String {
        self.items
            .iter()
            .map(ItemId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// JSON parameters for the bulk RPC.
    #[must_use]
    pub fn params(&self) -> Value {
        json!({
            "report_method": self.action.method,
            "items": self.joined_items(),
            "global": self.global,
        })
    }

    /// Query parameters for the bulk navigation link.
    #[must_use]
    pub fn link_params(&self) -> QueryParams {
        QueryParams::new()
            .with("report_method", self.action.method.clone())
            .with("items", self.joined_items())
            .with("global", self.global.to_string())
    }
}

/// Action staged until the user confirms it.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Single-row action.
    Single {
        /// Row the action targets.
        item_id: ItemId,
        /// Action to run.
        action: ActionDescriptor,
    },
    /// Bulk action.
    Multiple(BulkRequest),
}

impl PendingAction {
    /// Confirmation text to show.
    #[must_use]
    pub fn prompt(&self) -> &str {
        let action = match self {
            Self::Single { action, .. } => action,
            Self::Multiple(request) => &request.action,
        };
        action.confirmation_prompt().unwrap_or_default()
    }
}

/// What to do with a single-row action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPlan {
    /// Navigate to the action's link.
    Navigate(ActionDescriptor),
    /// Render the action's form first.
    OpenForm(ActionDescriptor),
    /// Staged; waiting for confirmation.
    AwaitConfirmation(String),
    /// Invoke immediately.
    Execute(ActionDescriptor),
}

/// What to do with a bulk action.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkPlan {
    /// No action chosen.
    Skip,
    /// Navigate with the selection encoded in the link.
    Navigate(BulkRequest),
    /// Staged; waiting for confirmation.
    AwaitConfirmation(String),
    /// Invoke immediately.
    Execute(BulkRequest),
}

/// Ticket identifying one issued fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Query the fetch was issued for.
    pub query: ReportQuery,
}

/// Whether a fetch result was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    /// The payload replaced the listing.
    Applied {
        /// Expansion of the only row, when exactly one matched.
        auto_expanded: Option<Expansion>,
    },
    /// A newer fetch already landed; the payload was dropped.
    Stale,
}

/// Side effects of applying an action result to a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    /// Rows toggled as a consequence.
    pub expansions: Vec<Expansion>,
    /// Fragments of the mutated row to reload.
    pub fragments: Vec<LazyFragment>,
}

/// Filter, ordering, pagination, and selection state of one report.
#[derive(Debug, Clone, Default)]
pub struct ReportListState {
    query: ReportQuery,
    edited_filters: BTreeMap<String, String>,
    report: Option<ReportPayload>,
    selected: BTreeSet<ItemId>,
    all_selected: bool,
    multiple_actions: BTreeMap<String, ActionDescriptor>,
    pending: Option<PendingAction>,
    fragments: BTreeMap<String, FragmentContent>,
    select_mode: bool,
    single_action: Option<String>,
    last_error: Option<String>,
    bulk_result: Option<MultipleActionResult>,
    issued_seq: u64,
    applied_seq: u64,
}

impl ReportListState {
    /// Fresh state.
    #[must_use]
    pub fn new(select_mode: bool, single_action: Option<String>) -> Self {
        Self {
            select_mode,
            single_action: single_action.filter(|action| !action.is_empty()),
            ..Self::default()
        }
    }

    /// Fresh state configured from view parameters.
    #[must_use]
    pub fn from_view_params(params: &QueryParams) -> Self {
        Self::new(
            params.get(SELECT_MODE_PARAM) == Some("true"),
            params.get(SINGLE_ACTION_PARAM).map(str::to_string),
        )
    }

    /// Current canonical query.
    #[must_use]
    pub const fn query(&self) -> &ReportQuery {
        &self.query
    }

    /// Latest applied payload.
    #[must_use]
    pub const fn report(&self) -> Option<&ReportPayload> {
        self.report.as_ref()
    }

    /// Rows on the current page.
    #[must_use]
    pub fn items(&self) -> &[ReportItem] {
        self.report
            .as_ref()
            .map_or(&[], |report| report.items.as_slice())
    }

    /// Look up a row.
    #[must_use]
    pub fn item(&self, item_id: &ItemId) -> Option<&ReportItem> {
        self.items().iter().find(|item| &item.item_id == item_id)
    }

    /// Current page.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.query.page
    }

    /// Page count of the latest payload.
    #[must_use]
    pub fn page_count(&self) -> Option<u64> {
        self.report.as_ref().map(ReportPayload::page_count)
    }

    /// Whether rows are picked rather than expanded.
    #[must_use]
    pub const fn select_mode(&self) -> bool {
        self.select_mode
    }

    /// Last fetch or action failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a failure for display.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Result of the last bulk action.
    #[must_use]
    pub const fn bulk_result(&self) -> Option<&MultipleActionResult> {
        self.bulk_result.as_ref()
    }

    /// Record the result of a bulk action.
    pub fn record_bulk_result(&mut self, result: MultipleActionResult) {
        self.bulk_result = Some(result);
    }

    /// Replace the query from location search parameters.
    pub fn navigate(&mut self, search: &QueryParams) {
        self.query = ReportQuery::from_search(search);
    }

    /// Move to page `page`.
    ///
    /// Returns `false`, changing nothing, when no report is loaded, the page
    /// is out of range, or it is already current.
    pub fn change_page(&mut self, page: u32) -> bool {
        let Some(page_count) = self.page_count() else {
            return false;
        };
        if page < 1 || u64::from(page) > page_count || page == self.query.page {
            return false;
        }
        self.query.page = page;
        true
    }

    /// Order by `field`, toggling direction when it is already the ascending
    /// order field. Always returns to page 1.
    pub fn change_order(&mut self, field: &str) {
        let ascending = match &self.report {
            Some(report) => {
                report.extra.order_by.as_deref() != Some(field) || !report.extra.ascending
            }
            None => self.query.order_field() != Some((field, true)),
        };
        self.query.order = Some(if ascending {
            field.to_string()
        } else {
            format!("-{field}")
        });
        self.query.page = 1;
    }

    /// Filters being edited, not yet applied.
    #[must_use]
    pub const fn edited_filters(&self) -> &BTreeMap<String, String> {
        &self.edited_filters
    }

    /// Edit one filter value.
    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.edited_filters.insert(key.into(), value.into());
    }

    /// Drop one edited filter.
    pub fn clear_filter(&mut self, key: &str) {
        self.edited_filters.remove(key);
    }

    /// Apply edited filters, keeping the order and returning to page 1.
    pub fn apply_filters(&mut self) {
        self.query = ReportQuery {
            page: 1,
            order: self.query.order.take(),
            filters: self.edited_filters.clone(),
        };
    }

    /// Drop every filter, keeping the order and returning to page 1.
    pub fn remove_filters(&mut self) {
        self.edited_filters.clear();
        self.query.filters.clear();
        self.query.page = 1;
    }

    /// Whether the applied query filters anything.
    #[must_use]
    pub fn has_applied_filters(&self) -> bool {
        !self.query.filters.is_empty() && self.show_search()
    }

    /// Start a fetch for the current query.
    ///
    /// Edited filters are re-synchronised with the applied ones.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued_seq += 1;
        self.edited_filters = self.query.filters.clone();
        FetchTicket {
            seq: self.issued_seq,
            query: self.query.clone(),
        }
    }

    /// Apply a fetched payload unless a newer one already landed.
    ///
    /// Clears the selection, rebuilds the bulk-action index, and expands the
    /// only row when exactly one item matched.
    pub fn apply_fetch(&mut self, seq: u64, payload: ReportPayload) -> FetchDisposition {
        if seq <= self.applied_seq {
            return FetchDisposition::Stale;
        }
        self.applied_seq = seq;
        self.multiple_actions = payload
            .multiple_action_list
            .iter()
            .map(|action| (action.method.clone(), action.clone()))
            .collect();
        self.selected.clear();
        self.all_selected = false;
        self.last_error = None;

        let only_item = (payload.item_count == 1)
            .then(|| payload.items.first().map(|item| item.item_id.clone()))
            .flatten();
        self.report = Some(payload);
        FetchDisposition::Applied {
            auto_expanded: only_item.map(|item_id| self.toggle_expand(&item_id)),
        }
    }

    /// Record a failed fetch unless a newer one already landed.
    pub fn fail_fetch(&mut self, seq: u64, message: impl Into<String>) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.last_error = Some(message.into());
        true
    }

    /// Open or close a row.
    ///
    /// Ignored in select mode and for rows with nothing to show.
    pub fn toggle_expand(&mut self, item_id: &ItemId) -> Expansion {
        if self.select_mode {
            return Expansion::Ignored;
        }
        let Some(item) = self.item_mut(item_id) else {
            return Expansion::Ignored;
        };
        if !item.expanded && item.has_expanded_content() {
            item.expanded = true;
            Expansion::Expanded {
                item_id: item.item_id.clone(),
                fragments: lazy_fragments(&item.extra_information),
            }
        } else if item.expanded {
            item.expanded = false;
            Expansion::Collapsed(item.item_id.clone())
        } else {
            Expansion::Ignored
        }
    }

    /// Loaded fragment for a placeholder key.
    #[must_use]
    pub fn fragment(&self, key: &str) -> Option<&FragmentContent> {
        self.fragments.get(key)
    }

    /// Store a loaded fragment.
    pub fn record_fragment(&mut self, key: impl Into<String>, content: FragmentContent) {
        self.fragments.insert(key.into(), content);
    }

    /// Mark a row selected or not; deselecting clears "all selected".
    pub fn set_selected(&mut self, item_id: ItemId, selected: bool) {
        if selected {
            self.selected.insert(item_id);
        } else {
            self.all_selected = false;
            self.selected.remove(&item_id);
        }
    }

    /// Select or clear every row on the page.
    pub fn select_all(&mut self, all: bool) {
        self.all_selected = all;
        self.selected.clear();
        if all {
            let ids: Vec<ItemId> = self.items().iter().map(|item| item.item_id.clone()).collect();
            self.selected.extend(ids);
        }
    }

    /// Whether the page-level "select all" box is ticked.
    #[must_use]
    pub const fn all_selected(&self) -> bool {
        self.all_selected
    }

    /// Extend the selection to every row matching the query.
    pub fn set_global_selection(&mut self, global: bool) {
        if let Some(report) = self.report.as_mut() {
            report.all_selected_global = global;
        }
    }

    /// Whether every row matching the query is selected.
    #[must_use]
    pub fn all_selected_global(&self) -> bool {
        self.report
            .as_ref()
            .is_some_and(|report| report.all_selected_global)
    }

    /// Whether a row is selected.
    #[must_use]
    pub fn is_selected(&self, item_id: &ItemId) -> bool {
        self.selected.contains(item_id)
    }

    /// Selected rows.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected.iter().cloned().collect()
    }

    /// Number of selected rows.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Bulk action by method name.
    #[must_use]
    pub fn multiple_action(&self, method: &str) -> Option<&ActionDescriptor> {
        self.multiple_actions.get(method)
    }

    /// Whether search or filter inputs exist.
    #[must_use]
    pub fn show_search(&self) -> bool {
        self.report.as_ref().is_some_and(ReportPayload::has_search)
    }

    /// Whether the bulk-action menu is shown.
    #[must_use]
    pub fn show_action_select(&self) -> bool {
        self.report
            .as_ref()
            .is_some_and(|report| report.multiple_actions)
            && !self.selected.is_empty()
    }

    /// Whether the report header is shown.
    #[must_use]
    pub fn show_header(&self) -> bool {
        self.report
            .as_ref()
            .is_some_and(|report| report.report_header_visible)
            && self.single_action.is_none()
            && (self.show_search() || self.show_action_select())
    }

    /// Whether `action` is the one action shown per row.
    #[must_use]
    pub fn is_single_action(&self, action: &ActionDescriptor) -> bool {
        let Some(single) = self.single_action.as_deref() else {
            return false;
        };
        if action.is_inline_form() {
            return false;
        }
        single == "*" || single.split(',').any(|method| method == action.method)
    }

    /// Decide how to run a row action.
    ///
    /// # Errors
    ///
    /// Returns an error when the row or the action does not exist.
    pub fn plan_action(
        &mut self,
        item_id: &ItemId,
        method: &str,
        force: bool,
    ) -> ClientResult<ActionPlan> {
        let action = self.row_action(item_id, method)?;
        if action.is_link() {
            return Ok(ActionPlan::Navigate(action));
        }
        if action.requires_form() {
            return Ok(ActionPlan::OpenForm(action));
        }
        if !force {
            if let Some(prompt) = action.confirmation_prompt().map(str::to_string) {
                self.pending = Some(PendingAction::Single {
                    item_id: item_id.clone(),
                    action,
                });
                return Ok(ActionPlan::AwaitConfirmation(prompt));
            }
        }
        Ok(ActionPlan::Execute(action))
    }

    /// Action on a row.
    ///
    /// # Errors
    ///
    /// Returns an error when the row or the action does not exist.
    pub fn row_action(&self, item_id: &ItemId, method: &str) -> ClientResult<ActionDescriptor> {
        self.item(item_id)
            .ok_or_else(|| ClientError::UnknownItem {
                item_id: item_id.to_string(),
            })?
            .find_action(method)
            .cloned()
            .ok_or_else(|| ClientError::UnknownAction {
                method: method.to_string(),
            })
    }

    /// Decide how to run a bulk action.
    ///
    /// # Errors
    ///
    /// Returns an error when the action does not exist or nothing is
    /// selected without the global flag.
    pub fn plan_multiple(&mut self, method: &str, force: bool) -> ClientResult<BulkPlan> {
        if method.is_empty() {
            return Ok(BulkPlan::Skip);
        }
        let action = self
            .multiple_action(method)
            .cloned()
            .ok_or_else(|| ClientError::UnknownAction {
                method: method.to_string(),
            })?;
        let request = BulkRequest {
            action,
            items: self.selected_ids(),
            global: self.all_selected_global(),
        };
        if request.items.is_empty() && !request.global {
            return Err(ClientError::NothingSelected);
        }
        if request.action.is_link() {
            return Ok(BulkPlan::Navigate(request));
        }
        if !force {
            if let Some(prompt) = request.action.confirmation_prompt().map(str::to_string) {
                self.pending = Some(PendingAction::Multiple(request));
                return Ok(BulkPlan::AwaitConfirmation(prompt));
            }
        }
        Ok(BulkPlan::Execute(request))
    }

    /// Action waiting for confirmation.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Take the staged action for execution.
    pub fn take_pending(&mut self) -> Option<PendingAction> {
        self.pending.take()
    }

    /// Drop the staged action.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Apply the result of a row action.
    ///
    /// A mutated row is merged in place; a removed row is spliced out. With
    /// `expand_next` the following row is opened.
    ///
    /// # Errors
    ///
    /// Returns an error when the row is no longer listed.
    pub fn apply_action_response(
        &mut self,
        item_id: &ItemId,
        response: ActionResponse,
        expand_next: bool,
    ) -> ClientResult<ItemUpdate> {
        let index = self
            .items()
            .iter()
            .position(|item| &item.item_id == item_id)
            .ok_or_else(|| ClientError::UnknownItem {
                item_id: item_id.to_string(),
            })?;
        let next_id = self.items().get(index + 1).map(|item| item.item_id.clone());
        let mut update = ItemUpdate::default();

        match response {
            ActionResponse::Mutated { item, .. } => {
                let Some(row) = self.report.as_mut().and_then(|r| r.items.get_mut(index)) else {
                    return Ok(update);
                };
                row.merge_from(*item);
                let current_id = row.item_id.clone();
                update.fragments = lazy_fragments(&row.extra_information);
                if let (true, Some(next_id)) = (expand_next, next_id) {
                    update.expansions.push(self.toggle_expand(&current_id));
                    update.expansions.push(self.toggle_expand(&next_id));
                }
            }
            ActionResponse::Removed { .. } => {
                if let (true, Some(next_id)) = (expand_next, next_id) {
                    update.expansions.push(self.toggle_expand(&next_id));
                }
                if let Some(report) = self.report.as_mut() {
                    report.items.remove(index);
                }
                self.selected.remove(item_id);
            }
            ActionResponse::Info(_) => {}
        }
        Ok(update)
    }

    fn item_mut(&mut self, item_id: &ItemId) -> Option<&mut ReportItem> {
        self.report
            .as_mut()?
            .items
            .iter_mut()
            .find(|item| &item.item_id == item_id)
    }
}
