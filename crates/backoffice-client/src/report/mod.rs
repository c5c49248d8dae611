//! Report listings: query derivation, pure state, and the async controller.

pub mod controller;
pub mod lazy;
pub mod query;
pub mod state;

pub use controller::{
    ActionOutcome, BulkOutcome, ConfirmedOutcome, ReportEvent, ReportListController,
};
pub use lazy::{FragmentContent, LazyFragment, lazy_fragments};
pub use query::ReportQuery;
pub use state::{
    ActionPlan, BulkPlan, BulkRequest, Expansion, FetchDisposition, FetchTicket, ItemUpdate,
    PendingAction, ReportListState,
};
