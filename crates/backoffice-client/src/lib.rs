#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! Client layer for the back-office dashboard API.
//!
//! [`ApiClient`] is the shared transport, [`ViewSession`] drives one
//! server-rendered view, and [`report::ReportListController`] layers report
//! paging, filtering, selection, and actions on top of a session.

pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod query;
pub mod report;
pub mod transport;
pub mod view;

pub use catalog::{SearchQuery, model_detail, search};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use notify::NotificationBus;
pub use query::QueryParams;
pub use transport::ApiClient;
pub use view::{ModalCloser, PostOutcome, ViewContent, ViewFailure, ViewSession};
