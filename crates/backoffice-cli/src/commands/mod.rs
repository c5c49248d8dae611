//! Command handlers grouped by concern.

pub(crate) mod catalog;
pub(crate) mod report;
pub(crate) mod view;
