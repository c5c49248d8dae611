#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::pedantic, clippy::nursery)]

//! Logging primitives shared across the back-office workspace.
//!
//! The client library only emits `tracing` events; binaries call
//! [`init_logging`] once to decide how those events are rendered.

pub mod init;

pub use init::{
    CommandSpanGuard, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, compiled_build_sha,
    init_logging,
};
