//! Subscriber installation for back-office binaries.
//!
//! # Design
//! - One entry point decides how every `tracing` event in the process is rendered.
//! - Logs go to stderr so command output on stdout stays machine-readable.
//! - The build SHA is recorded once and stamped on every command span.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing::span::Entered;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when neither `RUST_LOG` nor a level flag is given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::level`].
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_owned());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry.with(layer.json().flatten_event(true)).try_init(),
        LogFormat::Pretty => registry.with(layer.compact()).try_init(),
    };
    installed.map_err(|err| anyhow!("tracing subscriber could not be installed: {err}"))
}

/// Build identifier baked in at compile time from `BACKOFFICE_BUILD_SHA`, or
/// `dev` when the variable was unset.
#[must_use]
pub const fn compiled_build_sha() -> &'static str {
    match option_env!("BACKOFFICE_BUILD_SHA") {
        Some(sha) => sha,
        None => "dev",
    }
}

/// Build identifier recorded by [`init_logging`], or `dev`.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Inputs to [`init_logging`].
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig<'a> {
    /// Filter directive such as `info` or `backoffice_client=debug`.
    pub level: &'a str,
    /// Rendering of each event.
    pub format: LogFormat,
    /// Build identifier stamped on command spans.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: compiled_build_sha(),
        }
    }
}

/// Event rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            "" | "auto" => Ok(Self::infer()),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Span covering one CLI invocation, tagged with the command and trace id.
///
/// The span is entered on construction and stays entered until the guard
/// drops.
pub struct CommandSpanGuard {
    _entered: Entered<'static>,
}

impl CommandSpanGuard {
    /// Enter the span.
    #[must_use]
    pub fn new(command: &str, trace_id: &str) -> Self {
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "command",
            command = %command,
            trace_id = %trace_id,
            build_sha = %build_sha()
        )));
        Self {
            _entered: span.enter(),
        }
    }
}
