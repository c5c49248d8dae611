//! Client construction, CLI errors, and argument parsers.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use backoffice_client::{ApiClient, ClientConfig, ClientError, NotificationBus, QueryParams};
use url::Url;

use crate::cli::{Cli, ViewTargetArgs};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ClientError> for CliError {
    fn from(error: ClientError) -> Self {
        let rejection = match &error {
            ClientError::MissingViewSlug
            | ClientError::EmptyParameter { .. }
            | ClientError::UnknownAction { .. }
            | ClientError::UnknownItem { .. }
            | ClientError::NothingSelected => Some(error.to_string()),
            ClientError::Transport {
                status: 400 | 409 | 422,
                body,
                ..
            } if !body.trim().is_empty() => Some(body.trim().to_string()),
            _ => None,
        };
        match rejection {
            Some(message) => Self::validation(message),
            None => Self::failure(error),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) api: ApiClient,
    pub(crate) notifications: NotificationBus,
    pub(crate) report_base: Url,
}

impl AppContext {
    /// Build the shared client from global flags.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut config = ClientConfig::new(cli.api_url.clone())
            .with_timeout(Duration::from_secs(cli.timeout))
            .with_slow_threshold(Duration::from_millis(cli.slow_ms))
            .with_request_id(trace_id);
        if let Some(cookie) = cli.cookie.as_deref() {
            config = config.with_cookie(cookie);
        }
        let report_base = cli
            .report_url
            .clone()
            .unwrap_or_else(|| config.api_base.clone());
        Self::with_config(config, report_base)
    }

    pub(crate) fn with_config(config: ClientConfig, report_base: Url) -> CliResult<Self> {
        let notifications = NotificationBus::new();
        let api = ApiClient::new(config, notifications.clone())
            .map_err(|err| CliError::failure(anyhow!(err).context("failed to build HTTP client")))?;
        Ok(Self {
            api,
            notifications,
            report_base: backoffice_client::config::normalize_base(report_base),
        })
    }
}

/// View parameters from `--slug` and repeated `--param` flags.
pub(crate) fn view_params(target: &ViewTargetArgs) -> CliResult<QueryParams> {
    let slug = target.slug.trim();
    if slug.is_empty() {
        return Err(CliError::validation("view slug must not be empty"));
    }
    let mut params: QueryParams = target.params.iter().cloned().collect();
    params.insert("view_slug", slug);
    Ok(params)
}

pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    Url::parse(input).map_err(|err| format!("invalid URL '{input}': {err}"))
}

pub(crate) fn parse_key_value(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{input}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{input}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
