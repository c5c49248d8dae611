//! # Design
//!
//! - One error enum for every remote operation the client performs.
//! - Transport failures keep the status and raw body so callers can render them.
//! - Validation failures are not errors; they travel as typed outcomes instead.

use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by the transport, view sessions, and report controller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("request to {endpoint} failed with status {status}")]
    Transport {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The request never produced a response.
    #[error("request to {endpoint} could not be completed")]
    Network {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// A response body did not match the expected shape.
    #[error("failed to decode {what}")]
    Decode {
        /// Description of the payload being decoded.
        what: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// An endpoint URL could not be built.
    #[error("invalid endpoint url")]
    InvalidUrl {
        /// Text that failed to parse.
        input: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    HttpClient {
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// A configured header value contained invalid characters.
    #[error("invalid value for header {name}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
    },
    /// A required lookup parameter was blank.
    #[error("`{name}` must not be empty")]
    EmptyParameter {
        /// Parameter name.
        name: &'static str,
    },
    /// View parameters lacked the mandatory slug.
    #[error("view parameters are missing `view_slug`")]
    MissingViewSlug,
    /// No action with the requested method exists.
    #[error("unknown action `{method}`")]
    UnknownAction {
        /// Requested method name.
        method: String,
    },
    /// No row with the requested identifier is loaded.
    #[error("unknown report item `{item_id}`")]
    UnknownItem {
        /// Requested identifier.
        item_id: String,
    },
    /// A bulk action was requested without any selection.
    #[error("no items selected")]
    NothingSelected,
}

impl ClientError {
    /// HTTP status for transport failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body returned alongside a transport failure.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Transport { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    pub(crate) const fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { what, source }
    }
}
