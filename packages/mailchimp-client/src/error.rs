//! Error types for the MailChimp client.

use thiserror::Error;

/// Result type for MailChimp client operations.
pub type Result<T> = std::result::Result<T, MailchimpError>;

/// Code reported for failures that never reached the API (DNS, TLS, timeout).
pub const TRANSPORT_ERROR_CODE: &str = "http_request_failed";

/// MailChimp client errors.
///
/// Every variant carries a provider-style `code` and a human readable
/// `message` so callers can report failures without matching on variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailchimpError {
    /// The request never produced an HTTP response.
    #[error("transport error ({code}): {message}")]
    Transport { code: String, message: String },

    /// MailChimp answered with a status >= 400.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A 2xx response whose body was not the JSON we expected.
    #[error("parse error: {0}")]
    Parse(String),
}

impl MailchimpError {
    /// Build a transport error with the generic transport code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            code: TRANSPORT_ERROR_CODE.to_string(),
            message: message.into(),
        }
    }

    /// Provider error code.
    pub fn code(&self) -> &str {
        match self {
            Self::Transport { code, .. } | Self::Api { code, .. } => code,
            Self::Parse(_) => "parse_error",
        }
    }

    /// Provider error message.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message, .. } | Self::Api { message, .. } => message,
            Self::Parse(message) => message,
        }
    }

    /// HTTP status, when the API answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MailchimpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
