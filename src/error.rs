//! Error types for ergast-dl
//!
//! The taxonomy follows how a failure should be treated by the caller:
//! - [`Error::TransientServer`] is the only retry-eligible failure (HTTP 503, dropped connection)
//! - [`Error::Client`] covers every other non-2xx status, timeouts and malformed bodies
//! - [`Error::SchemaMismatch`] marks a response that lacks an expected key; callers skip the item
//! - [`Error::Parse`] marks a malformed structured-literal string; the flatten engine never
//!   lets it escape and substitutes an empty object instead

use thiserror::Error;

/// Result type alias for ergast-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ergast-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Upstream temporarily unable to answer (HTTP 503, connection reset or refused)
    #[error("transient server error for {url}: {reason}")]
    TransientServer {
        /// URL that failed
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Non-retryable request failure
    #[error("client error for {url}: {reason}")]
    Client {
        /// URL that failed
        url: String,
        /// HTTP status, when the server answered at all
        status: Option<u16>,
        /// What went wrong
        reason: String,
    },

    /// A parsed response lacks a key the caller relies on
    #[error("schema mismatch in {context}: missing key '{key}'")]
    SchemaMismatch {
        /// Where the lookup happened (URL, season/round or record description)
        context: String,
        /// The missing key
        key: String,
    },

    /// Malformed structured-literal string
    #[error("parse error: {0}")]
    Parse(String),

    /// Caller passed a value outside the accepted domain
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "page_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::SchemaMismatch`]
    pub fn schema(context: impl Into<String>, key: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            context: context.into(),
            key: key.into(),
        }
    }

    /// Build a [`Error::Config`] for a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used as the `kind` field in log lines
    pub fn code(&self) -> &'static str {
        match self {
            Error::TransientServer { .. } => "transient_server",
            Error::Client { .. } => "client_error",
            Error::SchemaMismatch { .. } => "schema_mismatch",
            Error::Parse(_) => "parse_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// HTTP status attached to the failure, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TransientServer { .. } => None,
            Error::Client { status, .. } => *status,
            _ => None,
        }
    }
}
