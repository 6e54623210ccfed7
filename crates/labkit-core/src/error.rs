//! Error types for labkit.
//!
//! Every failure the core can produce maps onto an [`ErrorRecord`] so hosts
//! can report it without re-deriving the reason from a message string.

use thiserror::Error;

use crate::types::ErrorRecord;

/// Failure reported by an [`ApiClient`](crate::ApiClient) implementation.
///
/// Mirrors the fields the remote API's own error objects expose. `status` and
/// `reason` are absent when the request never produced an HTTP response
/// (connection refused, timeout).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub message: String,
    pub operation: String,
    pub reason: Option<String>,
    pub status: Option<u16>,
}

impl TransportError {
    /// Error for a response with an HTTP status.
    pub fn from_status(
        operation: impl Into<String>,
        status: u16,
        reason: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            operation: operation.into(),
            reason: reason.map(str::to_string),
            status: Some(status),
        }
    }

    /// Error without an HTTP status (no response, or an unusable one).
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            operation: operation.into(),
            reason: None,
            status: None,
        }
    }

    /// Whether the failure belongs to the retryable 5xx class.
    pub fn is_transient(&self) -> bool {
        self.status.is_some_and(is_transient_status)
    }

    fn record(&self, tag: &str) -> ErrorRecord {
        ErrorRecord {
            message: self.message.clone(),
            operation: Some(self.operation.clone()),
            reason: self.reason.clone(),
            status: self.status,
            tag: tag.to_string(),
        }
    }
}

/// HTTP 500, 502, 503, 504 and the whole 520-529 block.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504 | 520..=529)
}

/// Bad or missing connection parameters. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("base URL is required")]
    MissingUrl,

    #[error("invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported API version {0}, only v4 is available")]
    UnsupportedApiVersion(u32),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Reading, parsing or writing the config file failed
    #[error("{0}")]
    File(String),
}

/// Name-to-ID lookup failures. Never resolved by guessing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no {collection} match '{name}'")]
    NotFound { collection: String, name: String },

    #[error("'{name}' matches {count} {collection}, expected exactly one")]
    Ambiguous {
        collection: String,
        name: String,
        count: usize,
    },

    #[error("lookup of '{name}' failed: {source}")]
    ApiFailure {
        name: String,
        #[source]
        source: TransportError,
    },
}

impl ResolutionError {
    pub fn tag(&self) -> &'static str {
        match self {
            ResolutionError::NotFound { .. } => "not_found",
            ResolutionError::Ambiguous { .. } => "ambiguous",
            ResolutionError::ApiFailure { .. } => "api_failure",
        }
    }

    pub fn record(&self) -> ErrorRecord {
        match self {
            ResolutionError::ApiFailure { source, .. } => source.record(self.tag()),
            _ => ErrorRecord::local(self.to_string(), self.tag()),
        }
    }
}

/// Failures of a get or list call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Passed through unchanged from the resolver
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("get failed: {0}")]
    GetFailed(TransportError),

    #[error("list failed: {0}")]
    ListFailed(TransportError),
}

impl AccessError {
    pub fn tag(&self) -> &'static str {
        match self {
            AccessError::Resolution(e) => e.tag(),
            AccessError::GetFailed(_) => "get_failed",
            AccessError::ListFailed(_) => "list_failed",
        }
    }

    pub fn record(&self) -> ErrorRecord {
        match self {
            AccessError::Resolution(e) => e.record(),
            AccessError::GetFailed(e) | AccessError::ListFailed(e) => e.record(self.tag()),
        }
    }
}

/// Main error type for labkit operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn record(&self) -> ErrorRecord {
        match self {
            Error::Resolution(e) => e.record(),
            Error::Access(e) => e.record(),
            Error::Config(_) => ErrorRecord::local(self.to_string(), "config"),
            Error::Serialization(_) | Error::Other(_) => {
                ErrorRecord::local(self.to_string(), "internal")
            }
        }
    }
}

/// Result type alias for labkit operations.
pub type Result<T> = std::result::Result<T, Error>;
