//! Error types for the Eureka client

use std::path::PathBuf;
use thiserror::Error;

/// Eureka client error type
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration resource could not be located
    #[error("cannot locate {name} as a configuration resource (searched: {searched:?})")]
    MissingResource {
        /// Resource file name that was looked up
        name: String,
        /// Directories that were searched
        searched: Vec<PathBuf>,
    },

    /// Configuration is structurally invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A configuration property has a value of the wrong shape
    #[error("invalid value for property '{key}': {value}")]
    InvalidProperty {
        /// Property key
        key: String,
        /// Offending value
        value: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with a status code the operation does not accept
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// Every configured registry server failed the request
    #[error("all {attempted} registry servers failed, last error: {last}")]
    AllServersFailed {
        /// Number of servers tried
        attempted: usize,
        /// Error reported by the last server
        last: Box<Error>,
    },

    /// No registry service URL is configured
    #[error("no Eureka service URLs configured")]
    NoServiceUrls,

    /// The client has been shut down
    #[error("client has been shut down")]
    Shutdown,

    /// Unrecoverable failure, retrying cannot help
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create an invalid property error
    pub fn invalid_property(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether the error describes a condition that retrying will not fix.
    ///
    /// Callers polling the registry swallow non-fatal errors and retry;
    /// fatal ones must be escalated.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Fatal(_) | Error::NoServiceUrls | Error::Config(_) => true,
            Error::AllServersFailed { last, .. } => last.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
