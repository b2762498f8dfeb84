//! Error types for discovery

use thiserror::Error;

/// Discovery error type
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Registry client failure, including configuration loading
    #[error("Eureka client error: {0}")]
    Client(#[from] eureka_client::Error),

    /// A plugin property has a value of the wrong type
    #[error("invalid value for property '{key}': {value}")]
    InvalidProperty {
        /// Property key
        key: String,
        /// Offending value
        value: String,
    },

    /// A construction precondition does not hold
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl DiscoveryError {
    /// Create a precondition error
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition(reason.into())
    }

    /// Whether the error is a fatal registry client error
    pub fn is_fatal(&self) -> bool {
        match self {
            DiscoveryError::Client(e) => e.is_fatal(),
            _ => true,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DiscoveryError>;
