//! Error types for dynamo-pager
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Reaching the end of a paginated sequence is *not* an error; see
//! [`crate::pagination::Next`].

use thiserror::Error;

/// The main error type for dynamo-pager
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Invalid continuation token: {message}")]
    InvalidToken { message: String },

    #[error("Page fetch failed: {message}")]
    Fetch { message: String },

    // ============================================================================
    // Store Errors
    // ============================================================================
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Conditional check failed for item {key}")]
    ConditionalCheckFailed { key: String },

    #[error("Batch of {size} requests exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("{count} write requests were left unprocessed")]
    UnprocessedItems { count: usize },

    #[error("Item is missing key attribute '{attribute}'")]
    MissingKeyAttribute { attribute: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    // ============================================================================
    // Expression Errors
    // ============================================================================
    #[error("Expression error: {message}")]
    Expression { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid token error
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a missing key attribute error
    pub fn missing_key(attribute: impl Into<String>) -> Self {
        Self::MissingKeyAttribute {
            attribute: attribute.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Create an expression error
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    /// Check if retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch { .. } | Error::Store { .. } | Error::UnprocessedItems { .. } => true,
            Error::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, past any added context
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for dynamo-pager
pub type Result<T> = std::result::Result<T, Error>;

/// Say what was being attempted when an error surfaced. The original error
/// stays reachable through [`Error::root`] and `std::error::Error::source`.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        let message = message.into();
        self.with_context(|| message)
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}
