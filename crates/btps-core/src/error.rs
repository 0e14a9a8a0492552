//! Shared error types for the BTPS core model

use thiserror::Error;

/// Top-level error type for the BTPS core model.
///
/// Aggregates the core's own error enums. Higher layers keep their own
/// operational enums (crypto, resolver, trust store, connector); this
/// type serves callers that work with the model alone.
#[derive(Debug, Clone, Error)]
pub enum BtpsError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for BTPS core operations
pub type BtpsResult<T> = Result<T, BtpsError>;

/// Errors produced while parsing identities.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid account label: {0}")]
    InvalidAccount(String),

    #[error("Invalid domain label: {0}")]
    InvalidDomain(String),
}

/// Errors produced by envelope and document validation.
///
/// Validation is total: every failure names the offending field path so a
/// caller (or the peer, in a `btps_error` frame) can report precisely what
/// was wrong.
#[derive(Debug, Clone, Error)]
#[error("Schema validation failed at `{path}`: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `document.lineItems.rows`.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for a field path.
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the field path with a parent segment.
    pub fn nested(mut self, parent: &str) -> Self {
        self.path = if self.path.is_empty() {
            parent.to_string()
        } else {
            format!("{}.{}", parent, self.path)
        };
        self
    }
}
