//! Error types for btps-resolver

use thiserror::Error;

/// Errors that can occur while resolving BTPS records.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    /// The DNS query itself failed (timeout, servfail, no records).
    /// Transient: the next attempt may see a healthy resolver.
    #[error("DNS resolution failed for {name}: {reason}")]
    DnsLookupFailed { name: String, reason: String },

    /// The record exists but lacks a required field. Terminal: retrying
    /// cannot fix a misconfigured zone.
    #[error("Missing `{field}` in BTPS record for {name}")]
    MissingConfiguration { name: String, field: String },

    /// The record names a protocol version we do not speak.
    #[error("Unsupported protocol version in record for {name}: expected {expected}, got {actual}")]
    UnsupportedProtocolVersion {
        name: String,
        expected: String,
        actual: String,
    },

    /// A host value that cannot be parsed into host and port.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// A peer URL with a scheme other than `btps://`.
    #[error("Unsupported protocol scheme: {0}")]
    UnsupportedProtocol(String),
}

impl ResolverError {
    /// Whether a retry may recover this error. Only outright DNS lookup
    /// failures qualify; configuration problems are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DnsLookupFailed { .. })
    }
}

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolverError>;
