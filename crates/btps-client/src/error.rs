//! Error types and classification for the client connector
//!
//! [`ErrorKind`] is the classification surface carried on `Error`
//! events, and [`ClientError::is_transient`] decides whether the retry
//! machinery may re-run the connect pipeline.

use thiserror::Error;

use btps_core::ValidationError;
use btps_crypto::CryptoError;
use btps_resolver::ResolverError;

/// Errors that can occur in the client connector.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("Connection timeout after {0} ms")]
    ConnectionTimeout(u64),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Wire syntax error: {0}")]
    Syntax(String),

    #[error("Inbound line exceeds the {max}-byte limit")]
    LineTooLong { max: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Client not connected")]
    NotConnected,

    #[error("Client is destroyed")]
    Destroyed,

    /// An error reconstructed from an `Error` event, for callers that
    /// turn the event stream back into a `Result` (session bootstrap).
    #[error("{message}")]
    Reported { kind: ErrorKind, message: String },
}

/// The error taxonomy carried on `Error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentity,
    InvalidHostname,
    UnsupportedProtocol,
    DnsResolutionFailed,
    ConnectionTimeout,
    TlsError,
    SocketError,
    SyntaxError,
    SignatureVerificationFailed,
    DecryptionFailed,
    SchemaValidationError,
    NotConnected,
    Destroyed,
}

impl ClientError {
    /// Classify this error for the event surface.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentity(_) => ErrorKind::InvalidIdentity,
            Self::Resolver(e) => match e {
                ResolverError::DnsLookupFailed { .. } => ErrorKind::DnsResolutionFailed,
                ResolverError::InvalidHostname(_) => ErrorKind::InvalidHostname,
                ResolverError::UnsupportedProtocol(_) => ErrorKind::UnsupportedProtocol,
                ResolverError::MissingConfiguration { .. }
                | ResolverError::UnsupportedProtocolVersion { .. } => {
                    ErrorKind::UnsupportedProtocol
                }
            },
            Self::ConnectionTimeout(_) => ErrorKind::ConnectionTimeout,
            Self::Tls(_) => ErrorKind::TlsError,
            Self::Socket(_) => ErrorKind::SocketError,
            Self::Syntax(_) | Self::LineTooLong { .. } => ErrorKind::SyntaxError,
            Self::Crypto(e) => match e {
                CryptoError::DecryptionFailed(_) | CryptoError::MissingSecondFactor => {
                    ErrorKind::DecryptionFailed
                }
                _ => ErrorKind::SignatureVerificationFailed,
            },
            Self::Validation(_) => ErrorKind::SchemaValidationError,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Destroyed => ErrorKind::Destroyed,
            Self::Reported { kind, .. } => *kind,
        }
    }

    /// Whether a retry of the full connect pipeline may recover this
    /// error. Exactly three classes qualify: DNS lookup failures,
    /// connection timeouts, and socket errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DnsResolutionFailed | ErrorKind::ConnectionTimeout | ErrorKind::SocketError
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Socket(e.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
