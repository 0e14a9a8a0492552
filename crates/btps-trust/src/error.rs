//! Error types for btps-trust

use thiserror::Error;

/// Errors that can occur in trust store operations.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    /// A record with this id already exists.
    #[error("Trust record already exists: {0}")]
    Conflict(String),

    /// No record with this id.
    #[error("Trust record not found: {0}")]
    NotFound(String),

    /// Disk I/O failure. The dirty flag is re-set so the next flush
    /// retries the write.
    #[error("Trust store I/O error: {0}")]
    Io(String),

    /// The store file exists but is not valid JSON in either accepted
    /// container shape. Terminal.
    #[error("Trust store file is corrupt: {0}")]
    Corrupt(String),

    /// The advisory lock could not be acquired within the retry budget.
    #[error("Trust store lock contended after {attempts} attempts: {path}")]
    LockContended { path: String, attempts: u32 },
}

impl From<std::io::Error> for TrustStoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for trust store operations
pub type TrustStoreResult<T> = Result<T, TrustStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrustStoreError::Conflict("abc123".to_string());
        assert!(format!("{}", err).contains("abc123"));

        let err = TrustStoreError::NotFound("missing".to_string());
        assert!(format!("{}", err).contains("missing"));

        let err = TrustStoreError::LockContended {
            path: "/tmp/trust.json.lock".to_string(),
            attempts: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("5"));
        assert!(msg.contains("trust.json.lock"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TrustStoreError = io.into();
        assert!(matches!(err, TrustStoreError::Io(_)));
    }
}
