//! Error types for btps-crypto

use thiserror::Error;

/// Errors that can occur during artifact cryptography.
///
/// Every variant here is terminal: a signature or decryption failure can
/// never be recovered by retrying the same bytes.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("Key fingerprint mismatch: envelope pinned {pinned}, key is {actual}")]
    FingerprintMismatch { pinned: String, actual: String },

    #[error("Canonicalization failed: {0}")]
    CanonicalizationFailed(String),

    #[error("Second factor required for 2faEncrypt but none supplied")]
    MissingSecondFactor,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
