//! # BTPS Crypto
//!
//! Artifact cryptography for the BTPS protocol: canonical serialization,
//! RSA-SHA256 signatures, and hybrid RSA+AES document encryption.
//!
//! ## Canonical Form
//!
//! The signing input is the envelope with `signature` and `encryption`
//! removed, re-serialized with all object keys in lexicographic order
//! recursively and no insignificant whitespace. See [`canonical_bytes`]
//! for the published rules.
//!
//! ## Signing and Verification
//!
//! ```rust,ignore
//! use btps_crypto::{sign_envelope, verify_envelope, KeyPair};
//!
//! let keys = KeyPair::from_pem(private_pem)?;
//! sign_envelope(&mut envelope, &signer_identity, "btps1", &keys)?;
//! // ... on the receiving side, with the DNS-published public key:
//! verify_envelope(&envelope, &public_key)?;
//! ```
//!
//! ## Hybrid Encryption
//!
//! `standardEncrypt` seals the JSON document under a fresh random AES-256
//! key (CBC, PKCS#7) and wraps that key with the recipient's RSA key
//! (OAEP-SHA256). `2faEncrypt` additionally mixes a caller passphrase into
//! the key via PBKDF2 before wrapping.

pub mod canonical;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod signature;

pub use canonical::*;
pub use encryption::*;
pub use error::*;
pub use keys::*;
pub use signature::*;

// Re-export the RSA key types so dependents can name them without a
// direct rsa dependency.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
