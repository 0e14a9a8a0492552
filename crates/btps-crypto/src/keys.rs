//! RSA key handling
//!
//! Loads PEM-encoded RSA keys (PKCS#8 or the older PKCS#1 armor) and
//! computes the public-key fingerprint that signed envelopes pin:
//! base64(SHA-256(DER-encoded SPKI)).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// An RSA key pair owned by a sending identity.
///
/// The private half is zeroized on drop by the underlying key type.
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Load a key pair from a PEM-encoded private key.
    ///
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) armors.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(format!("private key: {}", e)))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Generate a fresh pair. Used by tests and provisioning tooling.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| CryptoError::InvalidKey(format!("key generation: {}", e)))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// The PKCS#8 PEM of the private half. Exists for provisioning and
    /// test fixtures; handle with care.
    pub fn private_key_pem(&self) -> CryptoResult<String> {
        use rsa::pkcs8::EncodePrivateKey;
        self.private
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::InvalidKey(format!("private key encoding: {}", e)))
    }

    /// The SPKI PEM of the public half, as published in DNS.
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        self.public
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(format!("public key encoding: {}", e)))
    }

    /// Fingerprint of the public half. See [`fingerprint`].
    pub fn fingerprint(&self) -> CryptoResult<String> {
        fingerprint(&self.public)
    }
}

/// Parse a PEM public key (SPKI or PKCS#1 armor).
pub fn public_key_from_pem(pem: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("public key: {}", e)))
}

/// Compute base64(SHA-256(SPKI DER)) for a public key.
///
/// This is the value carried in `signature.fingerprint` and checked
/// against the DNS-resolved key during verification.
pub fn fingerprint(key: &RsaPublicKey) -> CryptoResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::InvalidKey(format!("public key encoding: {}", e)))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(BASE64.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_reload() {
        let pair = KeyPair::generate(2048).unwrap();
        let pem = pair.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let reloaded = public_key_from_pem(&pem).unwrap();
        assert_eq!(&reloaded, pair.public_key());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let pair = KeyPair::generate(2048).unwrap();
        let a = pair.fingerprint().unwrap();
        let b = fingerprint(pair.public_key()).unwrap();
        assert_eq!(a, b);
        // SHA-256 output is 32 bytes, so base64 is 44 chars with padding.
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn test_fingerprints_differ_between_keys() {
        let a = KeyPair::generate(2048).unwrap();
        let b = KeyPair::generate(2048).unwrap();
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        assert!(KeyPair::from_pem("not a key").is_err());
        assert!(public_key_from_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----").is_err());
    }
}
