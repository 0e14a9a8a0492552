//! Envelope signing and verification
//!
//! Signatures cover the canonical form of the envelope (see
//! [`crate::canonical`]): SHA-256 digest, RSA-PKCS#1-v1.5, base64 value.
//! The signature block also pins the signer's public-key fingerprint, so
//! verification fails even when a different-but-valid key would accept
//! the signature bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use btps_core::{ArtifactEnvelope, Identity, SignatureAlgorithm, SignatureEnvelope};

use crate::canonical::canonical_bytes;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{fingerprint, KeyPair};

/// Sign an envelope in place.
///
/// Sets `signature`, `signedBy`, and `selector`. Encryption, when
/// requested, is applied before signing: the signature then covers the
/// ciphertext document, while the `encryption` block itself stays
/// outside the canonical form.
pub fn sign_envelope(
    envelope: &mut ArtifactEnvelope,
    signed_by: &Identity,
    selector: &str,
    keys: &KeyPair,
) -> CryptoResult<()> {
    envelope.signed_by = Some(signed_by.clone());
    envelope.selector = Some(selector.to_string());

    let canonical = canonical_bytes(envelope)?;
    let digest = Sha256::digest(&canonical);

    let raw = keys
        .private_key()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    envelope.signature = Some(SignatureEnvelope {
        algorithm: SignatureAlgorithm::Sha256,
        value: BASE64.encode(raw),
        fingerprint: keys.fingerprint()?,
    });
    Ok(())
}

/// Verify an envelope's signature against the sender's public key.
///
/// Recomputes the canonical form (which excludes the signature itself),
/// checks the RSA signature, and requires the pinned fingerprint to match
/// the supplied key. Both failures are terminal.
pub fn verify_envelope(envelope: &ArtifactEnvelope, key: &RsaPublicKey) -> CryptoResult<()> {
    let sig = envelope
        .signature
        .as_ref()
        .ok_or(CryptoError::SignatureVerificationFailed)?;

    let actual = fingerprint(key)?;
    if actual != sig.fingerprint {
        return Err(CryptoError::FingerprintMismatch {
            pinned: sig.fingerprint.clone(),
            actual,
        });
    }

    let raw = BASE64
        .decode(&sig.value)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;

    let canonical = canonical_bytes(envelope)?;
    let digest = Sha256::digest(&canonical);

    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &raw)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}
