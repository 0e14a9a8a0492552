//! Hybrid document encryption
//!
//! `standardEncrypt` seals the JSON-serialized document with a fresh
//! random AES-256 key (CBC mode, PKCS#7 padding) and wraps that key for
//! the recipient with RSA-OAEP (SHA-256). `2faEncrypt` additionally mixes
//! a caller-supplied passphrase into the key: PBKDF2-HMAC-SHA256 over the
//! passphrase (salted with the message IV, 100 000 iterations) is XOR-ed
//! with the random key, and the combined value is what gets wrapped. A
//! recipient without the second factor unwraps a value that cannot
//! decrypt the document.
//!
//! Every failure in this module is terminal; a padding or unwrap error is
//! never retried.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use sha2::Sha256;

use btps_core::{EncryptionAlgorithm, EncryptionEnvelope, EncryptionMode};

use crate::error::{CryptoError, CryptoResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key size in bytes.
pub const AES_KEY_SIZE: usize = 32;
/// CBC IV size in bytes.
pub const IV_SIZE: usize = 16;
/// PBKDF2 iteration count for the 2FA key derivation.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Encrypt a document for a recipient.
///
/// Returns the base64 ciphertext that replaces the envelope's `document`
/// field, together with the `encryption` block describing how to undo it.
/// `second_factor` is required iff `mode` is [`EncryptionMode::TwoFactor`].
pub fn encrypt_document(
    document: &Value,
    recipient_key: &RsaPublicKey,
    mode: EncryptionMode,
    second_factor: Option<&str>,
) -> CryptoResult<(String, EncryptionEnvelope)> {
    if mode == EncryptionMode::None {
        return Err(CryptoError::EncryptionFailed(
            "encryption mode is none".to_string(),
        ));
    }

    let plaintext = serde_json::to_vec(document)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut key = [0u8; AES_KEY_SIZE];
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut key);
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    let wrapped_input = match mode {
        EncryptionMode::Standard => key,
        EncryptionMode::TwoFactor => {
            let secret = second_factor.ok_or(CryptoError::MissingSecondFactor)?;
            xor_keys(&key, &derive_factor_key(secret, &iv))
        }
        EncryptionMode::None => unreachable!(),
    };

    let encrypted_key = recipient_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &wrapped_input)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let envelope = EncryptionEnvelope {
        algorithm: EncryptionAlgorithm::Aes256Cbc,
        encrypted_key: BASE64.encode(encrypted_key),
        iv: BASE64.encode(iv),
        mode,
    };

    Ok((BASE64.encode(ciphertext), envelope))
}

/// Decrypt a document with the recipient's private key.
///
/// Reverses [`encrypt_document`]; any base64, unwrap, padding, or JSON
/// failure is a terminal [`CryptoError::DecryptionFailed`].
pub fn decrypt_document(
    ciphertext_b64: &str,
    encryption: &EncryptionEnvelope,
    private_key: &RsaPrivateKey,
    second_factor: Option<&str>,
) -> CryptoResult<Value> {
    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::DecryptionFailed(format!("ciphertext: {}", e)))?;
    let wrapped = BASE64
        .decode(&encryption.encrypted_key)
        .map_err(|e| CryptoError::DecryptionFailed(format!("encryptedKey: {}", e)))?;
    let iv: [u8; IV_SIZE] = BASE64
        .decode(&encryption.iv)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| CryptoError::DecryptionFailed("iv must be 16 bytes".to_string()))?;

    let unwrapped = private_key
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .map_err(|e| CryptoError::DecryptionFailed(format!("key unwrap: {}", e)))?;
    let unwrapped: [u8; AES_KEY_SIZE] = unwrapped
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed("unwrapped key must be 32 bytes".to_string()))?;

    let key = match encryption.mode {
        EncryptionMode::Standard => unwrapped,
        EncryptionMode::TwoFactor => {
            let secret = second_factor.ok_or(CryptoError::MissingSecondFactor)?;
            xor_keys(&unwrapped, &derive_factor_key(secret, &iv))
        }
        EncryptionMode::None => {
            return Err(CryptoError::DecryptionFailed(
                "encryption mode is none".to_string(),
            ));
        }
    };

    let cipher = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("bad padding".to_string()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| CryptoError::DecryptionFailed(format!("document: {}", e)))
}

/// PBKDF2-HMAC-SHA256 over the passphrase, salted with the message IV.
fn derive_factor_key(secret: &str, iv: &[u8; IV_SIZE]) -> [u8; AES_KEY_SIZE] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, AES_KEY_SIZE>(secret.as_bytes(), iv, PBKDF2_ITERATIONS)
}

fn xor_keys(a: &[u8; AES_KEY_SIZE], b: &[u8; AES_KEY_SIZE]) -> [u8; AES_KEY_SIZE] {
    let mut out = [0u8; AES_KEY_SIZE];
    for i in 0..AES_KEY_SIZE {
        out[i] = a[i] ^ b[i];
    }
    out
}
