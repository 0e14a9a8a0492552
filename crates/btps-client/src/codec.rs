//! Artifact codec
//!
//! The outbound half, [`sign_encrypt`], turns a built artifact into a
//! ready-to-serialize envelope: validate, optionally encrypt for the
//! recipient's DNS-published key, sign. The inbound half,
//! [`verify_decrypt`], is the mirror: resolve the sender's key, verify,
//! decrypt when needed, validate the schema.
//!
//! Both are pure functions of their inputs and the DNS view at call
//! time; neither holds state.

use serde_json::Value;

use btps_core::{
    validate_envelope, validate_envelope_structure, ArtifactEnvelope, EncryptionMode, Identity,
    TypedDocument, ValidationError,
};
use btps_crypto::{
    decrypt_document, encrypt_document, public_key_from_pem, sign_envelope, verify_envelope,
    CryptoError, KeyPair, RsaPrivateKey,
};
use btps_resolver::HostResolver;

use crate::error::ClientResult;

/// How to protect the outgoing document.
#[derive(Debug, Clone, Default)]
pub struct CryptoOptions {
    pub mode: EncryptionMode,
    /// Required iff `mode` is [`EncryptionMode::TwoFactor`].
    pub second_factor: Option<String>,
}

impl CryptoOptions {
    pub fn standard() -> Self {
        Self {
            mode: EncryptionMode::Standard,
            second_factor: None,
        }
    }

    pub fn two_factor(secret: impl Into<String>) -> Self {
        Self {
            mode: EncryptionMode::TwoFactor,
            second_factor: Some(secret.into()),
        }
    }
}

/// Validate, optionally encrypt, and sign an outbound artifact.
///
/// Encryption resolves the recipient's currently active selector via
/// `_btps.<domain>` and the key behind it; the signature then covers the
/// ciphertext document.
pub async fn sign_encrypt(
    mut envelope: ArtifactEnvelope,
    keys: &KeyPair,
    selector: &str,
    resolver: &dyn HostResolver,
    crypto: &CryptoOptions,
) -> ClientResult<ArtifactEnvelope> {
    validate_envelope(&envelope)?;

    if crypto.mode != EncryptionMode::None {
        let host = resolver.resolve_host(envelope.to.domain()).await?;
        let key_record = resolver.resolve_key(&envelope.to, &host.selector).await?;
        let recipient_key = public_key_from_pem(&key_record.pem)?;

        let (ciphertext, encryption) = encrypt_document(
            &envelope.document,
            &recipient_key,
            crypto.mode,
            crypto.second_factor.as_deref(),
        )?;
        envelope.document = Value::String(ciphertext);
        envelope.encryption = Some(encryption);
    }

    let from = envelope.from.clone();
    sign_envelope(&mut envelope, &from, selector, keys)?;
    Ok(envelope)
}

/// Verify an inbound envelope and produce its typed document.
///
/// Resolves the sender's public key from `signedBy` and `selector`,
/// verifies the signature (including the fingerprint pin), decrypts
/// when an encryption block is present, and validates the document
/// schema for the envelope's `type`.
pub async fn verify_decrypt(
    envelope: &ArtifactEnvelope,
    resolver: &dyn HostResolver,
    expected_receiver: Option<&Identity>,
    private_key: Option<&RsaPrivateKey>,
    second_factor: Option<&str>,
) -> ClientResult<TypedDocument> {
    let encrypted = validate_envelope_structure(envelope)?;

    if let Some(expected) = expected_receiver {
        if envelope.to != *expected {
            return Err(ValidationError::new(
                "to",
                format!("artifact addressed to {}, not {}", envelope.to, expected),
            )
            .into());
        }
    }

    // validate_envelope guarantees signedBy/selector accompany a
    // signature; an entirely unsigned artifact is rejected here.
    let (signed_by, sig_selector) = match (&envelope.signed_by, envelope.selector.as_deref()) {
        (Some(signed_by), Some(selector)) if envelope.signature.is_some() => {
            (signed_by, selector)
        }
        _ => return Err(CryptoError::SignatureVerificationFailed.into()),
    };

    let key_record = resolver.resolve_key(signed_by, sig_selector).await?;
    let sender_key = public_key_from_pem(&key_record.pem)?;
    verify_envelope(envelope, &sender_key)?;

    // Schema validation runs only on verified content: after the
    // signature check for cleartext, after decryption otherwise.
    if !encrypted {
        return TypedDocument::decode(envelope.artifact_type, &envelope.document)
            .map_err(Into::into);
    }

    let encryption = envelope
        .encryption
        .as_ref()
        .ok_or(CryptoError::SignatureVerificationFailed)?;
    let key = private_key.ok_or_else(|| {
        CryptoError::DecryptionFailed(
            "no private key available for encrypted document".to_string(),
        )
    })?;
    let ciphertext = match &envelope.document {
        Value::String(s) => s.as_str(),
        // Unreachable past validation.
        _ => {
            return Err(ValidationError::new(
                "document",
                "encrypted document must be a string",
            )
            .into());
        }
    };
    let value = decrypt_document(ciphertext, encryption, key, second_factor)?;
    TypedDocument::decode(envelope.artifact_type, &value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ErrorKind};
    use btps_core::ArtifactType;
    use btps_resolver::StaticResolver;
    use serde_json::json;

    struct Fixture {
        alice: Identity,
        bob: Identity,
        alice_keys: KeyPair,
        bob_keys: KeyPair,
        resolver: StaticResolver,
    }

    fn fixture() -> Fixture {
        let alice = Identity::parse("alice$a.example").unwrap();
        let bob = Identity::parse("bob$b.example").unwrap();
        let alice_keys = KeyPair::generate(2048).unwrap();
        let bob_keys = KeyPair::generate(2048).unwrap();

        let resolver = StaticResolver::new()
            .with_host("a.example", "btps.a.example", "btps1")
            .with_host("b.example", "btps.b.example", "btps1")
            .with_key(&alice, "btps1", &alice_keys.public_key_pem().unwrap())
            .with_key(&bob, "btps1", &bob_keys.public_key_pem().unwrap());

        Fixture {
            alice,
            bob,
            alice_keys,
            bob_keys,
            resolver,
        }
    }

    fn trust_request(f: &Fixture) -> ArtifactEnvelope {
        ArtifactEnvelope::new(
            ArtifactType::TrustRequest,
            f.alice.clone(),
            f.bob.clone(),
            json!({"name": "Alice", "email": "alice@a.example", "reason": "invoicing"}),
        )
    }

    #[tokio::test]
    async fn test_cleartext_roundtrip() {
        let f = fixture();
        let sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::default(),
        )
        .await
        .unwrap();

        assert!(sent.signature.is_some());
        assert!(sent.encryption.is_none());

        let document = verify_decrypt(&sent, &f.resolver, Some(&f.bob), None, None)
            .await
            .unwrap();
        match document {
            TypedDocument::TrustRequest(d) => assert_eq!(d.name, "Alice"),
            other => panic!("Expected trust request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_standard_encrypt_roundtrip() {
        let f = fixture();
        let sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::standard(),
        )
        .await
        .unwrap();

        // On the wire the document is opaque.
        assert!(sent.document.is_string());
        assert!(sent.encryption.is_some());

        let document = verify_decrypt(
            &sent,
            &f.resolver,
            Some(&f.bob),
            Some(f.bob_keys.private_key()),
            None,
        )
        .await
        .unwrap();
        match document {
            TypedDocument::TrustRequest(d) => {
                assert_eq!(d.email, "alice@a.example");
                assert_eq!(d.reason, "invoicing");
            }
            other => panic!("Expected trust request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_factor_roundtrip() {
        let f = fixture();
        let sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::two_factor("shared secret"),
        )
        .await
        .unwrap();

        let document = verify_decrypt(
            &sent,
            &f.resolver,
            None,
            Some(f.bob_keys.private_key()),
            Some("shared secret"),
        )
        .await
        .unwrap();
        assert_eq!(document.artifact_type(), ArtifactType::TrustRequest);

        // The wrong passphrase must not decrypt.
        let err = verify_decrypt(
            &sent,
            &f.resolver,
            None,
            Some(f.bob_keys.private_key()),
            Some("wrong"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    }

    #[tokio::test]
    async fn test_tampered_envelope_rejected() {
        let f = fixture();
        let mut sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::default(),
        )
        .await
        .unwrap();
        sent.document["name"] = json!("Mallory");

        let err = verify_decrypt(&sent, &f.resolver, None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureVerificationFailed);
    }

    #[tokio::test]
    async fn test_wrong_receiver_rejected() {
        let f = fixture();
        let sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::default(),
        )
        .await
        .unwrap();

        let carol = Identity::parse("carol$c.example").unwrap();
        let err = verify_decrypt(&sent, &f.resolver, Some(&carol), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidationError);
    }

    #[tokio::test]
    async fn test_unsigned_artifact_rejected() {
        let f = fixture();
        let envelope = trust_request(&f);
        let err = verify_decrypt(&envelope, &f.resolver, None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureVerificationFailed);
    }

    #[tokio::test]
    async fn test_unknown_sender_key_is_transient_dns_error() {
        let f = fixture();
        let mut sent = sign_encrypt(
            trust_request(&f),
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::default(),
        )
        .await
        .unwrap();
        // A selector nobody published.
        sent.selector = Some("btps9".to_string());

        let err = verify_decrypt(&sent, &f.resolver, None, None, None)
            .await
            .unwrap_err();
        // The signature no longer verifies anyway (selector is signed),
        // but resolution fails first.
        assert_eq!(err.kind(), ErrorKind::DnsResolutionFailed);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_encryption_requires_recipient_key_in_dns() {
        let f = fixture();
        let carol = Identity::parse("carol$missing.example").unwrap();
        let envelope = ArtifactEnvelope::new(
            ArtifactType::TrustRequest,
            f.alice.clone(),
            carol,
            json!({"name": "Alice", "email": "alice@a.example", "reason": "invoicing"}),
        );

        let err = sign_encrypt(
            envelope,
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::standard(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Resolver(_)));
    }

    #[tokio::test]
    async fn test_invalid_document_rejected_before_signing() {
        let f = fixture();
        let envelope = ArtifactEnvelope::new(
            ArtifactType::TrustRequest,
            f.alice.clone(),
            f.bob.clone(),
            json!({"name": "", "email": "alice@a.example", "reason": "x"}),
        );

        let err = sign_encrypt(
            envelope,
            &f.alice_keys,
            "btps1",
            &f.resolver,
            &CryptoOptions::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidationError);
    }
}
