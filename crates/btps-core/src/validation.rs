//! Envelope validation
//!
//! Cross-field invariant checks for [`ArtifactEnvelope`]. Document-level
//! checks live with the document types in [`crate::document`]; this module
//! owns the envelope shape itself.

use serde_json::Value;

use crate::document::TypedDocument;
use crate::envelope::{ArtifactEnvelope, EncryptionMode};
use crate::error::ValidationError;

/// Validate an envelope's cross-field invariants and additionally
/// decode a cleartext document against the schema for its `type`.
///
/// Returns the decoded document for cleartext envelopes, `None` for
/// encrypted ones (the caller validates after decrypting).
pub fn validate_envelope(env: &ArtifactEnvelope) -> Result<Option<TypedDocument>, ValidationError> {
    let encrypted = validate_envelope_structure(env)?;
    if encrypted {
        Ok(None)
    } else {
        TypedDocument::decode(env.artifact_type, &env.document).map(Some)
    }
}

/// Validate only the envelope's structural invariants, leaving the
/// document untouched. Inbound processing uses this before signature
/// verification; the document schema is checked afterwards (or after
/// decryption).
///
/// Checks, in order:
/// - `version` matches `MAJOR.MINOR.PATCH`
/// - `id` is non-empty
/// - `signature` present implies `signedBy` and `selector` present
/// - `encryption` present implies the document is an opaque string
///
/// Returns whether the envelope's document is encrypted.
pub fn validate_envelope_structure(env: &ArtifactEnvelope) -> Result<bool, ValidationError> {
    if !is_semver_triple(&env.version) {
        return Err(ValidationError::new(
            "version",
            format!("`{}` is not a MAJOR.MINOR.PATCH triple", env.version),
        ));
    }
    if env.id.trim().is_empty() {
        return Err(ValidationError::new("id", "must not be empty"));
    }

    if env.signature.is_some() {
        if env.signed_by.is_none() {
            return Err(ValidationError::new(
                "signedBy",
                "required when a signature is present",
            ));
        }
        if env.selector.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(ValidationError::new(
                "selector",
                "required when a signature is present",
            ));
        }
    }

    let encrypted = env
        .encryption
        .as_ref()
        .map(|e| e.mode != EncryptionMode::None)
        .unwrap_or(false);

    if encrypted {
        match &env.document {
            Value::String(s) if !s.is_empty() => Ok(true),
            _ => Err(ValidationError::new(
                "document",
                "must be a non-empty ciphertext string when encryption is present",
            )),
        }
    } else {
        Ok(false)
    }
}

fn is_semver_triple(s: &str) -> bool {
    let mut parts = 0;
    for part in s.split('.') {
        parts += 1;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    parts == 3
}
