//! Artifact envelopes
//!
//! The envelope is the outermost record carried on the wire: one JSON
//! object per newline-terminated line. Every envelope is individually
//! signed over its canonical form and may additionally carry an encrypted
//! document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::identity::Identity;
use crate::PROTOCOL_VERSION;

/// The closed set of artifact discriminators.
///
/// The first seven are sender-originated artifacts; `Response` and
/// `Error` are server response frames correlated to a request by `reqId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    #[serde(rename = "TRUST_REQ")]
    TrustRequest,
    #[serde(rename = "TRUST_RES")]
    TrustResponse,
    #[serde(rename = "BTP_INVOICE")]
    Invoice,
    #[serde(rename = "BTP_AUTH_REQ")]
    AuthRequest,
    #[serde(rename = "BTP_AUTH_RES")]
    AuthResponse,
    #[serde(rename = "BTP_QUERY")]
    Query,
    #[serde(rename = "BTP_DELIVERY_FAILURE")]
    DeliveryFailure,
    #[serde(rename = "btps_response")]
    Response,
    #[serde(rename = "btps_error")]
    Error,
}

impl ArtifactType {
    /// The literal carried in the envelope's `type` field.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::TrustRequest => "TRUST_REQ",
            Self::TrustResponse => "TRUST_RES",
            Self::Invoice => "BTP_INVOICE",
            Self::AuthRequest => "BTP_AUTH_REQ",
            Self::AuthResponse => "BTP_AUTH_RES",
            Self::Query => "BTP_QUERY",
            Self::DeliveryFailure => "BTP_DELIVERY_FAILURE",
            Self::Response => "btps_response",
            Self::Error => "btps_error",
        }
    }

    /// Whether this type is a server response frame rather than a
    /// sender-originated artifact.
    pub fn is_response_frame(&self) -> bool {
        matches!(self, Self::Response | Self::Error)
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Signature algorithm discriminator. The protocol currently defines one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
}

/// The signature block attached to a signed envelope.
///
/// `value` is the base64 RSA-PKCS#1-v1.5 signature over the canonical
/// form of the envelope (minus `signature` and `encryption`);
/// `fingerprint` is base64(SHA-256(SPKI DER)) of the signer's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub algorithm: SignatureAlgorithm,
    pub value: String,
    pub fingerprint: String,
}

/// Symmetric cipher discriminator. The protocol currently defines one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

/// How an envelope's document is (or is not) encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMode {
    /// Signed but cleartext document.
    #[default]
    #[serde(rename = "none")]
    None,
    /// Hybrid RSA+AES encryption with the recipient's published key.
    #[serde(rename = "standardEncrypt")]
    Standard,
    /// Like `Standard`, with a caller-supplied second factor mixed into
    /// the key via PBKDF2.
    #[serde(rename = "2faEncrypt")]
    TwoFactor,
}

/// The encryption block attached to an encrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionEnvelope {
    pub algorithm: EncryptionAlgorithm,
    /// base64 of the RSA-OAEP-wrapped AES key.
    pub encrypted_key: String,
    /// base64 of the 16-byte CBC IV.
    pub iv: String,
    #[serde(rename = "type")]
    pub mode: EncryptionMode,
}

/// The outermost wire record.
///
/// Immutable after signing: any mutation invalidates `signature.value`.
/// `document` holds the typed payload as plain JSON, or an opaque base64
/// ciphertext string when `encryption` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEnvelope {
    pub version: String,
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub from: Identity,
    pub to: Identity,
    pub issued_at: DateTime<Utc>,
    pub document: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ArtifactEnvelope {
    /// Build an unsigned envelope with a fresh id and the current
    /// timestamp. The caller signs (and optionally encrypts) before
    /// putting it on the wire.
    pub fn new(artifact_type: ArtifactType, from: Identity, to: Identity, document: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            artifact_type,
            from,
            to,
            issued_at: Utc::now(),
            document,
            signature: None,
            encryption: None,
            signed_by: None,
            selector: None,
        }
    }

    /// Whether the document field is ciphertext.
    pub fn is_encrypted(&self) -> bool {
        self.encryption
            .as_ref()
            .map(|e| e.mode != EncryptionMode::None)
            .unwrap_or(false)
    }
}

/// The `status` object of a server response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub ok: bool,
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A `btps_response` / `btps_error` frame from the receiving server.
///
/// Response frames are not full envelopes: they carry no `from`/`to` and
/// no signature, only a status correlated to the request by `reqId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    pub version: String,
    pub id: String,
    #[serde(rename = "type")]
    pub frame_type: ArtifactType,
    pub issued_at: DateTime<Utc>,
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
}

/// Anything that can arrive on an inbound line.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// A server response frame (`btps_response` / `btps_error`).
    Response(ServerFrame),
    /// A full, sender-originated artifact envelope.
    Artifact(Box<ArtifactEnvelope>),
}

impl InboundFrame {
    /// Decode a wire line, dispatching on the `type` discriminator.
    ///
    /// An unparseable line or an unknown `type` is a terminal parse
    /// error, surfaced as `serde_json::Error`.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct TypeProbe {
            #[serde(rename = "type")]
            frame_type: ArtifactType,
        }

        let probe: TypeProbe = serde_json::from_str(line)?;
        if probe.frame_type.is_response_frame() {
            Ok(Self::Response(serde_json::from_str(line)?))
        } else {
            Ok(Self::Artifact(Box::new(serde_json::from_str(line)?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_envelope() -> ArtifactEnvelope {
        ArtifactEnvelope::new(
            ArtifactType::TrustRequest,
            Identity::parse("alice$a.example").unwrap(),
            Identity::parse("bob$b.example").unwrap(),
            json!({"name": "Alice", "email": "alice@a.example", "reason": "invoicing"}),
        )
    }

    #[test]
    fn test_artifact_type_wire_names() {
        assert_eq!(ArtifactType::TrustRequest.wire_name(), "TRUST_REQ");
        assert_eq!(ArtifactType::Invoice.wire_name(), "BTP_INVOICE");
        assert_eq!(ArtifactType::Response.wire_name(), "btps_response");
        assert!(ArtifactType::Response.is_response_frame());
        assert!(ArtifactType::Error.is_response_frame());
        assert!(!ArtifactType::Query.is_response_frame());
    }

    #[test]
    fn test_artifact_type_serde_literals() {
        let json = serde_json::to_string(&ArtifactType::DeliveryFailure).unwrap();
        assert_eq!(json, "\"BTP_DELIVERY_FAILURE\"");
        let back: ArtifactType = serde_json::from_str("\"btps_error\"").unwrap();
        assert_eq!(back, ArtifactType::Error);
    }

    #[test]
    fn test_new_envelope_defaults() {
        let env = sample_envelope();
        assert_eq!(env.version, PROTOCOL_VERSION);
        assert!(!env.id.is_empty());
        assert!(env.signature.is_none());
        assert!(env.encryption.is_none());
        assert!(!env.is_encrypted());
    }

    #[test]
    fn test_envelope_serde_field_names() {
        let mut env = sample_envelope();
        env.signed_by = Some(env.from.clone());
        env.selector = Some("btps1".to_string());
        let value = serde_json::to_value(&env).unwrap();

        assert!(value.get("issuedAt").is_some());
        assert!(value.get("signedBy").is_some());
        assert_eq!(value["type"], "TRUST_REQ");
        // Absent options must not serialize at all.
        assert!(value.get("signature").is_none());
        assert!(value.get("encryption").is_none());
    }

    #[test]
    fn test_encryption_mode_literals() {
        assert_eq!(
            serde_json::to_string(&EncryptionMode::Standard).unwrap(),
            "\"standardEncrypt\""
        );
        assert_eq!(
            serde_json::to_string(&EncryptionMode::TwoFactor).unwrap(),
            "\"2faEncrypt\""
        );
        assert_eq!(serde_json::to_string(&EncryptionMode::None).unwrap(), "\"none\"");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let env = sample_envelope();
        let line = serde_json::to_string(&env).unwrap();
        let back: ArtifactEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn test_inbound_frame_dispatch() {
        let env = sample_envelope();
        let line = serde_json::to_string(&env).unwrap();
        match InboundFrame::decode(&line).unwrap() {
            InboundFrame::Artifact(a) => assert_eq!(a.id, env.id),
            other => panic!("Expected artifact frame, got {:?}", other),
        }

        let frame = ServerFrame {
            version: PROTOCOL_VERSION.to_string(),
            id: "srv-1".to_string(),
            frame_type: ArtifactType::Response,
            issued_at: Utc::now(),
            status: ServerStatus {
                ok: true,
                code: 200,
                message: None,
            },
            req_id: Some(env.id.clone()),
            document: None,
        };
        let line = serde_json::to_string(&frame).unwrap();
        match InboundFrame::decode(&line).unwrap() {
            InboundFrame::Response(r) => {
                assert_eq!(r.req_id.as_deref(), Some(env.id.as_str()));
                assert!(r.status.ok);
            }
            other => panic!("Expected response frame, got {:?}", other),
        }
    }

    #[test]
    fn test_inbound_frame_rejects_unknown_type() {
        let line = r#"{"type":"NOT_A_TYPE","id":"x"}"#;
        assert!(InboundFrame::decode(line).is_err());
    }

    #[test]
    fn test_inbound_frame_rejects_garbage() {
        assert!(InboundFrame::decode("{not json").is_err());
    }
}
