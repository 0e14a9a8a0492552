//! Typed artifact documents
//!
//! Each artifact kind carries a document with a fixed schema. Decoding is
//! a closed-variant dispatch keyed by the envelope's `type` discriminator:
//! [`TypedDocument::decode`] either produces the typed document for that
//! kind or a [`ValidationError`] naming the offending field.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::ArtifactType;
use crate::error::ValidationError;
use crate::identity::Identity;

/// How the sender intends documents under this trust to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyType {
    Unencrypted,
    Encrypted,
    Mixed,
}

/// Document of a `TRUST_REQ` artifact: who is asking, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRequestDocument {
    pub name: String,
    pub email: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_type: Option<PrivacyType>,
}

/// The receiver's verdict on a trust request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustDecision {
    Accepted,
    Rejected,
    Revoked,
    Blocked,
}

/// Document of a `TRUST_RES` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustResponseDocument {
    pub decision: TrustDecision,
    pub decided_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Earliest date a rejected sender may ask again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A monetary amount with ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryAmount {
    pub value: f64,
    pub currency: String,
}

/// Tabular invoice line items: a header row plus data rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItems {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
    Partial,
    Refunded,
    Disputed,
}

/// Document of a `BTP_INVOICE` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    pub title: String,
    pub id: String,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub total_amount: MonetaryAmount,
    pub line_items: LineItems,
    pub status: InvoiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Document of a `BTP_AUTH_REQ` artifact: a device asking to act for an
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequestDocument {
    pub identity: Identity,
    pub auth_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_info: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Document of a `BTP_AUTH_RES` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseDocument {
    pub identity: Identity,
    /// PEM public key the granted device will sign with.
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Document of a `BTP_QUERY` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDocument {
    pub query: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Document of a `BTP_DELIVERY_FAILURE` artifact, referencing the failed
/// artifact by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailureDocument {
    /// Id of the artifact that could not be delivered.
    pub id: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
    pub recipient: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
    /// Id of the transport envelope that reported the failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_artifact_id: Option<String>,
}

/// A decoded document, one variant per sender-originated artifact kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedDocument {
    TrustRequest(TrustRequestDocument),
    TrustResponse(TrustResponseDocument),
    Invoice(InvoiceDocument),
    AuthRequest(AuthRequestDocument),
    AuthResponse(AuthResponseDocument),
    Query(QueryDocument),
    DeliveryFailure(DeliveryFailureDocument),
}

impl TypedDocument {
    /// Decode and validate a document for the given artifact kind.
    ///
    /// Response frames carry no typed document and are rejected here.
    pub fn decode(artifact_type: ArtifactType, value: &Value) -> Result<Self, ValidationError> {
        let doc = match artifact_type {
            ArtifactType::TrustRequest => Self::TrustRequest(decode_as(value)?),
            ArtifactType::TrustResponse => Self::TrustResponse(decode_as(value)?),
            ArtifactType::Invoice => Self::Invoice(decode_as(value)?),
            ArtifactType::AuthRequest => Self::AuthRequest(decode_as(value)?),
            ArtifactType::AuthResponse => Self::AuthResponse(decode_as(value)?),
            ArtifactType::Query => Self::Query(decode_as(value)?),
            ArtifactType::DeliveryFailure => Self::DeliveryFailure(decode_as(value)?),
            ArtifactType::Response | ArtifactType::Error => {
                return Err(ValidationError::new(
                    "type",
                    format!("{} frames carry no artifact document", artifact_type),
                ));
            }
        };
        doc.validate()?;
        Ok(doc)
    }

    /// The artifact kind this document belongs to.
    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::TrustRequest(_) => ArtifactType::TrustRequest,
            Self::TrustResponse(_) => ArtifactType::TrustResponse,
            Self::Invoice(_) => ArtifactType::Invoice,
            Self::AuthRequest(_) => ArtifactType::AuthRequest,
            Self::AuthResponse(_) => ArtifactType::AuthResponse,
            Self::Query(_) => ArtifactType::Query,
            Self::DeliveryFailure(_) => ArtifactType::DeliveryFailure,
        }
    }

    /// Serialize back to the envelope's `document` representation.
    pub fn to_value(&self) -> Value {
        // These structs contain only JSON-representable types; encoding
        // them cannot fail.
        match self {
            Self::TrustRequest(d) => serde_json::to_value(d),
            Self::TrustResponse(d) => serde_json::to_value(d),
            Self::Invoice(d) => serde_json::to_value(d),
            Self::AuthRequest(d) => serde_json::to_value(d),
            Self::AuthResponse(d) => serde_json::to_value(d),
            Self::Query(d) => serde_json::to_value(d),
            Self::DeliveryFailure(d) => serde_json::to_value(d),
        }
        .unwrap_or(Value::Null)
    }

    /// Semantic checks beyond shape and type.
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::TrustRequest(d) => {
                require_non_empty("name", &d.name)?;
                require_non_empty("email", &d.email)?;
                if !d.email.contains('@') {
                    return Err(ValidationError::new("email", "not an email address"));
                }
                require_non_empty("reason", &d.reason)
            }
            Self::TrustResponse(_) => Ok(()),
            Self::Invoice(d) => {
                require_non_empty("title", &d.title)?;
                require_non_empty("id", &d.id)?;
                if !d.total_amount.value.is_finite() || d.total_amount.value < 0.0 {
                    return Err(ValidationError::new(
                        "totalAmount.value",
                        "must be a non-negative number",
                    ));
                }
                if d.total_amount.currency.len() != 3 {
                    return Err(ValidationError::new(
                        "totalAmount.currency",
                        "must be a three-letter ISO 4217 code",
                    ));
                }
                if d.line_items.columns.is_empty() {
                    return Err(ValidationError::new("lineItems.columns", "must not be empty"));
                }
                let width = d.line_items.columns.len();
                for (i, row) in d.line_items.rows.iter().enumerate() {
                    if row.len() != width {
                        return Err(ValidationError::new(
                            format!("lineItems.rows[{}]", i),
                            format!("expected {} cells, got {}", width, row.len()),
                        ));
                    }
                }
                Ok(())
            }
            Self::AuthRequest(d) => require_non_empty("authToken", &d.auth_token),
            Self::AuthResponse(d) => require_non_empty("publicKey", &d.public_key),
            Self::Query(d) => {
                if d.query.is_empty() {
                    return Err(ValidationError::new("query", "must not be empty"));
                }
                if let Some(0) = d.limit {
                    return Err(ValidationError::new("limit", "must be positive"));
                }
                Ok(())
            }
            Self::DeliveryFailure(d) => {
                require_non_empty("id", &d.id)?;
                require_non_empty("reason", &d.reason)
            }
        }
        .map_err(|e| e.nested("document"))
    }
}

fn decode_as<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, ValidationError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::new("document", e.to_string()))
}

fn require_non_empty(path: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(path, "must not be empty"))
    } else {
        Ok(())
    }
}
