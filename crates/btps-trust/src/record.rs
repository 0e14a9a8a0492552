//! Trust records
//!
//! A trust record is the durable evidence that `receiverId` has granted
//! (or is deciding whether to grant) `senderId` the right to send it
//! artifacts. Record ids are deterministic over the `(sender, receiver)`
//! pair so every process derives the same id without coordination.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lifecycle status of a trust relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustStatus {
    Requested,
    Accepted,
    Revoked,
    Expired,
}

/// A persistent trust record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: TrustStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Receiver-defined policy, e.g. allowed artifact kinds or rate
    /// limits. Opaque to the store.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub policy: HashMap<String, Value>,
}

/// A record as submitted to [`create`](crate::TrustStore::create),
/// before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecordDraft {
    pub sender_id: String,
    pub receiver_id: String,
    pub status: TrustStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub policy: HashMap<String, Value>,
}

impl TrustRecordDraft {
    /// A fresh `requested` draft for a sender/receiver pair.
    pub fn requested(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            status: TrustStatus::Requested,
            decided_at: None,
            expires_at: None,
            policy: HashMap::new(),
        }
    }

    /// Materialize the draft with an id and creation timestamp.
    pub fn into_record(self, id: String) -> TrustRecord {
        TrustRecord {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            status: self.status,
            created_at: Utc::now(),
            decided_at: self.decided_at,
            expires_at: self.expires_at,
            policy: self.policy,
        }
    }
}

/// A partial update merged over an existing record.
///
/// `Some` fields overwrite; `None` fields are left untouched. Policy
/// entries are merged key-by-key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustPatch {
    pub status: Option<TrustStatus>,
    pub decided_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub policy: HashMap<String, Value>,
}

impl TrustPatch {
    /// A patch that records a decision.
    pub fn decision(status: TrustStatus) -> Self {
        Self {
            status: Some(status),
            decided_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Apply this patch to a record.
    pub fn apply(&self, record: &mut TrustRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(decided_at) = self.decided_at {
            record.decided_at = Some(decided_at);
        }
        if let Some(expires_at) = self.expires_at {
            record.expires_at = Some(expires_at);
        }
        for (k, v) in &self.policy {
            record.policy.insert(k.clone(), v.clone());
        }
    }
}

/// Deterministic record id for a `(sender, receiver)` pair:
/// lowercase hex SHA-256 of `sender → receiver` (U+2192 separator).
///
/// Stable across processes, so any party holding the pair can address
/// the record without a lookup.
pub fn deterministic_trust_id(sender_id: &str, receiver_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender_id.as_bytes());
    hasher.update("→".as_bytes());
    hasher.update(receiver_id.as_bytes());
    hex::encode(hasher.finalize())
}
