//! Canonical serialization
//!
//! The protocol signs a deterministic byte representation of the envelope,
//! not the wire line itself. The canonicalization rules, fixed here:
//!
//! 1. Serialize the envelope to a JSON value and remove the top-level
//!    `signature` and `encryption` members.
//! 2. Rebuild every object with its keys in lexicographic (byte) order,
//!    recursively, arrays keeping their element order.
//! 3. Encode with compact separators (no insignificant whitespace) and
//!    serde_json's number formatting, as UTF-8.
//!
//! Any peer applying the same rules to the same envelope obtains the same
//! bytes, which is what makes signatures portable across implementations.

use serde_json::{Map, Value};

use btps_core::ArtifactEnvelope;

use crate::error::{CryptoError, CryptoResult};

/// Produce the canonical signing input for an envelope.
///
/// `signature` and `encryption` are excluded so the same function serves
/// signing (before either is attached) and verification (after both are
/// stripped).
pub fn canonical_bytes(envelope: &ArtifactEnvelope) -> CryptoResult<Vec<u8>> {
    let mut value = serde_json::to_value(envelope)
        .map_err(|e| CryptoError::CanonicalizationFailed(e.to_string()))?;

    if let Value::Object(map) = &mut value {
        map.remove("signature");
        map.remove("encryption");
    }

    let ordered = order_keys(value);
    serde_json::to_vec(&ordered).map_err(|e| CryptoError::CanonicalizationFailed(e.to_string()))
}

/// Recursively rebuild a JSON value with lexicographically ordered keys.
fn order_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut ordered = Map::new();
            for (k, v) in entries {
                ordered.insert(k, order_keys(v));
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(order_keys).collect()),
        other => other,
    }
}
