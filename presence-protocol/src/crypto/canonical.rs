// presence-protocol/src/crypto/canonical.rs
//
// Canonical serialization of a presence proof payload. The device signs
// these exact UTF-8 bytes and the verifier recomputes them, so the field
// order here is part of the wire contract and must never change.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::data_structures::PresenceProofPayload;

// Signed fields only, in fixed order. The attestation chain and the
// numeric liveness score ride alongside the payload but are not signed;
// the boolean liveness flag is included iff the device set it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPayload<'a> {
    nonce: &'a str,
    timestamp: i64,
    key_id: &'a str,
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    liveness_ok: Option<bool>,
}

/// Deterministic serialization of the signed payload fields.
pub fn canonical_string(payload: &PresenceProofPayload) -> String {
    let view = CanonicalPayload {
        nonce: &payload.nonce,
        timestamp: payload.timestamp_ms,
        key_id: &payload.key_id,
        device_id: &payload.device_id,
        liveness_ok: payload.liveness_ok,
    };
    serde_json::to_string(&view).expect("canonical payload serializes")
}

/// Hex SHA-256 of the canonical string. Stored in the nonce ledger so an
/// audit can tie a consumed nonce back to the exact signed bytes.
pub fn payload_hash_hex(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
