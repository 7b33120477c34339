use serde::{Deserialize, Serialize};

// Stable identifier for an enrolled citizen record
pub type CitizenId = String;

// Lifecycle state of an enrolled identity. Only vitalized identities
// may authenticate; every lookup in the verifier filters on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VitalizationStatus {
    Pending,
    Vitalized,
    Suspended,
    Revoked,
}

// An enrolled identity as stored by the identity registry.
// public_key_b64 is the base64 Ed25519 verifying key registered at
// enrollment; key_id/device_id bind it to one key slot on one device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: CitizenId,
    pub public_identifier: String,
    #[serde(rename = "publicKey")]
    pub public_key_b64: String,
    pub key_id: String,
    pub device_id: String,
    #[serde(rename = "vitalizationStatus")]
    pub vitalization: VitalizationStatus,
    pub hardware_anchor_hash: String,
}

impl IdentityRecord {
    pub fn is_vitalized(&self) -> bool {
        self.vitalization == VitalizationStatus::Vitalized
    }
}

// Device-signed payload asserting "this person is present at this device
// right now". `timestamp` is epoch milliseconds from the device clock.
// Liveness evidence is optional on the wire; resolution order is score,
// then flag, then the configured default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceProofPayload {
    pub nonce: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub key_id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_cert_chain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_score: Option<f64>,
}

// A presence proof as submitted by a device: the payload plus the
// base64 Ed25519 signature over its canonical serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPresenceProof {
    pub payload: PresenceProofPayload,
    #[serde(rename = "signature")]
    pub signature_b64: String,
}
