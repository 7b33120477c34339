// presence-protocol/src/test_utils.rs
// Shared helpers for unit and integration tests.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::Duration;

use crate::audit::current_epoch_millis;
use crate::config::ProtocolConfig;
use crate::crypto::{canonical_string, encode_public_key, encode_signature, sign};
use crate::data_structures::{
    IdentityRecord, PresenceProofPayload, SignedPresenceProof, VitalizationStatus,
};
use crate::handshake::driver::SensorSuite;
use crate::handshake::types::{TactileCapture, VisualCapture, VitalCapture};
use crate::proof::types::NonceLedgerEntry;
use crate::storage::{NonceLedger, NonceLedgerError, StorageError};

pub const TEST_VAULT_KEY: [u8; 32] = [42u8; 32];

// Helper function to create deterministic keys for testing
pub fn create_test_signing_key(id: usize) -> SigningKey {
    let seed = [(id % 256) as u8; 32];
    SigningKey::from_bytes(&seed)
}

/// Creates a vitalized identity enrolled for (device_id, key_id),
/// together with the device signing key it was enrolled with.
pub fn create_test_identity(
    id: usize,
    device_id: &str,
    key_id: &str,
) -> (IdentityRecord, SigningKey) {
    let signing_key = create_test_signing_key(id);
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_bytes());
    hasher.update(key_id.as_bytes());
    let record = IdentityRecord {
        id: format!("citizen-{id}"),
        public_identifier: format!("PUB-{id:04}"),
        public_key_b64: encode_public_key(&signing_key.verifying_key()),
        key_id: key_id.to_string(),
        device_id: device_id.to_string(),
        vitalization: VitalizationStatus::Vitalized,
        hardware_anchor_hash: hex::encode(hasher.finalize()),
    };
    (record, signing_key)
}

/// A payload stamped with the current time, carrying the boolean
/// liveness flag. Tests mutate fields before signing as needed.
pub fn fresh_payload(nonce: &str, device_id: &str, key_id: &str) -> PresenceProofPayload {
    PresenceProofPayload {
        nonce: nonce.to_string(),
        timestamp_ms: current_epoch_millis(),
        key_id: key_id.to_string(),
        device_id: device_id.to_string(),
        attestation_cert_chain: None,
        liveness_ok: Some(true),
        liveness_score: None,
    }
}

/// Signs a payload's canonical serialization with the given key.
pub fn sign_proof(payload: PresenceProofPayload, signing_key: &SigningKey) -> SignedPresenceProof {
    let canonical = canonical_string(&payload);
    let signature = sign(canonical.as_bytes(), signing_key);
    SignedPresenceProof { payload, signature_b64: encode_signature(&signature) }
}

// Scripted sensor stack: fixed captures, optional per-phase delays,
// and a call log for asserting which sensors were touched.
pub struct ScriptedSensors {
    pub visual: VisualCapture,
    pub tactile: TactileCapture,
    pub vital: VitalCapture,
    pub visual_delay: Duration,
    pub tactile_delay: Duration,
    pub vital_delay: Duration,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedSensors {
    /// Sensors that pass every phase instantly under the given config.
    pub fn passing(config: &ProtocolConfig) -> Self {
        ScriptedSensors {
            visual: VisualCapture {
                mesh_point_count: config.expected_mesh_density,
                blood_flow_detected: true,
                liveness_score: 0.999,
            },
            tactile: TactileCapture { pattern_matched: true, confidence: 0.98 },
            vital: VitalCapture {
                pulse_detected: true,
                bpm: 72.0,
                voice_confirmed: true,
                spectral_voice_hash: Some("5f3c9a".to_string()),
            },
            visual_delay: Duration::ZERO,
            tactile_delay: Duration::ZERO,
            vital_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_log(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SensorSuite for ScriptedSensors {
    async fn capture_visual(&self) -> VisualCapture {
        self.calls.lock().unwrap().push("visual");
        if !self.visual_delay.is_zero() {
            tokio::time::sleep(self.visual_delay).await;
        }
        self.visual.clone()
    }

    async fn capture_tactile(&self) -> TactileCapture {
        self.calls.lock().unwrap().push("tactile");
        if !self.tactile_delay.is_zero() {
            tokio::time::sleep(self.tactile_delay).await;
        }
        self.tactile.clone()
    }

    async fn capture_vital(&self) -> VitalCapture {
        self.calls.lock().unwrap().push("vital");
        if !self.vital_delay.is_zero() {
            tokio::time::sleep(self.vital_delay).await;
        }
        self.vital.clone()
    }
}

// Ledger that fails every append, for exercising backend-error paths
pub struct FailingNonceLedger;

#[async_trait]
impl NonceLedger for FailingNonceLedger {
    async fn append(&self, _entry: NonceLedgerEntry) -> Result<(), NonceLedgerError> {
        Err(NonceLedgerError::Backend(StorageError::Backend("ledger offline".to_string())))
    }
}
