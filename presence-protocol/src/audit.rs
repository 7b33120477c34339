// presence-protocol/src/audit.rs
//
// Persisted audit/error records. Vault access entries are intentionally
// free of personal content: an opaque subject reference, an action tag,
// an integrity hash and a timestamp, nothing else.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::data_structures::CitizenId;
use crate::handshake::types::HandshakePhase;

/// Epoch milliseconds from the wall clock. Proof timestamps, credential
/// windows and audit entries all use this scale.
pub fn current_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultAction {
    #[serde(rename = "VAULT_DECRYPT_GRANTED")]
    DecryptGranted,
    #[serde(rename = "VAULT_DECRYPT_DENIED")]
    DecryptDenied,
}

impl VaultAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultAction::DecryptGranted => "VAULT_DECRYPT_GRANTED",
            VaultAction::DecryptDenied => "VAULT_DECRYPT_DENIED",
        }
    }
}

// One entry per vault decrypt attempt, granted or denied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub subject_id_ref: String,
    pub action: VaultAction,
    pub integrity_hash: String,
    #[serde(rename = "at")]
    pub at_ms: i64,
}

impl AccessLogEntry {
    pub fn new(subject_id_ref: impl Into<String>, action: VaultAction, at_ms: i64) -> Self {
        let subject_id_ref = subject_id_ref.into();
        let integrity_hash = integrity_hash(&subject_id_ref, action, at_ms);
        AccessLogEntry { subject_id_ref, action, integrity_hash, at_ms }
    }
}

/// Hex SHA-256 binding an audit entry's fields together, so tampering
/// with a stored entry is detectable without storing anything personal.
pub fn integrity_hash(subject_id_ref: &str, action: VaultAction, at_ms: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject_id_ref.as_bytes());
    hasher.update(b"|");
    hasher.update(action.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(at_ms.to_be_bytes());
    hex::encode(hasher.finalize())
}

// Structured record of a failed handshake attempt. `code`/`phase` say
// what went wrong and where; `hardware_error` separates sensor faults
// (retry silently) from suspected fraud (escalate).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<CitizenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    pub code: String,
    pub phase: HandshakePhase,
    pub hardware_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_details: Option<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    #[serde(rename = "at")]
    pub at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_hash_is_deterministic_and_binding() {
        let h1 = integrity_hash("citizen-1", VaultAction::DecryptGranted, 1000);
        let h2 = integrity_hash("citizen-1", VaultAction::DecryptGranted, 1000);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        // Any field change must change the hash
        assert_ne!(h1, integrity_hash("citizen-2", VaultAction::DecryptGranted, 1000));
        assert_ne!(h1, integrity_hash("citizen-1", VaultAction::DecryptDenied, 1000));
        assert_ne!(h1, integrity_hash("citizen-1", VaultAction::DecryptGranted, 1001));
    }

    #[test]
    fn access_entry_carries_matching_hash() {
        let entry = AccessLogEntry::new("citizen-1", VaultAction::DecryptDenied, 42);
        assert_eq!(entry.integrity_hash, integrity_hash("citizen-1", VaultAction::DecryptDenied, 42));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["subjectIdRef"], "citizen-1");
        assert_eq!(json["action"], "VAULT_DECRYPT_DENIED");
        assert_eq!(json["at"], 42);
    }

    #[test]
    fn error_entry_wire_format() {
        let entry = ErrorLogEntry {
            session_id: "session-9".to_string(),
            identity_id: None,
            device_info: Some("kiosk-3".to_string()),
            code: "HEARTBEAT_NOT_DETECTED".to_string(),
            phase: HandshakePhase::Phase3Vital,
            hardware_error: true,
            sensor_details: Some("bpm=210".to_string()),
            elapsed: Duration::from_millis(250),
            at_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["code"], "HEARTBEAT_NOT_DETECTED");
        assert_eq!(json["phase"], "PHASE_3_VITAL");
        assert_eq!(json["hardwareError"], true);
        assert_eq!(json["elapsed"], "250ms");
        assert!(json.get("identityId").is_none());

        let parsed: ErrorLogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }
}
