// Persisted and wire shapes for the living record vault

use serde::{Deserialize, Serialize};

use crate::data_structures::CitizenId;

// One encrypted vault field: ciphertext, IV and GCM tag, each base64
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedField {
    #[serde(rename = "ciphertext")]
    pub ciphertext_b64: String,
    #[serde(rename = "iv")]
    pub iv_b64: String,
    #[serde(rename = "authTag")]
    pub auth_tag_b64: String,
}

// A subject's vault row. Plaintext never appears in this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivingRecordEntry {
    pub subject_id: CitizenId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical: Option<EncryptedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial: Option<EncryptedField>,
    pub updated_at_ms: i64,
}

impl LivingRecordEntry {
    pub fn empty(subject_id: impl Into<CitizenId>) -> Self {
        LivingRecordEntry {
            subject_id: subject_id.into(),
            medical: None,
            financial: None,
            updated_at_ms: 0,
        }
    }
}

// Partial update. An omitted field leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultUpsert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial: Option<String>,
}

impl VaultUpsert {
    pub fn is_empty(&self) -> bool {
        self.medical.is_none() && self.financial.is_none()
    }
}

// Decrypted view returned to a granted caller. Fields that are absent
// or fail authentication read as empty strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultReadout {
    pub medical: String,
    pub financial: String,
}
