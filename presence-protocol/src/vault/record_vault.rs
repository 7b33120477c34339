// presence-protocol/src/vault/record_vault.rs
//
// The living record vault. Reads are gated on a freshly verified
// presence proof whose timestamp clears a freshness window tighter
// than the replay window; writes are partial upserts that never
// clobber an omitted field. Every decrypt attempt, granted or denied,
// appends one audit entry.

use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::audit::{current_epoch_millis, AccessLogEntry, VaultAction};
use crate::config::ProtocolConfig;
use crate::data_structures::SignedPresenceProof;
use crate::proof::types::{ProofFailure, VerifyOptions};
use crate::proof::{replay, PresenceVerifier};
use crate::storage::{AccessLog, VaultStore};
use crate::vault::cipher::FieldCipher;
use crate::vault::types::{LivingRecordEntry, VaultReadout, VaultUpsert};

// The single code a denied caller ever sees. The actual denial reason
// goes to the log and the audit trail, never over the wire.
#[derive(Debug, Error, PartialEq)]
pub enum VaultFailure {
    #[error("vault decrypt denied")]
    DecryptDenied,
    #[error("vault backend failure: {0}")]
    Backend(String),
}

impl VaultFailure {
    pub fn code(&self) -> &'static str {
        match self {
            VaultFailure::DecryptDenied => "DECRYPT_DENIED",
            VaultFailure::Backend(_) => "INTERNAL",
        }
    }
}

pub struct LivingRecordVault {
    config: ProtocolConfig,
    cipher: FieldCipher,
    verifier: Arc<PresenceVerifier>,
    store: Arc<dyn VaultStore>,
    access_log: Arc<dyn AccessLog>,
}

impl LivingRecordVault {
    pub fn new(
        config: ProtocolConfig,
        cipher: FieldCipher,
        verifier: Arc<PresenceVerifier>,
        store: Arc<dyn VaultStore>,
        access_log: Arc<dyn AccessLog>,
    ) -> Self {
        LivingRecordVault { config, cipher, verifier, store, access_log }
    }

    /// Encrypts and stores the supplied fields for a subject. Fields
    /// absent from the update keep their previously stored value.
    pub async fn upsert(&self, subject_id: &str, update: VaultUpsert) -> Result<(), VaultFailure> {
        let mut entry = self
            .store
            .load(subject_id)
            .await
            .map_err(|e| VaultFailure::Backend(e.to_string()))?
            .unwrap_or_else(|| LivingRecordEntry::empty(subject_id));

        if let Some(plaintext) = update.medical {
            entry.medical = Some(
                self.cipher
                    .encrypt_field(&plaintext)
                    .map_err(|e| VaultFailure::Backend(e.to_string()))?,
            );
        }
        if let Some(plaintext) = update.financial {
            entry.financial = Some(
                self.cipher
                    .encrypt_field(&plaintext)
                    .map_err(|e| VaultFailure::Backend(e.to_string()))?,
            );
        }
        entry.updated_at_ms = current_epoch_millis();

        info!("[Vault] upsert for subject {}", subject_id);
        self.store.save(entry).await.map_err(|e| VaultFailure::Backend(e.to_string()))
    }

    /// Runs the full proof pipeline, applies the freshness gate, then
    /// decrypts the subject's row. A field that is absent or fails
    /// authentication reads as empty rather than failing the call.
    pub async fn decrypt_with_proof(
        &self,
        proof: &SignedPresenceProof,
        options: &VerifyOptions,
    ) -> Result<VaultReadout, VaultFailure> {
        let now_ms = current_epoch_millis();

        let verified = match self.verifier.verify(proof, options).await {
            Ok(verified) => verified,
            Err(ProofFailure::Backend(detail)) => return Err(VaultFailure::Backend(detail)),
            Err(failure) => {
                warn!("[Vault] decrypt denied at verification: {}", failure.code());
                // No identity resolved; reference the claimed device
                let subject_ref = format!("device:{}", proof.payload.device_id);
                self.append_audit(&subject_ref, VaultAction::DecryptDenied, now_ms).await?;
                return Err(VaultFailure::DecryptDenied);
            }
        };

        let age_ms = replay::proof_age_ms(proof.payload.timestamp_ms, now_ms);
        if age_ms > self.config.vault_freshness_window_ms {
            warn!(
                "[Vault] decrypt denied: proof {}ms old, freshness window {}ms",
                age_ms, self.config.vault_freshness_window_ms
            );
            self.append_audit(&verified.identity_id, VaultAction::DecryptDenied, now_ms).await?;
            return Err(VaultFailure::DecryptDenied);
        }

        let entry = self
            .store
            .load(&verified.identity_id)
            .await
            .map_err(|e| VaultFailure::Backend(e.to_string()))?;
        let readout = match entry {
            Some(entry) => VaultReadout {
                medical: entry
                    .medical
                    .as_ref()
                    .and_then(|field| self.cipher.decrypt_field(field))
                    .unwrap_or_default(),
                financial: entry
                    .financial
                    .as_ref()
                    .and_then(|field| self.cipher.decrypt_field(field))
                    .unwrap_or_default(),
            },
            None => VaultReadout::default(),
        };

        self.append_audit(&verified.identity_id, VaultAction::DecryptGranted, now_ms).await?;
        info!("[Vault] decrypt granted for subject {}", verified.identity_id);
        Ok(readout)
    }

    async fn append_audit(
        &self,
        subject_ref: &str,
        action: VaultAction,
        at_ms: i64,
    ) -> Result<(), VaultFailure> {
        self.access_log
            .append(AccessLogEntry::new(subject_ref, action, at_ms))
            .await
            .map_err(|e| VaultFailure::Backend(e.to_string()))
    }
}
