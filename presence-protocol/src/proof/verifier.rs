// presence-protocol/src/proof/verifier.rs
//
// Resolves a signed presence proof to exactly one vitalized identity.
// Checks run cheapest-first and the durable nonce write comes last, so
// no mutation ever happens for a proof that fails any earlier check.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::audit::current_epoch_millis;
use crate::config::ProtocolConfig;
use crate::crypto::{canonical_string, decode_public_key, decode_signature, payload_hash_hex};
use crate::data_structures::SignedPresenceProof;
use crate::proof::types::{NonceLedgerEntry, ProofFailure, VerifiedPresence, VerifyOptions};
use crate::proof::{liveness, replay};
use crate::storage::{IdentityStore, NonceLedger, NonceLedgerError};

pub struct PresenceVerifier {
    config: ProtocolConfig,
    identities: Arc<dyn IdentityStore>,
    nonce_ledger: Arc<dyn NonceLedger>,
}

impl PresenceVerifier {
    pub fn new(
        config: ProtocolConfig,
        identities: Arc<dyn IdentityStore>,
        nonce_ledger: Arc<dyn NonceLedger>,
    ) -> Self {
        PresenceVerifier { config, identities, nonce_ledger }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Full verification pipeline. Exactly one outcome per proof: a
    /// resolved identity, or the first failing check's code.
    pub async fn verify(
        &self,
        proof: &SignedPresenceProof,
        options: &VerifyOptions,
    ) -> Result<VerifiedPresence, ProofFailure> {
        let payload = &proof.payload;
        let now_ms = current_epoch_millis();
        debug!(
            "[Verifier] proof from device {} key {} nonce {}",
            payload.device_id, payload.key_id, payload.nonce
        );

        // 1. Replay window
        if !replay::within_window(payload.timestamp_ms, now_ms, self.config.replay_window_ms) {
            warn!(
                "[Verifier] rejected: timestamp {}ms old, window {}ms",
                replay::proof_age_ms(payload.timestamp_ms, now_ms),
                self.config.replay_window_ms
            );
            return Err(ProofFailure::ReplayWindow);
        }

        // 2. Liveness gate
        let liveness_score = liveness::resolve_score(payload, self.config.liveness_required);
        if !liveness::passes(liveness_score, self.config.liveness_threshold) {
            warn!(
                "[Verifier] rejected: liveness {:.2} not above threshold {:.2}",
                liveness_score, self.config.liveness_threshold
            );
            return Err(ProofFailure::LivenessRequired);
        }

        // 3. Identity lookup, vitalized records only
        let record = self
            .identities
            .find_vitalized(&payload.device_id, &payload.key_id)
            .await
            .map_err(|e| ProofFailure::Backend(e.to_string()))?
            .ok_or_else(|| {
                warn!(
                    "[Verifier] rejected: no vitalized identity for device {} key {}",
                    payload.device_id, payload.key_id
                );
                ProofFailure::CitizenNotFound
            })?;

        // 4. Stored public key
        let public_key =
            decode_public_key(&record.public_key_b64).map_err(|_| ProofFailure::InvalidPublicKey)?;

        // 5. Signature over the canonical payload
        let canonical = canonical_string(payload);
        let signature =
            decode_signature(&proof.signature_b64).map_err(|_| ProofFailure::SignatureInvalid)?;
        if !crate::crypto::verify(canonical.as_bytes(), &signature, &public_key) {
            warn!("[Verifier] rejected: signature mismatch for {}", record.public_identifier);
            return Err(ProofFailure::SignatureInvalid);
        }

        // 6. Durable nonce write, the single mutation. Storage-level
        // uniqueness decides races between concurrent submissions.
        let entry = NonceLedgerEntry {
            identity_id: record.id.clone(),
            nonce: payload.nonce.clone(),
            payload_hash: payload_hash_hex(&canonical),
            liveness_score,
            nation: options.nation.clone(),
            timestamp_ms: payload.timestamp_ms,
        };
        self.nonce_ledger.append(entry).await.map_err(|e| match e {
            NonceLedgerError::DuplicateNonce => {
                warn!("[Verifier] rejected: nonce {} already consumed", payload.nonce);
                ProofFailure::ReplayNonce
            }
            NonceLedgerError::Backend(err) => ProofFailure::Backend(err.to_string()),
        })?;

        info!("[Verifier] presence verified for {}", record.public_identifier);
        Ok(VerifiedPresence {
            identity_id: record.id,
            public_identifier: record.public_identifier,
            liveness_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::VitalizationStatus;
    use crate::storage::{InMemoryIdentityStore, InMemoryNonceLedger};
    use crate::test_utils::{
        create_test_identity, create_test_signing_key, fresh_payload, sign_proof,
        FailingNonceLedger,
    };

    struct Fixture {
        verifier: PresenceVerifier,
        identities: Arc<InMemoryIdentityStore>,
        ledger: Arc<InMemoryNonceLedger>,
    }

    fn fixture(config: ProtocolConfig) -> Fixture {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let ledger = Arc::new(InMemoryNonceLedger::new());
        let verifier = PresenceVerifier::new(config, identities.clone(), ledger.clone());
        Fixture { verifier, identities, ledger }
    }

    #[tokio::test]
    async fn valid_proof_resolves_identity_and_writes_ledger() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record.clone());

        let proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        let options = VerifyOptions { nation: Some("NOR".to_string()) };
        let verified = fx.verifier.verify(&proof, &options).await.unwrap();

        assert_eq!(verified.identity_id, record.id);
        assert_eq!(verified.public_identifier, record.public_identifier);
        assert_eq!(verified.liveness_score, 1.0);

        let entries = fx.ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].nonce, "nonce-1");
        assert_eq!(entries[0].identity_id, record.id);
        assert_eq!(entries[0].nation.as_deref(), Some("NOR"));
        assert_eq!(entries[0].payload_hash.len(), 64);
    }

    #[tokio::test]
    async fn identical_resubmission_fails_replay_nonce() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap();

        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::ReplayNonce);
        assert_eq!(fx.ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn stale_timestamp_rejected_before_signature_checks() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let mut payload = fresh_payload("nonce-1", "device-a", "key-a");
        payload.timestamp_ms -= 301_000;
        // Sign with the wrong key as well: the window check must win
        let wrong_key = create_test_signing_key(99);
        let proof = sign_proof(payload, &wrong_key);

        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::ReplayWindow);
        assert!(fx.ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn liveness_failure_beats_identity_lookup() {
        let fx = fixture(ProtocolConfig::default());
        // No identity registered at all: a liveness reject must still
        // come back as LIVENESS_REQUIRED, not CITIZEN_NOT_FOUND
        let key = create_test_signing_key(1);
        let mut payload = fresh_payload("nonce-1", "device-a", "key-a");
        payload.liveness_ok = Some(false);
        let proof = sign_proof(payload, &key);

        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::LivenessRequired);
    }

    #[tokio::test]
    async fn explicit_score_overrides_flag() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        // Flag says ok, score says otherwise; the score wins
        let mut payload = fresh_payload("nonce-1", "device-a", "key-a");
        payload.liveness_score = Some(0.5);
        let proof = sign_proof(payload, &key);

        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::LivenessRequired);
    }

    #[tokio::test]
    async fn score_at_threshold_does_not_pass() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let mut payload = fresh_payload("nonce-1", "device-a", "key-a");
        payload.liveness_score = Some(0.8);
        let proof = sign_proof(payload, &key);
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::LivenessRequired);
    }

    #[tokio::test]
    async fn unknown_device_fails_citizen_not_found() {
        let fx = fixture(ProtocolConfig::default());
        let key = create_test_signing_key(1);
        let proof = sign_proof(fresh_payload("nonce-1", "device-x", "key-x"), &key);
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::CitizenNotFound);
    }

    #[tokio::test]
    async fn suspended_identity_fails_citizen_not_found() {
        let fx = fixture(ProtocolConfig::default());
        let (mut record, key) = create_test_identity(1, "device-a", "key-a");
        record.vitalization = VitalizationStatus::Suspended;
        fx.identities.register(record);

        let proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::CitizenNotFound);
    }

    #[tokio::test]
    async fn corrupt_stored_key_fails_invalid_public_key() {
        let fx = fixture(ProtocolConfig::default());
        let (mut record, key) = create_test_identity(1, "device-a", "key-a");
        record.public_key_b64 = "not-a-key".to_string();
        fx.identities.register(record);

        let proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::InvalidPublicKey);
    }

    #[tokio::test]
    async fn foreign_signature_fails_and_leaves_nonce_unconsumed() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let intruder = create_test_signing_key(66);
        let forged = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &intruder);
        let err = fx.verifier.verify(&forged, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::SignatureInvalid);
        assert!(fx.ledger.entries().is_empty());

        // The nonce was not burned by the failed attempt
        let genuine = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        assert!(fx.verifier.verify(&genuine, &VerifyOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn tampered_payload_fails_signature_check() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let mut proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        proof.payload.timestamp_ms += 10;
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::SignatureInvalid);
    }

    #[tokio::test]
    async fn garbage_signature_encoding_fails_signature_check() {
        let fx = fixture(ProtocolConfig::default());
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let mut proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        proof.signature_b64 = "@@@".to_string();
        let err = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert_eq!(err, ProofFailure::SignatureInvalid);
    }

    #[tokio::test]
    async fn ledger_backend_failure_is_not_replay_nonce() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let verifier = PresenceVerifier::new(
            ProtocolConfig::default(),
            identities.clone(),
            Arc::new(FailingNonceLedger),
        );
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        identities.register(record);

        let proof = sign_proof(fresh_payload("nonce-1", "device-a", "key-a"), &key);
        let err = verifier.verify(&proof, &VerifyOptions::default()).await.unwrap_err();
        assert!(matches!(err, ProofFailure::Backend(_)));
        assert_eq!(err.code(), "INTERNAL");
    }

    #[tokio::test]
    async fn fail_open_policy_passes_proofs_without_evidence() {
        let config = ProtocolConfig { liveness_required: false, ..ProtocolConfig::default() };
        let fx = fixture(config);
        let (record, key) = create_test_identity(1, "device-a", "key-a");
        fx.identities.register(record);

        let mut payload = fresh_payload("nonce-1", "device-a", "key-a");
        payload.liveness_ok = None;
        let proof = sign_proof(payload, &key);
        let verified = fx.verifier.verify(&proof, &VerifyOptions::default()).await.unwrap();
        assert_eq!(verified.liveness_score, 1.0);
    }
}
