// presence-protocol/src/gateway.rs
//
// Service-facing entry points. Each operation validates its input,
// drives the core and maps internal failures onto the wire outcomes a
// caller is allowed to see: 400 for malformed input, 401 with a
// distinct code per authentication failure, 500 with no detail for
// backend trouble.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::audit::{current_epoch_millis, ErrorLogEntry};
use crate::credential::CredentialIssuer;
use crate::data_structures::{CitizenId, SignedPresenceProof};
use crate::handshake::types::{HandshakeFailure, HandshakeOutcome, HandshakePhase};
use crate::proof::types::{ProofFailure, VerifyOptions};
use crate::proof::PresenceVerifier;
use crate::storage::{ErrorLog, IdentityStore};
use crate::vault::record_vault::{LivingRecordVault, VaultFailure};
use crate::vault::types::{VaultReadout, VaultUpsert};

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("unauthorized: {code}")]
    Unauthorized { code: &'static str, message: String },
    #[error("handshake failed: {code} at {phase}")]
    HandshakeFailed { log_id: String, code: String, phase: HandshakePhase, hardware_error: bool },
    #[error("internal error")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::BadRequest { .. } => 400,
            GatewayError::Unauthorized { .. } | GatewayError::HandshakeFailed { .. } => 401,
            GatewayError::Internal => 500,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            GatewayError::BadRequest { .. } => "BAD_REQUEST",
            GatewayError::Unauthorized { code, .. } => code,
            GatewayError::HandshakeFailed { code, .. } => code,
            GatewayError::Internal => "INTERNAL",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyProofRequest {
    #[serde(rename = "signedProof")]
    pub proof: SignedPresenceProof,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nation: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptRequest {
    #[serde(rename = "signedProof")]
    pub proof: SignedPresenceProof,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeVerifyRequest {
    #[serde(rename = "handshakeResult")]
    pub outcome: HandshakeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<CitizenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

// What a successful authentication hands back
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofGrant {
    pub credential: String,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: i64,
    pub public_identifier: String,
}

pub struct AuthGateway {
    verifier: Arc<PresenceVerifier>,
    issuer: CredentialIssuer,
    vault: LivingRecordVault,
    identities: Arc<dyn IdentityStore>,
    error_log: Arc<dyn ErrorLog>,
}

impl AuthGateway {
    pub fn new(
        verifier: Arc<PresenceVerifier>,
        issuer: CredentialIssuer,
        vault: LivingRecordVault,
        identities: Arc<dyn IdentityStore>,
        error_log: Arc<dyn ErrorLog>,
    ) -> Self {
        AuthGateway { verifier, issuer, vault, identities, error_log }
    }

    /// Verifies a signed presence proof and issues a session credential.
    pub async fn verify_proof(
        &self,
        request: VerifyProofRequest,
    ) -> Result<ProofGrant, GatewayError> {
        validate_proof_shape(&request.proof)?;
        let options = VerifyOptions { nation: request.nation };
        let verified =
            self.verifier.verify(&request.proof, &options).await.map_err(map_proof_failure)?;
        Ok(self.grant_for(&verified.identity_id, &verified.public_identifier))
    }

    /// Redeems a completed handshake. A passing outcome issues a
    /// credential for the named identity; a failing one is persisted
    /// to the error log and reported back with the assigned log id.
    pub async fn handshake_verify(
        &self,
        request: HandshakeVerifyRequest,
    ) -> Result<ProofGrant, GatewayError> {
        let outcome = &request.outcome;
        let pass_consistent =
            outcome.auth_signal && outcome.cohesion_passed && outcome.failure.is_none();
        match &outcome.failure {
            None if pass_consistent => self.redeem_passing_outcome(&request).await,
            Some(failure) if !outcome.auth_signal => {
                self.record_failed_outcome(&request, failure).await
            }
            _ => {
                warn!(
                    "[Gateway] inconsistent handshake outcome for session {}",
                    outcome.session_id
                );
                Err(GatewayError::BadRequest {
                    message: "outcome flags disagree with failure record".to_string(),
                })
            }
        }
    }

    /// Writes vault fields for the bearer of a live credential.
    pub async fn vault_put(&self, token: &str, update: VaultUpsert) -> Result<(), GatewayError> {
        let claims = self.issuer.verify(token).map_err(|_| GatewayError::Unauthorized {
            code: "CREDENTIAL_INVALID",
            message: "credential invalid".to_string(),
        })?;
        if update.is_empty() {
            return Err(GatewayError::BadRequest {
                message: "no vault fields supplied".to_string(),
            });
        }
        self.vault.upsert(&claims.subject_id, update).await.map_err(map_vault_failure)
    }

    /// Decrypts the caller's vault row against a fresh signed proof.
    pub async fn vault_decrypt(
        &self,
        request: DecryptRequest,
    ) -> Result<VaultReadout, GatewayError> {
        validate_proof_shape(&request.proof)?;
        self.vault
            .decrypt_with_proof(&request.proof, &VerifyOptions::default())
            .await
            .map_err(map_vault_failure)
    }

    async fn redeem_passing_outcome(
        &self,
        request: &HandshakeVerifyRequest,
    ) -> Result<ProofGrant, GatewayError> {
        let identity_id =
            request.identity_id.as_deref().ok_or_else(|| GatewayError::BadRequest {
                message: "identityId is required for a passing outcome".to_string(),
            })?;
        let record = self
            .identities
            .get(identity_id)
            .await
            .map_err(|e| {
                error!("[Gateway] identity lookup failed: {}", e);
                GatewayError::Internal
            })?
            .filter(|record| record.is_vitalized())
            .ok_or_else(|| {
                warn!(
                    "[Gateway] handshake {} redeemed against unknown or non-vitalized identity {}",
                    request.outcome.session_id, identity_id
                );
                GatewayError::Unauthorized {
                    code: "CITIZEN_NOT_FOUND",
                    message: "no vitalized identity for this handshake".to_string(),
                }
            })?;
        info!(
            "[Gateway] handshake {} redeemed for {}",
            request.outcome.session_id, record.public_identifier
        );
        Ok(self.grant_for(&record.id, &record.public_identifier))
    }

    async fn record_failed_outcome(
        &self,
        request: &HandshakeVerifyRequest,
        failure: &HandshakeFailure,
    ) -> Result<ProofGrant, GatewayError> {
        let entry = ErrorLogEntry {
            session_id: request.outcome.session_id.clone(),
            identity_id: request.identity_id.clone(),
            device_info: request.device_info.clone(),
            code: failure.code.as_str().to_string(),
            phase: failure.phase,
            hardware_error: failure.hardware_error,
            sensor_details: failure.sensor_details.clone(),
            elapsed: request.outcome.total_elapsed,
            at_ms: current_epoch_millis(),
        };
        let log_id = self.error_log.append(entry).await.map_err(|e| {
            error!("[Gateway] error log append failed: {}", e);
            GatewayError::Internal
        })?;
        warn!(
            "[Gateway] handshake {} failed with {} at {} (log {})",
            request.outcome.session_id, failure.code, failure.phase, log_id
        );
        Err(GatewayError::HandshakeFailed {
            log_id,
            code: failure.code.as_str().to_string(),
            phase: failure.phase,
            hardware_error: failure.hardware_error,
        })
    }

    fn grant_for(&self, subject_id: &str, public_identifier: &str) -> ProofGrant {
        let issued = self.issuer.issue(subject_id, public_identifier);
        ProofGrant {
            credential: issued.token,
            expires_at_ms: issued.claims.expires_at,
            public_identifier: issued.claims.public_identifier,
        }
    }
}

// Shape checks run before any verification work
fn validate_proof_shape(proof: &SignedPresenceProof) -> Result<(), GatewayError> {
    let payload = &proof.payload;
    for (name, value) in [
        ("nonce", &payload.nonce),
        ("keyId", &payload.key_id),
        ("deviceId", &payload.device_id),
        ("signature", &proof.signature_b64),
    ] {
        if value.trim().is_empty() {
            return Err(GatewayError::BadRequest { message: format!("{name} must be non-empty") });
        }
    }
    if payload.timestamp_ms <= 0 {
        return Err(GatewayError::BadRequest {
            message: "timestamp must be a positive epoch-millisecond value".to_string(),
        });
    }
    Ok(())
}

fn map_proof_failure(failure: ProofFailure) -> GatewayError {
    match failure {
        ProofFailure::Backend(detail) => {
            error!("[Gateway] verification backend failure: {}", detail);
            GatewayError::Internal
        }
        other => GatewayError::Unauthorized { code: other.code(), message: other.to_string() },
    }
}

fn map_vault_failure(failure: VaultFailure) -> GatewayError {
    match failure {
        VaultFailure::DecryptDenied => GatewayError::Unauthorized {
            code: "DECRYPT_DENIED",
            message: "vault decrypt denied".to_string(),
        },
        VaultFailure::Backend(detail) => {
            error!("[Gateway] vault backend failure: {}", detail);
            GatewayError::Internal
        }
    }
}
