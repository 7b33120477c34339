// Types for presence proof verification

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_structures::CitizenId;

// Rejection codes in the order the verifier checks them. Backend wraps
// a collaborator-store failure; its detail is logged, never returned.
#[derive(Debug, Error, PartialEq)]
pub enum ProofFailure {
    #[error("proof timestamp outside the replay window")]
    ReplayWindow,
    #[error("resolved liveness score does not exceed the threshold")]
    LivenessRequired,
    #[error("no vitalized identity enrolled for this device and key")]
    CitizenNotFound,
    #[error("stored public key is malformed")]
    InvalidPublicKey,
    #[error("signature does not verify against the canonical payload")]
    SignatureInvalid,
    #[error("nonce already consumed")]
    ReplayNonce,
    #[error("verification backend failure: {0}")]
    Backend(String),
}

impl ProofFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ProofFailure::ReplayWindow => "REPLAY_WINDOW",
            ProofFailure::LivenessRequired => "LIVENESS_REQUIRED",
            ProofFailure::CitizenNotFound => "CITIZEN_NOT_FOUND",
            ProofFailure::InvalidPublicKey => "INVALID_PUBLIC_KEY",
            ProofFailure::SignatureInvalid => "SIGNATURE_INVALID",
            ProofFailure::ReplayNonce => "REPLAY_NONCE",
            ProofFailure::Backend(_) => "INTERNAL",
        }
    }
}

// Caller-supplied context for one verification
#[derive(Clone, Debug, Default)]
pub struct VerifyOptions {
    // Jurisdiction tag recorded in the nonce ledger, if the caller has one
    pub nation: Option<String>,
}

// What a successful verification resolves to: exactly one identity
// plus the liveness evidence that admitted it.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedPresence {
    pub identity_id: CitizenId,
    pub public_identifier: String,
    pub liveness_score: f64,
}

// Appended to the nonce ledger on every successful verification. The
// payload hash ties the consumed nonce back to the exact signed bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceLedgerEntry {
    pub identity_id: CitizenId,
    pub nonce: String,
    pub payload_hash: String,
    pub liveness_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nation: Option<String>,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}
