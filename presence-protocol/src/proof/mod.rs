// Presence proof verification pipeline

pub mod liveness;
pub mod replay;
pub mod types;
pub mod verifier;

pub use types::{NonceLedgerEntry, ProofFailure, VerifiedPresence, VerifyOptions};
pub use verifier::PresenceVerifier;
