// Liveness evidence resolution for presence proofs

use crate::data_structures::PresenceProofPayload;

/// Resolves the payload's liveness evidence to a single score. An
/// explicit numeric score always wins; otherwise the boolean flag maps
/// to 1.0 or 0.0; otherwise the policy default applies, which is
/// auto-fail under a liveness-required policy and pass-through else.
pub fn resolve_score(payload: &PresenceProofPayload, liveness_required: bool) -> f64 {
    if let Some(score) = payload.liveness_score {
        return score;
    }
    if let Some(ok) = payload.liveness_ok {
        return if ok { 1.0 } else { 0.0 };
    }
    if liveness_required {
        0.0
    } else {
        1.0
    }
}

/// Strict comparison: a score exactly at the threshold does not pass.
pub fn passes(score: f64, threshold: f64) -> bool {
    score > threshold
}
