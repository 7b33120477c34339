// presence-protocol/src/handshake/phases.rs
//
// Pure acceptance rules for each capture phase. The session state
// machine sequences these; nothing here holds state or does I/O.

use crate::config::ProtocolConfig;
use crate::handshake::types::{
    HandshakeFailure, HandshakeFailureCode, HandshakePhase, TactileCapture, VisualCapture,
    VitalCapture,
};

/// Phase 1: facial mesh density must match the scanner's emission
/// exactly, with blood flow present and near-certain visual liveness.
pub fn validate_visual(capture: &VisualCapture, config: &ProtocolConfig) -> Result<(), HandshakeFailure> {
    if capture.mesh_point_count != config.expected_mesh_density {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::FaceNotDetected,
            HandshakePhase::Phase1Visual,
            "facial mesh density does not match scanner emission",
            Some(format!("mesh_points={}", capture.mesh_point_count)),
        ));
    }
    if !capture.blood_flow_detected {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::LivenessNotDetected,
            HandshakePhase::Phase1Visual,
            "no subdermal blood flow in capture",
            Some("blood_flow=false".to_string()),
        ));
    }
    if capture.liveness_score < config.min_visual_liveness {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::LivenessNotDetected,
            HandshakePhase::Phase1Visual,
            "visual liveness below floor",
            Some(format!("liveness_score={:.4}", capture.liveness_score)),
        ));
    }
    Ok(())
}

/// Phase 2: fingerprint pattern must match the enrolled template with
/// high confidence.
pub fn validate_tactile(capture: &TactileCapture, config: &ProtocolConfig) -> Result<(), HandshakeFailure> {
    if !capture.pattern_matched {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::FingerprintMismatch,
            HandshakePhase::Phase2Tactile,
            "fingerprint pattern does not match enrolled template",
            Some("pattern_matched=false".to_string()),
        ));
    }
    if capture.confidence < config.min_fingerprint_confidence {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::FingerprintMismatch,
            HandshakePhase::Phase2Tactile,
            "fingerprint match confidence below floor",
            Some(format!("confidence={:.4}", capture.confidence)),
        ));
    }
    Ok(())
}

/// Phase 3: a plausible pulse plus a confirmed voice sample with its
/// spectral hash. Rejections here are sensor faults, not fraud.
pub fn validate_vital(capture: &VitalCapture, config: &ProtocolConfig) -> Result<(), HandshakeFailure> {
    let (min_bpm, max_bpm) = config.heartbeat_range_bpm;
    if !capture.pulse_detected {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::HeartbeatNotDetected,
            HandshakePhase::Phase3Vital,
            "no pulse in capture window",
            Some("pulse_detected=false".to_string()),
        ));
    }
    if capture.bpm < min_bpm || capture.bpm > max_bpm {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::HeartbeatNotDetected,
            HandshakePhase::Phase3Vital,
            "heart rate outside plausible range",
            Some(format!("bpm={:.1}", capture.bpm)),
        ));
    }
    if !capture.voice_confirmed {
        return Err(HandshakeFailure::new(
            HandshakeFailureCode::VoiceCaptureFailed,
            HandshakePhase::Phase3Vital,
            "voice sample not confirmed",
            Some("voice_confirmed=false".to_string()),
        ));
    }
    match &capture.spectral_voice_hash {
        Some(hash) if !hash.is_empty() => Ok(()),
        _ => Err(HandshakeFailure::new(
            HandshakeFailureCode::VoiceCaptureFailed,
            HandshakePhase::Phase3Vital,
            "spectral voice hash missing from capture",
            Some("spectral_hash=absent".to_string()),
        )),
    }
}
