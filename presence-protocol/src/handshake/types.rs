// Types for the sequential four-phase biometric handshake

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::audit::current_epoch_millis;

// Phases in their mandatory order, plus the terminal states. A session
// may only ever move forward through this sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandshakePhase {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "PHASE_1_VISUAL")]
    Phase1Visual,
    #[serde(rename = "PHASE_2_TACTILE")]
    Phase2Tactile,
    #[serde(rename = "PHASE_3_VITAL")]
    Phase3Vital,
    #[serde(rename = "PHASE_4_COHESION")]
    Phase4Cohesion,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

impl HandshakePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakePhase::Idle => "IDLE",
            HandshakePhase::Phase1Visual => "PHASE_1_VISUAL",
            HandshakePhase::Phase2Tactile => "PHASE_2_TACTILE",
            HandshakePhase::Phase3Vital => "PHASE_3_VITAL",
            HandshakePhase::Phase4Cohesion => "PHASE_4_COHESION",
            HandshakePhase::Success => "SUCCESS",
            HandshakePhase::Failed => "FAILED",
        }
    }
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Raw reading from the facial scanner
#[derive(Clone, Debug, PartialEq)]
pub struct VisualCapture {
    pub mesh_point_count: u32,
    pub blood_flow_detected: bool,
    pub liveness_score: f64,
}

// Raw reading from the fingerprint sensor
#[derive(Clone, Debug, PartialEq)]
pub struct TactileCapture {
    pub pattern_matched: bool,
    pub confidence: f64,
}

// Raw readings from the pulse and voice sensors, captured together
#[derive(Clone, Debug, PartialEq)]
pub struct VitalCapture {
    pub pulse_detected: bool,
    pub bpm: f64,
    pub voice_confirmed: bool,
    pub spectral_voice_hash: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakeFailureCode {
    FaceNotDetected,
    LivenessNotDetected,
    FingerprintMismatch,
    HeartbeatNotDetected,
    VoiceCaptureFailed,
    SequenceInterrupted,
    CohesionTimeout,
}

impl HandshakeFailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeFailureCode::FaceNotDetected => "FACE_NOT_DETECTED",
            HandshakeFailureCode::LivenessNotDetected => "LIVENESS_NOT_DETECTED",
            HandshakeFailureCode::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            HandshakeFailureCode::HeartbeatNotDetected => "HEARTBEAT_NOT_DETECTED",
            HandshakeFailureCode::VoiceCaptureFailed => "VOICE_CAPTURE_FAILED",
            HandshakeFailureCode::SequenceInterrupted => "SEQUENCE_INTERRUPTED",
            HandshakeFailureCode::CohesionTimeout => "COHESION_TIMEOUT",
        }
    }

    // Sensor/driver faults get retried silently by the device shell;
    // everything else escalates as possible fraud.
    pub fn is_hardware_error(&self) -> bool {
        matches!(
            self,
            HandshakeFailureCode::HeartbeatNotDetected
                | HandshakeFailureCode::VoiceCaptureFailed
                | HandshakeFailureCode::SequenceInterrupted
        )
    }
}

impl fmt::Display for HandshakeFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A phase rejection with enough context for the error log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeFailure {
    pub code: HandshakeFailureCode,
    pub phase: HandshakePhase,
    pub message: String,
    pub hardware_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_details: Option<String>,
    #[serde(rename = "at")]
    pub at_ms: i64,
}

impl HandshakeFailure {
    pub fn new(
        code: HandshakeFailureCode,
        phase: HandshakePhase,
        message: impl Into<String>,
        sensor_details: Option<String>,
    ) -> Self {
        HandshakeFailure {
            code,
            phase,
            message: message.into(),
            hardware_error: code.is_hardware_error(),
            sensor_details,
            at_ms: current_epoch_millis(),
        }
    }
}

// Recorded verdict for one completed phase
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseResult {
    pub passed: bool,
    pub failure: Option<HandshakeFailure>,
}

impl PhaseResult {
    pub fn passed() -> Self {
        PhaseResult { passed: true, failure: None }
    }

    pub fn failed(failure: HandshakeFailure) -> Self {
        PhaseResult { passed: false, failure: Some(failure) }
    }
}

// Terminal report of a handshake session. `auth_signal` is true only
// when all three capture phases passed and cohesion held.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeOutcome {
    pub session_id: String,
    pub auth_signal: bool,
    pub cohesion_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<HandshakeFailure>,
    #[serde(with = "humantime_serde")]
    pub total_elapsed: Duration,
}
