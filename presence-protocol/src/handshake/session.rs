// presence-protocol/src/handshake/session.rs
//
// Per-attempt state machine for the sequential handshake. Phases only
// ever move forward; a failed capture diverts straight to cohesion
// evaluation carrying its cause, and the global time budget is checked
// last so it overrides even three clean phases.

use log::{debug, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ProtocolConfig;
use crate::handshake::phases::{validate_tactile, validate_visual, validate_vital};
use crate::handshake::types::{
    HandshakeFailure, HandshakeFailureCode, HandshakeOutcome, HandshakePhase, PhaseResult,
    TactileCapture, VisualCapture, VitalCapture,
};

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("session {session_id}: got {attempted} input while in {current}")]
    OutOfOrder { session_id: String, current: HandshakePhase, attempted: HandshakePhase },
    #[error("session {session_id}: no capture in flight to interrupt in {current}")]
    NotCapturing { session_id: String, current: HandshakePhase },
}

pub struct HandshakeSession {
    session_id: String,
    config: ProtocolConfig,
    started: Instant,
    current_phase: HandshakePhase,
    phase1_result: Option<PhaseResult>,
    phase2_result: Option<PhaseResult>,
    phase3_result: Option<PhaseResult>,
}

impl HandshakeSession {
    /// Opens a fresh session and starts the cohesion clock.
    pub fn begin(session_id: impl Into<String>, config: &ProtocolConfig) -> Self {
        let mut session = HandshakeSession {
            session_id: session_id.into(),
            config: config.clone(),
            started: Instant::now(),
            current_phase: HandshakePhase::Idle,
            phase1_result: None,
            phase2_result: None,
            phase3_result: None,
        };
        session.advance(HandshakePhase::Phase1Visual);
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_phase(&self) -> HandshakePhase {
        self.current_phase
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn advance(&mut self, next: HandshakePhase) {
        debug!("[Handshake {}] {} -> {}", self.session_id, self.current_phase, next);
        self.current_phase = next;
    }

    fn expect_phase(&self, attempted: HandshakePhase) -> Result<(), TransitionError> {
        if self.current_phase == attempted {
            Ok(())
        } else {
            Err(TransitionError::OutOfOrder {
                session_id: self.session_id.clone(),
                current: self.current_phase,
                attempted,
            })
        }
    }

    /// Phase 1 input. Returns the phase the session moved to.
    pub fn apply_visual(&mut self, capture: &VisualCapture) -> Result<HandshakePhase, TransitionError> {
        self.expect_phase(HandshakePhase::Phase1Visual)?;
        match validate_visual(capture, &self.config) {
            Ok(()) => {
                self.phase1_result = Some(PhaseResult::passed());
                self.advance(HandshakePhase::Phase2Tactile);
            }
            Err(failure) => {
                warn!(
                    "[Handshake {}] phase 1 rejected: {} ({})",
                    self.session_id, failure.code, failure.message
                );
                self.phase1_result = Some(PhaseResult::failed(failure));
                self.advance(HandshakePhase::Phase4Cohesion);
            }
        }
        Ok(self.current_phase)
    }

    /// Phase 2 input, accepted only after phase 1 passed.
    pub fn apply_tactile(&mut self, capture: &TactileCapture) -> Result<HandshakePhase, TransitionError> {
        self.expect_phase(HandshakePhase::Phase2Tactile)?;
        match validate_tactile(capture, &self.config) {
            Ok(()) => {
                self.phase2_result = Some(PhaseResult::passed());
                self.advance(HandshakePhase::Phase3Vital);
            }
            Err(failure) => {
                warn!(
                    "[Handshake {}] phase 2 rejected: {} ({})",
                    self.session_id, failure.code, failure.message
                );
                self.phase2_result = Some(PhaseResult::failed(failure));
                self.advance(HandshakePhase::Phase4Cohesion);
            }
        }
        Ok(self.current_phase)
    }

    /// Phase 3 input. Both verdicts land in cohesion evaluation next.
    pub fn apply_vital(&mut self, capture: &VitalCapture) -> Result<HandshakePhase, TransitionError> {
        self.expect_phase(HandshakePhase::Phase3Vital)?;
        match validate_vital(capture, &self.config) {
            Ok(()) => {
                self.phase3_result = Some(PhaseResult::passed());
            }
            Err(failure) => {
                warn!(
                    "[Handshake {}] phase 3 rejected: {} ({})",
                    self.session_id, failure.code, failure.message
                );
                self.phase3_result = Some(PhaseResult::failed(failure));
            }
        }
        self.advance(HandshakePhase::Phase4Cohesion);
        Ok(self.current_phase)
    }

    /// Records a sensor that never came back for the capture phase in
    /// flight, then diverts to cohesion evaluation.
    pub fn interrupt(&mut self, details: impl Into<String>) -> Result<HandshakePhase, TransitionError> {
        let phase = self.current_phase;
        if !matches!(
            phase,
            HandshakePhase::Phase1Visual | HandshakePhase::Phase2Tactile | HandshakePhase::Phase3Vital
        ) {
            return Err(TransitionError::NotCapturing {
                session_id: self.session_id.clone(),
                current: phase,
            });
        }
        let failure = HandshakeFailure::new(
            HandshakeFailureCode::SequenceInterrupted,
            phase,
            "sensor capture did not complete in time",
            Some(details.into()),
        );
        warn!("[Handshake {}] {} interrupted: {}", self.session_id, phase, failure.message);
        let result = PhaseResult::failed(failure);
        match phase {
            HandshakePhase::Phase1Visual => self.phase1_result = Some(result),
            HandshakePhase::Phase2Tactile => self.phase2_result = Some(result),
            _ => self.phase3_result = Some(result),
        }
        self.advance(HandshakePhase::Phase4Cohesion);
        Ok(self.current_phase)
    }

    fn first_failure(&self) -> Option<HandshakeFailure> {
        [&self.phase1_result, &self.phase2_result, &self.phase3_result]
            .into_iter()
            .flatten()
            .find(|result| !result.passed)
            .and_then(|result| result.failure.clone())
    }

    /// Phase 4: cohesion evaluation. The budget check runs first so a
    /// slow-but-clean run still fails with COHESION_TIMEOUT.
    pub fn finalize(&mut self) -> Result<HandshakeOutcome, TransitionError> {
        self.expect_phase(HandshakePhase::Phase4Cohesion)?;
        let elapsed = self.started.elapsed();
        let budget = Duration::from_millis(self.config.handshake_cohesion_budget_ms);
        let cohesion_passed = elapsed <= budget;

        let failure = if !cohesion_passed {
            Some(HandshakeFailure::new(
                HandshakeFailureCode::CohesionTimeout,
                HandshakePhase::Phase4Cohesion,
                "phases did not cohere within the global budget",
                Some(format!(
                    "elapsed_ms={} budget_ms={}",
                    elapsed.as_millis(),
                    budget.as_millis()
                )),
            ))
        } else {
            self.first_failure()
        };

        let auth_signal = failure.is_none();
        self.advance(if auth_signal { HandshakePhase::Success } else { HandshakePhase::Failed });
        if auth_signal {
            info!("[Handshake {}] authenticated in {:?}", self.session_id, elapsed);
        } else if let Some(f) = &failure {
            warn!("[Handshake {}] failed: {} at {}", self.session_id, f.code, f.phase);
        }

        Ok(HandshakeOutcome {
            session_id: self.session_id.clone(),
            auth_signal,
            cohesion_passed,
            failure,
            total_elapsed: elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_visual() -> VisualCapture {
        VisualCapture { mesh_point_count: 127, blood_flow_detected: true, liveness_score: 0.999 }
    }

    fn passing_tactile() -> TactileCapture {
        TactileCapture { pattern_matched: true, confidence: 0.98 }
    }

    fn passing_vital() -> VitalCapture {
        VitalCapture {
            pulse_detected: true,
            bpm: 68.0,
            voice_confirmed: true,
            spectral_voice_hash: Some("f00d".to_string()),
        }
    }

    #[test]
    fn clean_run_authenticates() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-1", &config);
        assert_eq!(session.current_phase(), HandshakePhase::Phase1Visual);

        assert_eq!(session.apply_visual(&passing_visual()).unwrap(), HandshakePhase::Phase2Tactile);
        assert_eq!(session.apply_tactile(&passing_tactile()).unwrap(), HandshakePhase::Phase3Vital);
        assert_eq!(session.apply_vital(&passing_vital()).unwrap(), HandshakePhase::Phase4Cohesion);

        let outcome = session.finalize().unwrap();
        assert!(outcome.auth_signal);
        assert!(outcome.cohesion_passed);
        assert!(outcome.failure.is_none());
        assert_eq!(session.current_phase(), HandshakePhase::Success);
    }

    #[test]
    fn failed_phase_diverts_to_cohesion_with_cause() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-2", &config);

        let bad_visual = VisualCapture { mesh_point_count: 126, ..passing_visual() };
        assert_eq!(session.apply_visual(&bad_visual).unwrap(), HandshakePhase::Phase4Cohesion);

        // Later phases are no longer accepted
        let err = session.apply_tactile(&passing_tactile()).unwrap_err();
        assert!(matches!(err, TransitionError::OutOfOrder { .. }));

        let outcome = session.finalize().unwrap();
        assert!(!outcome.auth_signal);
        assert!(outcome.cohesion_passed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.code, HandshakeFailureCode::FaceNotDetected);
        assert_eq!(failure.phase, HandshakePhase::Phase1Visual);
        assert!(!failure.hardware_error);
        assert_eq!(session.current_phase(), HandshakePhase::Failed);
    }

    #[test]
    fn out_of_order_input_is_rejected() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-3", &config);

        let err = session.apply_tactile(&passing_tactile()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::OutOfOrder {
                session_id: "session-3".to_string(),
                current: HandshakePhase::Phase1Visual,
                attempted: HandshakePhase::Phase2Tactile,
            }
        );

        let err = session.apply_vital(&passing_vital()).unwrap_err();
        assert!(matches!(err, TransitionError::OutOfOrder { .. }));

        // The rejection must not have moved the machine
        assert_eq!(session.current_phase(), HandshakePhase::Phase1Visual);
    }

    #[test]
    fn finalize_before_cohesion_is_rejected() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-4", &config);
        session.apply_visual(&passing_visual()).unwrap();
        assert!(session.finalize().is_err());
    }

    #[test]
    fn budget_overrun_fails_even_when_all_phases_passed() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-5", &config);
        session.apply_visual(&passing_visual()).unwrap();
        session.apply_tactile(&passing_tactile()).unwrap();
        session.apply_vital(&passing_vital()).unwrap();

        // Rewind the clock past the 1500ms budget
        session.started = Instant::now().checked_sub(Duration::from_millis(2_000)).unwrap();

        let outcome = session.finalize().unwrap();
        assert!(!outcome.auth_signal);
        assert!(!outcome.cohesion_passed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.code, HandshakeFailureCode::CohesionTimeout);
        assert_eq!(failure.phase, HandshakePhase::Phase4Cohesion);
        assert!(outcome.total_elapsed >= Duration::from_millis(2_000));
    }

    #[test]
    fn interrupt_records_hung_sensor_against_current_phase() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-6", &config);
        session.apply_visual(&passing_visual()).unwrap();

        session.interrupt("tactile sensor timed out after 500ms").unwrap();
        let outcome = session.finalize().unwrap();
        assert!(!outcome.auth_signal);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.code, HandshakeFailureCode::SequenceInterrupted);
        assert_eq!(failure.phase, HandshakePhase::Phase2Tactile);
        assert!(failure.hardware_error);
        assert_eq!(failure.sensor_details.as_deref(), Some("tactile sensor timed out after 500ms"));
    }

    #[test]
    fn interrupt_outside_capture_phase_is_rejected() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-7", &config);
        session.apply_visual(&VisualCapture { blood_flow_detected: false, ..passing_visual() }).unwrap();

        // Already at cohesion, nothing to interrupt
        let err = session.interrupt("late").unwrap_err();
        assert!(matches!(err, TransitionError::NotCapturing { .. }));
    }

    #[test]
    fn session_cannot_be_finalized_twice() {
        let config = ProtocolConfig::default();
        let mut session = HandshakeSession::begin("session-8", &config);
        session.apply_visual(&passing_visual()).unwrap();
        session.apply_tactile(&passing_tactile()).unwrap();
        session.apply_vital(&passing_vital()).unwrap();

        session.finalize().unwrap();
        assert!(session.finalize().is_err());
        assert!(session.apply_visual(&passing_visual()).is_err());
    }
}
