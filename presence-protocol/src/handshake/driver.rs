// presence-protocol/src/handshake/driver.rs
//
// Drives a session through the capture phases against the sensor
// stack. Each capture is awaited under its own sub-timeout; a sensor
// that outlives its budget has its future dropped on the spot and the
// session records the interruption.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::ProtocolConfig;
use crate::handshake::session::{HandshakeSession, TransitionError};
use crate::handshake::types::{
    HandshakeOutcome, HandshakePhase, TactileCapture, VisualCapture, VitalCapture,
};

// The sensor stack behind the handshake. Implementations block until
// the hardware yields a reading; the driver bounds each wait.
#[async_trait]
pub trait SensorSuite: Send + Sync {
    async fn capture_visual(&self) -> VisualCapture;
    async fn capture_tactile(&self) -> TactileCapture;
    async fn capture_vital(&self) -> VitalCapture;
}

pub struct HandshakeDriver {
    sensors: Arc<dyn SensorSuite>,
    config: ProtocolConfig,
}

impl HandshakeDriver {
    pub fn new(sensors: Arc<dyn SensorSuite>, config: ProtocolConfig) -> Self {
        HandshakeDriver { sensors, config }
    }

    /// Runs one full handshake attempt and returns its terminal report.
    pub async fn run(&self, session_id: &str) -> Result<HandshakeOutcome, TransitionError> {
        let mut session = HandshakeSession::begin(session_id, &self.config);

        let visual_budget = Duration::from_millis(self.config.phase_visual_timeout_ms);
        match timeout(visual_budget, self.sensors.capture_visual()).await {
            Ok(capture) => {
                session.apply_visual(&capture)?;
            }
            Err(_) => {
                session.interrupt(format!(
                    "visual capture exceeded {}ms",
                    visual_budget.as_millis()
                ))?;
            }
        }

        if session.current_phase() == HandshakePhase::Phase2Tactile {
            let tactile_budget = Duration::from_millis(self.config.phase_tactile_timeout_ms);
            match timeout(tactile_budget, self.sensors.capture_tactile()).await {
                Ok(capture) => {
                    session.apply_tactile(&capture)?;
                }
                Err(_) => {
                    session.interrupt(format!(
                        "tactile capture exceeded {}ms",
                        tactile_budget.as_millis()
                    ))?;
                }
            }
        }

        if session.current_phase() == HandshakePhase::Phase3Vital {
            let vital_budget = Duration::from_millis(self.config.phase_vital_timeout_ms);
            match timeout(vital_budget, self.sensors.capture_vital()).await {
                Ok(capture) => {
                    session.apply_vital(&capture)?;
                }
                Err(_) => {
                    session.interrupt(format!(
                        "vital capture exceeded {}ms",
                        vital_budget.as_millis()
                    ))?;
                }
            }
        }

        session.finalize()
    }
}
