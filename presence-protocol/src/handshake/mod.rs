// Handshake module: the sequential four-phase biometric ceremony

pub mod driver;
pub mod phases;
pub mod session;
pub mod types;

pub use driver::{HandshakeDriver, SensorSuite};
pub use session::{HandshakeSession, TransitionError};
pub use types::{
    HandshakeFailure, HandshakeFailureCode, HandshakeOutcome, HandshakePhase, PhaseResult,
    TactileCapture, VisualCapture, VitalCapture,
};
