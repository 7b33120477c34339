use thiserror::Error;

#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    // Presence proof verification
    pub replay_window_ms: u64,      // Max |now - proof timestamp| before rejection
    pub liveness_threshold: f64,    // Resolved liveness score must be strictly above this
    pub liveness_required: bool,    // Proofs carrying no liveness evidence fail when true

    // Session credentials
    pub credential_ttl_ms: u64,

    // Living record vault
    pub vault_freshness_window_ms: u64, // Max proof age for a decrypt, tighter than replay

    // Handshake timing
    pub handshake_cohesion_budget_ms: u64, // Global budget across all phases
    pub phase_visual_timeout_ms: u64,
    pub phase_tactile_timeout_ms: u64,
    pub phase_vital_timeout_ms: u64,

    // Handshake phase acceptance
    pub expected_mesh_density: u32,      // Exact facial mesh point count the scanner emits
    pub min_visual_liveness: f64,
    pub min_fingerprint_confidence: f64,
    pub heartbeat_range_bpm: (f64, f64), // Inclusive min/max plausible pulse
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            // Proof verification
            replay_window_ms: 300_000, // 5 minutes
            liveness_threshold: 0.8,
            liveness_required: true,

            // Credentials
            credential_ttl_ms: 900_000, // 15 minutes

            // Vault
            vault_freshness_window_ms: 120_000, // 2 minutes

            // Handshake timing
            handshake_cohesion_budget_ms: 1_500,
            phase_visual_timeout_ms: 500,
            phase_tactile_timeout_ms: 500,
            phase_vital_timeout_ms: 500,

            // Handshake acceptance
            expected_mesh_density: 127,
            min_visual_liveness: 0.99,
            min_fingerprint_confidence: 0.95,
            heartbeat_range_bpm: (40.0, 200.0),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("vault freshness window ({freshness_ms}ms) exceeds replay window ({replay_ms}ms)")]
    FreshnessExceedsReplayWindow { freshness_ms: u64, replay_ms: u64 },
    #[error("phase sub-timeout ({timeout_ms}ms) exceeds cohesion budget ({budget_ms}ms)")]
    PhaseTimeoutExceedsBudget { timeout_ms: u64, budget_ms: u64 },
    #[error("liveness threshold {0} is outside [0.0, 1.0)")]
    LivenessThresholdOutOfRange(f64),
    #[error("heartbeat range ({0}, {1}) is not ascending")]
    HeartbeatRangeInverted(f64, f64),
    #[error("credential TTL must be non-zero")]
    ZeroCredentialTtl,
}

impl ProtocolConfig {
    // A proof fresh enough for the vault must also clear the replay window,
    // so a decrypt can never be granted on a proof the verifier would reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault_freshness_window_ms > self.replay_window_ms {
            return Err(ConfigError::FreshnessExceedsReplayWindow {
                freshness_ms: self.vault_freshness_window_ms,
                replay_ms: self.replay_window_ms,
            });
        }
        for timeout_ms in [
            self.phase_visual_timeout_ms,
            self.phase_tactile_timeout_ms,
            self.phase_vital_timeout_ms,
        ] {
            if timeout_ms > self.handshake_cohesion_budget_ms {
                return Err(ConfigError::PhaseTimeoutExceedsBudget {
                    timeout_ms,
                    budget_ms: self.handshake_cohesion_budget_ms,
                });
            }
        }
        if !(0.0..1.0).contains(&self.liveness_threshold) {
            return Err(ConfigError::LivenessThresholdOutOfRange(self.liveness_threshold));
        }
        if self.heartbeat_range_bpm.0 >= self.heartbeat_range_bpm.1 {
            return Err(ConfigError::HeartbeatRangeInverted(
                self.heartbeat_range_bpm.0,
                self.heartbeat_range_bpm.1,
            ));
        }
        if self.credential_ttl_ms == 0 {
            return Err(ConfigError::ZeroCredentialTtl);
        }
        Ok(())
    }
}
