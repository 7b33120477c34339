// Presence authentication core: signed presence proofs, the sequential
// biometric handshake, short-lived session credentials, and the
// freshness-gated living record vault.

pub mod audit;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod data_structures;
pub mod gateway;
pub mod handshake;
pub mod proof;
pub mod storage;
pub mod vault;

pub mod test_utils; // Shared helpers for unit and integration tests
