// presence-protocol/src/crypto/keys.rs

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

// Re-export key types for convenience
pub use ed25519_dalek::{SigningKey as SecretKey, VerifyingKey as PublicKey};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Generates a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut csprng = OsRng;
    SigningKey::generate(&mut csprng)
}

/// Signs a message using an Ed25519 secret key.
pub fn sign(message: &[u8], secret_key: &SigningKey) -> Signature {
    secret_key.sign(message)
}

/// Verifies an Ed25519 signature against a message and public key.
pub fn verify(message: &[u8], signature: &Signature, public_key: &VerifyingKey) -> bool {
    public_key.verify(message, signature).is_ok()
}

// Decode failures for stored keys and wire signatures. The verifier maps
// these to its own rejection codes; the cause never reaches a caller.
#[derive(Debug, Error)]
pub enum KeyDecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("bytes do not form a valid Ed25519 point")]
    Malformed(#[source] SignatureError),
}

pub fn encode_public_key(public_key: &PublicKey) -> String {
    BASE64.encode(public_key.as_bytes())
}

pub fn decode_public_key(encoded: &str) -> Result<PublicKey, KeyDecodeError> {
    let bytes = BASE64.decode(encoded)?;
    let arr: [u8; PUBLIC_KEY_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyDecodeError::Length { expected: PUBLIC_KEY_LEN, actual: bytes.len() })?;
    VerifyingKey::from_bytes(&arr).map_err(KeyDecodeError::Malformed)
}

pub fn encode_signature(signature: &Signature) -> String {
    BASE64.encode(signature.to_bytes())
}

pub fn decode_signature(encoded: &str) -> Result<Signature, KeyDecodeError> {
    let bytes = BASE64.decode(encoded)?;
    let arr: [u8; SIGNATURE_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyDecodeError::Length { expected: SIGNATURE_LEN, actual: bytes.len() })?;
    Ok(Signature::from_bytes(&arr))
}
