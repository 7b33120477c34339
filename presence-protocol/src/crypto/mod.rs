// Crypto module: Ed25519 key handling and the canonical proof serialization

pub mod canonical;
pub mod keys;

pub use canonical::{canonical_string, payload_hash_hex};
pub use keys::{
    decode_public_key, decode_signature, encode_public_key, encode_signature, generate_keypair,
    sign, verify, KeyDecodeError, PublicKey, SecretKey,
};
