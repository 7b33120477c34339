// presence-protocol/src/vault/cipher.rs
//
// AES-256-GCM per-field encryption. The cipher instance, IV and
// buffers are built per call; nothing here is shared across concurrent
// operations. The GCM tag is stored apart from the ciphertext.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::vault::types::EncryptedField;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("vault cryptographic operation failed")]
pub struct CipherFailure;

#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_LEN],
}

impl FieldCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        FieldCipher { key }
    }

    /// Encrypts one field under a fresh random IV.
    pub fn encrypt_field(&self, plaintext: &str) -> Result<EncryptedField, CipherFailure> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherFailure)?;
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CipherFailure)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);
        Ok(EncryptedField {
            ciphertext_b64: BASE64.encode(&sealed),
            iv_b64: BASE64.encode(iv),
            auth_tag_b64: BASE64.encode(&tag),
        })
    }

    /// Decrypts one stored field. Corruption in any of the three parts
    /// reads as None; the caller decides what an unreadable field means.
    pub fn decrypt_field(&self, field: &EncryptedField) -> Option<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let iv = BASE64.decode(&field.iv_b64).ok()?;
        if iv.len() != IV_LEN {
            return None;
        }
        let mut sealed = BASE64.decode(&field.ciphertext_b64).ok()?;
        let tag = BASE64.decode(&field.auth_tag_b64).ok()?;
        if tag.len() != TAG_LEN {
            return None;
        }
        sealed.extend_from_slice(&tag);
        let plaintext = cipher.decrypt(Nonce::from_slice(&iv), sealed.as_ref()).ok()?;
        String::from_utf8(plaintext).ok()
    }
}
