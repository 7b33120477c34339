// presence-protocol/src/credential.rs
//
// Short-lived stateless session credentials. A token is
// base64(claims-json) "." base64(signature); nothing is persisted
// server-side, so possession of a token with a live expiry and a valid
// signature is the whole session.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::current_epoch_millis;
use crate::crypto::{self, SecretKey};
use crate::data_structures::CitizenId;

// Claims carried inside a bearer token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub subject_id: CitizenId,
    pub public_identifier: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

// Deliberately opaque: expiry, bad signature, malformed token and
// garbled claims all collapse to this one failure, so the credential
// surface gives an attacker no oracle.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("credential invalid")]
pub struct CredentialInvalid;

pub struct IssuedCredential {
    pub token: String,
    pub claims: SessionCredential,
}

pub struct CredentialIssuer {
    signing_key: SecretKey,
    ttl_ms: u64,
}

impl CredentialIssuer {
    pub fn new(signing_key: SecretKey, ttl_ms: u64) -> Self {
        CredentialIssuer { signing_key, ttl_ms }
    }

    /// Mints a credential for a verified subject.
    pub fn issue(&self, subject_id: &str, public_identifier: &str) -> IssuedCredential {
        let issued_at = current_epoch_millis();
        let claims = SessionCredential {
            subject_id: subject_id.to_string(),
            public_identifier: public_identifier.to_string(),
            issued_at,
            expires_at: issued_at + self.ttl_ms as i64,
        };
        let claims_json = serde_json::to_string(&claims).expect("credential claims serialize");
        let signature = crypto::sign(claims_json.as_bytes(), &self.signing_key);
        let token = format!(
            "{}.{}",
            BASE64.encode(claims_json.as_bytes()),
            crypto::encode_signature(&signature)
        );
        debug!("[Credential] issued for {} until {}", public_identifier, claims.expires_at);
        IssuedCredential { token, claims }
    }

    /// Checks a bearer token and returns its claims if, and only if,
    /// the signature holds and the expiry has not passed.
    pub fn verify(&self, token: &str) -> Result<SessionCredential, CredentialInvalid> {
        self.verify_at(token, current_epoch_millis())
    }

    fn verify_at(&self, token: &str, now_ms: i64) -> Result<SessionCredential, CredentialInvalid> {
        let (claims_b64, signature_b64) = token.split_once('.').ok_or(CredentialInvalid)?;
        let claims_bytes = BASE64.decode(claims_b64).map_err(|_| CredentialInvalid)?;
        let signature = crypto::decode_signature(signature_b64).map_err(|_| CredentialInvalid)?;
        if !crypto::verify(&claims_bytes, &signature, &self.signing_key.verifying_key()) {
            return Err(CredentialInvalid);
        }
        let claims: SessionCredential =
            serde_json::from_slice(&claims_bytes).map_err(|_| CredentialInvalid)?;
        if now_ms >= claims.expires_at {
            return Err(CredentialInvalid);
        }
        Ok(claims)
    }
}
