// Vault module: encrypted living records gated on fresh presence

pub mod cipher;
pub mod record_vault;
pub mod types;

pub use cipher::{CipherFailure, FieldCipher, IV_LEN, KEY_LEN, TAG_LEN};
pub use record_vault::{LivingRecordVault, VaultFailure};
pub use types::{EncryptedField, LivingRecordEntry, VaultReadout, VaultUpsert};
