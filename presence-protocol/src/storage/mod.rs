// Collaborator store interfaces consumed by the protocol core. The
// core never talks to a concrete backend directly; everything behind
// these traits can be swapped per deployment.

use async_trait::async_trait;
use thiserror::Error;

use crate::audit::{AccessLogEntry, ErrorLogEntry};
use crate::data_structures::IdentityRecord;
use crate::proof::types::NonceLedgerEntry;
use crate::vault::types::LivingRecordEntry;

pub mod memory;

pub use memory::{
    InMemoryAccessLog, InMemoryErrorLog, InMemoryIdentityStore, InMemoryNonceLedger,
    InMemoryVaultStore,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

// Identity registry reads used by the verifier and the gateway
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolves the vitalized identity enrolled for (device_id, key_id).
    /// Records in any other lifecycle state never resolve here.
    async fn find_vitalized(
        &self,
        device_id: &str,
        key_id: &str,
    ) -> Result<Option<IdentityRecord>, StorageError>;

    /// Fetches by primary id regardless of lifecycle state.
    async fn get(&self, id: &str) -> Result<Option<IdentityRecord>, StorageError>;
}

#[derive(Debug, Error)]
pub enum NonceLedgerError {
    #[error("nonce already consumed")]
    DuplicateNonce,
    #[error(transparent)]
    Backend(#[from] StorageError),
}

// Append-only nonce ledger. The uniqueness constraint on nonce lives
// here at the storage layer and is the sole replay-prevention
// mechanism; no in-process set shadows it.
#[async_trait]
pub trait NonceLedger: Send + Sync {
    async fn append(&self, entry: NonceLedgerEntry) -> Result<(), NonceLedgerError>;
}

// Append-only vault access audit
#[async_trait]
pub trait AccessLog: Send + Sync {
    async fn append(&self, entry: AccessLogEntry) -> Result<(), StorageError>;
}

// Append-only handshake error log
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Appends the entry and returns its assigned id.
    async fn append(&self, entry: ErrorLogEntry) -> Result<String, StorageError>;
}

// Encrypted living record rows, one per subject
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn load(&self, subject_id: &str) -> Result<Option<LivingRecordEntry>, StorageError>;
    async fn save(&self, entry: LivingRecordEntry) -> Result<(), StorageError>;
}
