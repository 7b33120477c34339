// In-memory store implementations for tests and simulation. Inspection
// helpers expose copies of the underlying rows so tests can assert on
// what was persisted.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::audit::{AccessLogEntry, ErrorLogEntry};
use crate::data_structures::IdentityRecord;
use crate::proof::types::NonceLedgerEntry;
use crate::storage::{
    AccessLog, ErrorLog, IdentityStore, NonceLedger, NonceLedgerError, StorageError, VaultStore,
};
use crate::vault::types::LivingRecordEntry;

#[derive(Default)]
pub struct InMemoryIdentityStore {
    records: Mutex<Vec<IdentityRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&self, record: IdentityRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_vitalized(
        &self,
        device_id: &str,
        key_id: &str,
    ) -> Result<Option<IdentityRecord>, StorageError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .find(|r| r.device_id == device_id && r.key_id == key_id && r.is_vitalized())
            .cloned())
    }

    async fn get(&self, id: &str) -> Result<Option<IdentityRecord>, StorageError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}

#[derive(Default)]
struct LedgerInner {
    entries: Vec<NonceLedgerEntry>,
    consumed: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryNonceLedger {
    inner: Mutex<LedgerInner>,
}

impl InMemoryNonceLedger {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn entries(&self) -> Vec<NonceLedgerEntry> {
        self.inner.lock().unwrap().entries.clone()
    }
}

#[async_trait]
impl NonceLedger for InMemoryNonceLedger {
    async fn append(&self, entry: NonceLedgerEntry) -> Result<(), NonceLedgerError> {
        // Check and insert under one lock, so two concurrent submissions
        // of the same nonce cannot both pass.
        let mut inner = self.inner.lock().unwrap();
        if !inner.consumed.insert(entry.nonce.clone()) {
            return Err(NonceLedgerError::DuplicateNonce);
        }
        inner.entries.push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAccessLog {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl InMemoryAccessLog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessLog for InMemoryAccessLog {
    async fn append(&self, entry: AccessLogEntry) -> Result<(), StorageError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryErrorLog {
    entries: Mutex<Vec<(String, ErrorLogEntry)>>,
}

impl InMemoryErrorLog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn entries(&self) -> Vec<(String, ErrorLogEntry)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<ErrorLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, entry)| entry.clone())
    }
}

#[async_trait]
impl ErrorLog for InMemoryErrorLog {
    async fn append(&self, entry: ErrorLogEntry) -> Result<String, StorageError> {
        let mut entries = self.entries.lock().unwrap();
        let id = format!("errlog-{}", entries.len() + 1);
        entries.push((id.clone(), entry));
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryVaultStore {
    rows: Mutex<HashMap<String, LivingRecordEntry>>,
}

impl InMemoryVaultStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn row(&self, subject_id: &str) -> Option<LivingRecordEntry> {
        self.rows.lock().unwrap().get(subject_id).cloned()
    }
}

#[async_trait]
impl VaultStore for InMemoryVaultStore {
    async fn load(&self, subject_id: &str) -> Result<Option<LivingRecordEntry>, StorageError> {
        Ok(self.rows.lock().unwrap().get(subject_id).cloned())
    }

    async fn save(&self, entry: LivingRecordEntry) -> Result<(), StorageError> {
        self.rows.lock().unwrap().insert(entry.subject_id.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::VitalizationStatus;
    use crate::test_utils::create_test_identity;
    use std::sync::Arc;

    fn ledger_entry(nonce: &str) -> NonceLedgerEntry {
        NonceLedgerEntry {
            identity_id: "citizen-1".to_string(),
            nonce: nonce.to_string(),
            payload_hash: "hash".to_string(),
            liveness_score: 1.0,
            nation: None,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn nonce_ledger_rejects_second_append() {
        let ledger = InMemoryNonceLedger::new();
        ledger.append(ledger_entry("n-1")).await.unwrap();
        let err = ledger.append(ledger_entry("n-1")).await.unwrap_err();
        assert!(matches!(err, NonceLedgerError::DuplicateNonce));
        assert_eq!(ledger.entries().len(), 1);
        // Different nonce still goes through
        ledger.append(ledger_entry("n-2")).await.unwrap();
        assert_eq!(ledger.entries().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_same_nonce_appends_admit_exactly_one() {
        let ledger = Arc::new(InMemoryNonceLedger::new());
        let (a, b) = tokio::join!(
            ledger.append(ledger_entry("race")),
            ledger.append(ledger_entry("race")),
        );
        assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn identity_lookup_filters_to_vitalized() {
        let store = InMemoryIdentityStore::new();
        let (vitalized, _) = create_test_identity(1, "device-a", "key-a");
        let (mut suspended, _) = create_test_identity(2, "device-b", "key-b");
        suspended.vitalization = VitalizationStatus::Suspended;
        store.register(vitalized.clone());
        store.register(suspended.clone());

        let found = store.find_vitalized("device-a", "key-a").await.unwrap();
        assert_eq!(found, Some(vitalized));
        assert!(store.find_vitalized("device-b", "key-b").await.unwrap().is_none());

        // get() ignores the lifecycle filter
        assert_eq!(store.get(&suspended.id).await.unwrap(), Some(suspended));
        assert!(store.get("citizen-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_log_assigns_retrievable_ids() {
        use crate::handshake::types::HandshakePhase;
        use std::time::Duration;

        let log = InMemoryErrorLog::new();
        let entry = ErrorLogEntry {
            session_id: "s1".to_string(),
            identity_id: None,
            device_info: None,
            code: "COHESION_TIMEOUT".to_string(),
            phase: HandshakePhase::Phase4Cohesion,
            hardware_error: false,
            sensor_details: None,
            elapsed: Duration::from_millis(1_800),
            at_ms: 1,
        };
        let id1 = log.append(entry.clone()).await.unwrap();
        let id2 = log.append(entry.clone()).await.unwrap();
        assert_ne!(id1, id2);
        assert_eq!(log.get(&id1), Some(entry));
        assert!(log.get("errlog-999").is_none());
    }
}
