//! In-memory storage for tests and embedding.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::models::{
    Id, IdGenerator, TransactionDraft, TransactionPatch, TransactionRecord, UuidIdGenerator,
};

use super::{BackendKind, LedgerStorage};

/// Keeps records in a map for the lifetime of the process.
pub struct MemoryStorage {
    records: Mutex<HashMap<Id, TransactionRecord>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_generators(Arc::new(UuidIdGenerator), Arc::new(SystemClock))
    }

    pub fn with_generators(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ids,
            clock,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerStorage for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn create(&self, draft: TransactionDraft) -> Result<TransactionRecord> {
        let mut records = self.records.lock().await;
        let mut id = self.ids.new_id();
        while records.contains_key(&id) {
            id = self.ids.new_id();
        }
        let record = draft.into_record(id, self.clock.now());
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &Id) -> Result<Option<TransactionRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<TransactionRecord>> {
        let records = self.records.lock().await;
        Ok(records.values().cloned().collect())
    }

    async fn update(&self, id: &Id, patch: &TransactionPatch) -> Result<Option<TransactionRecord>> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        record.apply(patch, self.clock.now());
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        let mut records = self.records.lock().await;
        Ok(records.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{FixedIdGenerator, TransactionStatus, TransactionType};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[tokio::test]
    async fn memory_storage_assigns_ids_and_timestamps() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap();
        let storage = MemoryStorage::with_generators(
            Arc::new(FixedIdGenerator::new([Id::from("tx-1")])),
            Arc::new(FixedClock::new(now)),
        );

        let draft = TransactionDraft::new(
            TransactionType::Entrada,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            50.0,
        );
        let created = storage.create(draft).await?;
        assert_eq!(created.id.as_str(), "tx-1");
        assert_eq!(created.created_at, now);
        assert_eq!(storage.get(&created.id).await?, Some(created.clone()));

        let patch = TransactionPatch {
            status: Some(TransactionStatus::Pago),
            ..TransactionPatch::default()
        };
        let updated = storage.update(&created.id, &patch).await?.unwrap();
        assert_eq!(updated.status, TransactionStatus::Pago);

        assert!(storage.delete(&created.id).await?);
        assert!(!storage.delete(&created.id).await?);
        assert_eq!(storage.update(&created.id, &patch).await?, None);

        Ok(())
    }
}
