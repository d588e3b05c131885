//! The ledger operations clients call.
//!
//! Payloads are normalized here, the active store is resolved through the
//! [`BackendSelector`], and listing/filtering/sorting happens in memory over
//! the full collection.

mod filter;
mod summary;

pub use filter::{newest_first, ListQuery, QueryFilter};
pub use summary::LedgerSummary;

use std::sync::Arc;

use tracing::{debug, error};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};
use crate::models::{Id, TransactionRecord};
use crate::normalize::{FieldNormalizer, RawInput};
use crate::storage::{BackendKind, BackendSelector, LedgerStorage};

pub struct LedgerRepository {
    selector: Arc<BackendSelector>,
    normalizer: FieldNormalizer,
    clock: Arc<dyn Clock>,
}

impl LedgerRepository {
    pub fn new(selector: Arc<BackendSelector>) -> Self {
        Self::with_clock(selector, Arc::new(SystemClock))
    }

    pub fn with_clock(selector: Arc<BackendSelector>, clock: Arc<dyn Clock>) -> Self {
        Self {
            selector,
            normalizer: FieldNormalizer::new(),
            clock,
        }
    }

    pub fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    /// Resolve the active store now instead of on first use.
    pub async fn backend_kind(&self) -> Result<BackendKind> {
        Ok(self.storage("resolve").await?.kind())
    }

    pub async fn create_transaction(&self, payload: RawInput) -> Result<TransactionRecord> {
        let draft = self.normalizer.normalize(&payload)?;
        let storage = self.storage("create").await?;
        let record = storage
            .create(draft)
            .await
            .map_err(|e| backend_failure("create", e))?;
        debug!(id = %record.id, backend = %storage.kind(), "Created transaction");
        Ok(record)
    }

    pub async fn get_transaction(&self, id: &Id) -> Result<TransactionRecord> {
        let id = checked(id)?;
        self.storage("get")
            .await?
            .get(&id)
            .await
            .map_err(|e| backend_failure("get", e))?
            .ok_or(LedgerError::NotFound(id))
    }

    /// Overwrite only the fields present in `payload`.
    pub async fn update_transaction(
        &self,
        id: &Id,
        payload: RawInput,
    ) -> Result<TransactionRecord> {
        let id = checked(id)?;
        let patch = self.normalizer.normalize_patch(&payload)?;
        let storage = self.storage("update").await?;
        let record = storage
            .update(&id, &patch)
            .await
            .map_err(|e| backend_failure("update", e))?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        debug!(id = %record.id, "Updated transaction");
        Ok(record)
    }

    /// Deleting an id that is not there reports `NotFound`, also on repeats.
    pub async fn delete_transaction(&self, id: &Id) -> Result<()> {
        let id = checked(id)?;
        let deleted = self
            .storage("delete")
            .await?
            .delete(&id)
            .await
            .map_err(|e| backend_failure("delete", e))?;
        if !deleted {
            return Err(LedgerError::NotFound(id));
        }
        debug!(id = %id, "Deleted transaction");
        Ok(())
    }

    pub async fn list_transactions(&self, query: &ListQuery) -> Result<Vec<TransactionRecord>> {
        let filter = QueryFilter::from_query(query)?;
        self.list_filtered(&filter).await
    }

    pub async fn list_filtered(&self, filter: &QueryFilter) -> Result<Vec<TransactionRecord>> {
        let records = self
            .storage("list")
            .await?
            .list()
            .await
            .map_err(|e| backend_failure("list", e))?;
        Ok(filter.apply(records))
    }

    pub async fn summarize_transactions(&self, query: &ListQuery) -> Result<LedgerSummary> {
        let records = self.list_transactions(query).await?;
        Ok(LedgerSummary::from_records(&records, self.clock.today()))
    }

    async fn storage(&self, operation: &'static str) -> Result<Arc<dyn LedgerStorage>> {
        self.selector
            .resolve()
            .await
            .map_err(|e| backend_failure(operation, e))
    }
}

/// Ids end up in file entries and document paths, so reject anything that
/// is not a single clean segment before touching storage.
fn checked(id: &Id) -> Result<Id> {
    Ok(Id::parse(id.as_str())?)
}

fn backend_failure(operation: &'static str, err: anyhow::Error) -> LedgerError {
    error!(
        operation = operation,
        error = %format!("{err:#}"),
        "Ledger storage operation failed"
    );
    LedgerError::Backend(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{FixedIdGenerator, TransactionStatus, TransactionType};
    use crate::storage::MemoryStorage;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn repository() -> LedgerRepository {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        ));
        let storage = MemoryStorage::with_generators(
            Arc::new(FixedIdGenerator::new(["a", "b", "c"].map(Id::from))),
            clock.clone(),
        );
        LedgerRepository::with_clock(
            Arc::new(BackendSelector::preresolved(Arc::new(storage))),
            clock,
        )
    }

    fn payload(value: serde_json::Value) -> RawInput {
        RawInput::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_same_record() {
        let repo = repository();
        let created = repo
            .create_transaction(payload(json!({
                "tipo": "pagar",
                "vencimento": "05/03/2024",
                "valor": "1.234,56",
                "categoria": "Fornecedores",
            })))
            .await
            .unwrap();

        assert_eq!(created.kind, TransactionType::Saida);
        assert_eq!(created.amount, 1234.56);
        assert_eq!(repo.get_transaction(&created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let repo = repository();
        let missing = Id::from("nope");

        let err = repo
            .update_transaction(&missing, payload(json!({"amount": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = repo.delete_transaction(&missing).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_validates_before_touching_storage() {
        let repo = repository();
        let created = repo
            .create_transaction(payload(json!({"date": "2024-03-01", "amount": 10})))
            .await
            .unwrap();

        let err = repo
            .update_transaction(&created.id, payload(json!({"date": "not a date"})))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "date", .. }));
        assert_eq!(repo.get_transaction(&created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn repeated_delete_is_not_found() {
        let repo = repository();
        let created = repo
            .create_transaction(payload(json!({"date": "2024-03-01", "amount": 10})))
            .await
            .unwrap();

        repo.delete_transaction(&created.id).await.unwrap();
        let err = repo.delete_transaction(&created.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let repo = repository();
        let err = repo.get_transaction(&Id::from("../etc")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "id", .. }));
    }

    #[tokio::test]
    async fn summary_uses_clock_for_overdue() {
        let repo = repository();
        let entries = [
            ("2024-03-01", "Pendente"),
            ("2024-03-30", "Pendente"),
            ("2024-03-02", "Pago"),
        ];
        for (date, status) in entries {
            repo.create_transaction(payload(json!({
                "type": "saida",
                "date": date,
                "amount": 10,
                "status": status,
            })))
            .await
            .unwrap();
        }

        let summary = repo
            .summarize_transactions(&ListQuery::default())
            .await
            .unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, 30.0);
        assert_eq!(summary.settled, 10.0);
        assert_eq!(summary.overdue, 1);

        let listed = repo.list_transactions(&ListQuery::default()).await.unwrap();
        assert_eq!(
            listed.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ]
        );
        assert!(listed.iter().any(|r| r.status == TransactionStatus::Pago));
    }
}
