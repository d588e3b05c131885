mod document;
mod firestore_value;
mod json_file;
mod memory;
mod selector;

pub use document::DocumentStorage;
pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use selector::BackendSelector;

use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::models::{Id, TransactionDraft, TransactionPatch, TransactionRecord};

/// Physical store behind the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    DocumentStore,
    JsonFile,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentStore => "document_store",
            Self::JsonFile => "json_file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform CRUD over canonical records.
///
/// Implementations assign ids and timestamps themselves; filtering and
/// ordering belong to the caller so every backend stays a plain collection.
#[async_trait::async_trait]
pub trait LedgerStorage: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn create(&self, draft: TransactionDraft) -> Result<TransactionRecord>;
    async fn get(&self, id: &Id) -> Result<Option<TransactionRecord>>;
    async fn list(&self) -> Result<Vec<TransactionRecord>>;
    /// Returns `None` when no record has this id.
    async fn update(&self, id: &Id, patch: &TransactionPatch) -> Result<Option<TransactionRecord>>;
    /// Returns `false` when no record has this id.
    async fn delete(&self, id: &Id) -> Result<bool>;
}
