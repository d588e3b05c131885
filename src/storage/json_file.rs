use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::models::{
    adopt_legacy_keys, Id, IdGenerator, TransactionDraft, TransactionPatch, TransactionRecord,
    UuidIdGenerator,
};

use super::{BackendKind, LedgerStorage};

/// JSON file-based storage.
///
/// The whole collection is one JSON array:
/// ```text
/// data/
///   transactions.json
/// ```
///
/// Every mutation is a full read-modify-write, serialized by a process-local
/// mutex and published with a rename so readers never observe a half-written
/// file. Nothing coordinates separate processes sharing the same file.
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl JsonFileStorage {
    pub fn new(data_dir: impl AsRef<Path>, collection: &str) -> Self {
        Self::with_generators(
            data_dir,
            collection,
            Arc::new(UuidIdGenerator),
            Arc::new(SystemClock),
        )
    }

    pub fn with_generators(
        data_dir: impl AsRef<Path>,
        collection: &str,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{collection}.json")),
            write_lock: Mutex::new(()),
            ids,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Make sure the collection file exists and its directory accepts writes.
    pub async fn ensure_writable(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::metadata(&self.path).await {
            Ok(_) => {
                let probe = self.temp_path();
                fs::write(&probe, b"[]")
                    .await
                    .with_context(|| format!("Data directory is not writable: {}", probe.display()))?;
                fs::remove_file(&probe)
                    .await
                    .context("Failed to remove write probe")?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.write_entries(&[]).await,
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", self.path.display())),
        }
    }

    async fn read_entries(&self) -> Result<Vec<Value>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from {}", self.path.display()))?;
        match value {
            Value::Array(entries) => Ok(entries),
            _ => anyhow::bail!("Expected a JSON array in {}", self.path.display()),
        }
    }

    async fn write_entries(&self, entries: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(entries).context("Failed to serialize JSON")?;
        let temp = self.temp_path();
        fs::write(&temp, content)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn position(entries: &[Value], id: &Id) -> Option<usize> {
        entries
            .iter()
            .position(|entry| entry_id(entry).as_deref() == Some(id.as_str()))
    }
}

/// Stored ids may be strings or, in older files, numbers.
fn entry_id(entry: &Value) -> Option<String> {
    match entry.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode(entry: &Value) -> Result<TransactionRecord> {
    let mut entry = entry.clone();
    let id = entry_id(&entry);
    if let Some(obj) = entry.as_object_mut() {
        if let Some(id) = id {
            obj.insert("id".to_string(), Value::String(id));
        }
        adopt_legacy_keys(obj);
    }
    serde_json::from_value(entry).context("Unreadable transaction entry")
}

fn encode(record: &TransactionRecord) -> Result<Value> {
    serde_json::to_value(record).context("Failed to serialize transaction")
}

/// Overlay the canonical fields on the stored entry so keys this version does
/// not know about survive the rewrite.
fn merge_into(existing: &mut Value, record: Value) {
    match (existing.as_object_mut(), record) {
        (Some(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        (_, record) => *existing = record,
    }
}

#[async_trait::async_trait]
impl LedgerStorage for JsonFileStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::JsonFile
    }

    async fn create(&self, draft: TransactionDraft) -> Result<TransactionRecord> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;

        let mut id = self.ids.new_id();
        while Self::position(&entries, &id).is_some() {
            id = self.ids.new_id();
        }
        let record = draft.into_record(id, self.clock.now());
        entries.push(encode(&record)?);
        self.write_entries(&entries).await?;
        Ok(record)
    }

    async fn get(&self, id: &Id) -> Result<Option<TransactionRecord>> {
        let entries = self.read_entries().await?;
        match Self::position(&entries, id) {
            Some(idx) => decode(&entries[idx]).map(Some),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<TransactionRecord>> {
        let entries = self.read_entries().await?;
        let mut records = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            match decode(entry) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    index = idx,
                    error = %format!("{e:#}"),
                    "Skipping unreadable transaction entry"
                ),
            }
        }
        Ok(records)
    }

    async fn update(&self, id: &Id, patch: &TransactionPatch) -> Result<Option<TransactionRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        let Some(idx) = Self::position(&entries, id) else {
            return Ok(None);
        };

        let mut record =
            decode(&entries[idx]).with_context(|| format!("Cannot update transaction {id}"))?;
        record.apply(patch, self.clock.now());
        merge_into(&mut entries[idx], encode(&record)?);
        self.write_entries(&entries).await?;
        Ok(Some(record))
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|entry| entry_id(entry).as_deref() != Some(id.as_str()));
        if entries.len() == before {
            return Ok(false);
        }
        self.write_entries(&entries).await?;
        Ok(true)
    }
}
