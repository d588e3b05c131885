#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use caixa::clock::{Clock, FixedClock, SteppingClock};
use caixa::config::{DocumentStoreSettings, StorageSettings};
use caixa::models::{FixedIdGenerator, Id, IdGenerator};
use caixa::normalize::RawInput;
use caixa::{BackendSelector, LedgerRepository};
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(start_time()))
}

/// A clock one second further along on every reading.
pub fn stepping_clock() -> Arc<dyn Clock> {
    Arc::new(SteppingClock::new(start_time(), chrono::Duration::seconds(1)))
}

pub fn ids(values: &[&str]) -> Arc<dyn IdGenerator> {
    Arc::new(FixedIdGenerator::new(values.iter().map(|v| Id::from(*v))))
}

pub fn payload(value: serde_json::Value) -> RawInput {
    RawInput::from_value(value).expect("test payload must be an object")
}

pub fn file_settings(dir: &Path) -> StorageSettings {
    StorageSettings {
        data_dir: dir.to_path_buf(),
        collection: "transactions".to_string(),
        document_store: DocumentStoreSettings::disabled("transactions"),
    }
}

/// Document store settings pointing at a mock server.
pub fn document_store_settings(base_url: &str) -> DocumentStoreSettings {
    DocumentStoreSettings {
        enabled: true,
        project_id: Some("acme".to_string()),
        database: "main".to_string(),
        base_url: base_url.to_string(),
        access_token: Some(SecretString::from("test-token".to_string())),
        request_timeout: Duration::from_secs(5),
        ..DocumentStoreSettings::disabled("transactions")
    }
}

pub fn repository(settings: StorageSettings, ids: Arc<dyn IdGenerator>) -> LedgerRepository {
    let clock = stepping_clock();
    let selector = BackendSelector::with_generators(settings, ids, clock.clone());
    LedgerRepository::with_clock(Arc::new(selector), clock)
}

pub const COLLECTION_PATH: &str = "/projects/acme/databases/main/documents/transactions";

pub fn document_name(id: &str) -> String {
    format!("projects/acme/databases/main/documents/transactions/{id}")
}
