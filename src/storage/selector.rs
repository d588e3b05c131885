use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StorageSettings;
use crate::models::{IdGenerator, UuidIdGenerator};

use super::{BackendKind, DocumentStorage, JsonFileStorage, LedgerStorage};

/// Decides once which store serves the ledger and hands out that store for
/// the rest of the process.
///
/// The document store is tried first when enabled. If it cannot be
/// initialized it is never tried again by this selector; the JSON file store
/// takes over. A selector whose fallback also fails keeps returning errors
/// (retrying only the file store) instead of picking a third tier.
pub struct BackendSelector {
    settings: Option<StorageSettings>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    active: OnceCell<Arc<dyn LedgerStorage>>,
    preferred_failed: AtomicBool,
    fallback_reason: OnceLock<String>,
}

impl BackendSelector {
    pub fn new(settings: StorageSettings) -> Self {
        Self::with_generators(settings, Arc::new(UuidIdGenerator), Arc::new(SystemClock))
    }

    pub fn with_generators(
        settings: StorageSettings,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: Some(settings),
            ids,
            clock,
            active: OnceCell::new(),
            preferred_failed: AtomicBool::new(false),
            fallback_reason: OnceLock::new(),
        }
    }

    /// A selector that always serves `storage`.
    pub fn preresolved(storage: Arc<dyn LedgerStorage>) -> Self {
        Self {
            settings: None,
            ids: Arc::new(UuidIdGenerator),
            clock: Arc::new(SystemClock),
            active: OnceCell::new_with(Some(storage)),
            preferred_failed: AtomicBool::new(false),
            fallback_reason: OnceLock::new(),
        }
    }

    /// The active store, initializing it on first use.
    pub async fn resolve(&self) -> Result<Arc<dyn LedgerStorage>> {
        self.active
            .get_or_try_init(|| self.initialize())
            .await
            .cloned()
    }

    /// Kind of the active store, if one has been resolved.
    pub fn active_kind(&self) -> Option<BackendKind> {
        self.active.get().map(|storage| storage.kind())
    }

    /// Why the document store was abandoned, if it was.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.get().map(String::as_str)
    }

    async fn initialize(&self) -> Result<Arc<dyn LedgerStorage>> {
        let settings = self
            .settings
            .as_ref()
            .context("Backend selector has no storage settings")?;

        if settings.document_store.enabled && !self.preferred_failed.load(Ordering::SeqCst) {
            match DocumentStorage::connect(
                &settings.document_store,
                self.ids.clone(),
                self.clock.clone(),
            )
            .await
            {
                Ok(storage) => {
                    info!(backend = %BackendKind::DocumentStore, "Ledger storage selected");
                    return Ok(Arc::new(storage));
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(
                        error = %reason,
                        data_dir = %settings.data_dir.display(),
                        "Document store unavailable; using JSON file store for this process"
                    );
                    self.preferred_failed.store(true, Ordering::SeqCst);
                    let _ = self.fallback_reason.set(reason);
                }
            }
        }

        let storage = JsonFileStorage::with_generators(
            &settings.data_dir,
            &settings.collection,
            self.ids.clone(),
            self.clock.clone(),
        );
        storage.ensure_writable().await.with_context(|| {
            format!(
                "JSON file store at {} is not usable",
                storage.path().display()
            )
        })?;
        info!(
            backend = %BackendKind::JsonFile,
            path = %storage.path().display(),
            "Ledger storage selected"
        );
        Ok(Arc::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentStoreSettings;
    use crate::storage::MemoryStorage;
    use secrecy::SecretString;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(data_dir: &Path, document_store: DocumentStoreSettings) -> StorageSettings {
        StorageSettings {
            data_dir: data_dir.to_path_buf(),
            collection: "transactions".to_string(),
            document_store,
        }
    }

    fn document_store(base_url: &str) -> DocumentStoreSettings {
        DocumentStoreSettings {
            enabled: true,
            project_id: Some("acme".to_string()),
            base_url: base_url.to_string(),
            access_token: Some(SecretString::from("token".to_string())),
            request_timeout: Duration::from_secs(5),
            ..DocumentStoreSettings::disabled("transactions")
        }
    }

    #[tokio::test]
    async fn disabled_document_store_goes_straight_to_file() -> Result<()> {
        let dir = TempDir::new()?;
        let selector = BackendSelector::new(settings(
            dir.path(),
            DocumentStoreSettings::disabled("transactions"),
        ));

        assert_eq!(selector.active_kind(), None);
        let storage = selector.resolve().await?;
        assert_eq!(storage.kind(), BackendKind::JsonFile);
        assert_eq!(selector.active_kind(), Some(BackendKind::JsonFile));
        assert_eq!(selector.fallback_reason(), None);
        assert!(dir.path().join("transactions.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_credentials_fall_back() -> Result<()> {
        let dir = TempDir::new()?;
        let doc = DocumentStoreSettings {
            enabled: true,
            ..DocumentStoreSettings::disabled("transactions")
        };
        let selector = BackendSelector::new(settings(dir.path(), doc));

        let storage = selector.resolve().await?;
        assert_eq!(storage.kind(), BackendKind::JsonFile);
        assert!(selector
            .fallback_reason()
            .is_some_and(|reason| reason.contains("project id")));
        Ok(())
    }

    #[tokio::test]
    async fn failed_probe_falls_back_once() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/documents/transactions$"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let selector = BackendSelector::new(settings(dir.path(), document_store(&server.uri())));

        let first = selector.resolve().await?;
        let second = selector.resolve().await?;
        assert_eq!(first.kind(), BackendKind::JsonFile);
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[tokio::test]
    async fn reachable_document_store_is_preferred() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/documents/transactions$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let selector = BackendSelector::new(settings(dir.path(), document_store(&server.uri())));

        assert_eq!(selector.resolve().await?.kind(), BackendKind::DocumentStore);
        assert!(!dir.path().join("transactions.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_fallback_fails_without_retrying_preferred() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "x")?;
        let selector = BackendSelector::new(settings(
            &blocker.join("data"),
            document_store(&server.uri()),
        ));

        assert!(selector.resolve().await.is_err());
        assert!(selector.resolve().await.is_err());
        assert_eq!(selector.active_kind(), None);
        assert!(selector.fallback_reason().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn preresolved_selector_serves_given_storage() -> Result<()> {
        let selector = BackendSelector::preresolved(Arc::new(MemoryStorage::new()));
        assert_eq!(selector.active_kind(), Some(BackendKind::Memory));
        assert_eq!(selector.resolve().await?.kind(), BackendKind::Memory);
        Ok(())
    }
}
