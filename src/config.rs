use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const ENV_USE_DOCUMENT_STORE: &str = "CAIXA_USE_DOCUMENT_STORE";
const ENV_PROJECT_ID: &str = "CAIXA_DOCSTORE_PROJECT_ID";
const ENV_DATABASE: &str = "CAIXA_DOCSTORE_DATABASE";
const ENV_BASE_URL: &str = "CAIXA_DOCSTORE_BASE_URL";
const ENV_ACCESS_TOKEN: &str = "CAIXA_DOCSTORE_ACCESS_TOKEN";
const ENV_DATA_DIR: &str = "CAIXA_DATA_DIR";

fn default_collection() -> String {
    "transactions".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Document-store (Firestore REST) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreConfig {
    /// Attempt the document store at all. When false the JSON file store is
    /// used without trying.
    pub enabled: bool,

    pub project_id: Option<String>,

    #[serde(default = "default_database")]
    pub database: String,

    /// API root; point it at an emulator for local runs.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// File holding a bearer token. Relative paths resolve from the config
    /// file's directory. `CAIXA_DOCSTORE_ACCESS_TOKEN` takes precedence.
    pub access_token_file: Option<PathBuf>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: None,
            database: default_database(),
            base_url: default_base_url(),
            access_token_file: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Application configuration as written in `caixa.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the JSON file store. If relative, resolved from the config
    /// file location; if unset, the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Collection (document store) and file stem (JSON store) for the ledger.
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub document_store: DocumentStoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            collection: default_collection(),
            document_store: DocumentStoreConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_USE_DOCUMENT_STORE) {
            self.document_store.enabled = parse_bool(&raw)
                .with_context(|| format!("Invalid {ENV_USE_DOCUMENT_STORE} value: {raw:?}"))?;
        }
        if let Some(project) = lookup(ENV_PROJECT_ID) {
            self.document_store.project_id = Some(project);
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.document_store.database = database;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.document_store.base_url = base_url;
        }
        if let Some(data_dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(data_dir));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Document-store settings with credentials attached.
#[derive(Debug)]
pub struct DocumentStoreSettings {
    pub enabled: bool,
    pub project_id: Option<String>,
    pub database: String,
    pub base_url: String,
    pub collection: String,
    pub access_token: Option<SecretString>,
    pub access_token_file: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl DocumentStoreSettings {
    /// Settings that never attempt the document store.
    pub fn disabled(collection: impl Into<String>) -> Self {
        let defaults = DocumentStoreConfig::default();
        Self {
            enabled: false,
            project_id: None,
            database: defaults.database,
            base_url: defaults.base_url,
            collection: collection.into(),
            access_token: None,
            access_token_file: None,
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
        }
    }
}

/// Storage settings consumed by the backend selector.
#[derive(Debug)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub collection: String,
    pub document_store: DocumentStoreSettings,
}

/// Loaded configuration with resolved paths and environment applied.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub config_path: PathBuf,
    pub storage: StorageSettings,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./caixa.toml` if it exists in current directory
/// 2. `~/.local/share/caixa/caixa.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("caixa.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("caixa").join("caixa.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load the config file if present, apply process environment overrides
    /// and resolve paths relative to the config file's directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        let mut config = Config::load_or_default(&config_path)?;
        config.apply_env(&lookup)?;

        let data_dir = config.resolve_data_dir(&config_dir);
        let doc = config.document_store;
        let access_token_file = doc.access_token_file.map(|path| {
            if path.is_absolute() {
                path
            } else {
                config_dir.join(path)
            }
        });

        Ok(Self {
            config_path,
            storage: StorageSettings {
                data_dir,
                collection: config.collection.clone(),
                document_store: DocumentStoreSettings {
                    enabled: doc.enabled,
                    project_id: doc.project_id.filter(|p| !p.trim().is_empty()),
                    database: doc.database,
                    base_url: doc.base_url,
                    collection: config.collection,
                    access_token: lookup(ENV_ACCESS_TOKEN)
                        .filter(|t| !t.trim().is_empty())
                        .map(SecretString::from),
                    access_token_file,
                    request_timeout: Duration::from_secs(doc.request_timeout_secs.max(1)),
                },
            },
        })
    }
}
