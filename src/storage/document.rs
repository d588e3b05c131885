//! Document-store backend speaking the Firestore REST v1 API.
//!
//! One document per record in a flat collection. Document names are the
//! record ids; the `id` field itself is not stored in the document body.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::DocumentStoreSettings;
use crate::models::{
    adopt_legacy_keys, Id, IdGenerator, TransactionDraft, TransactionPatch, TransactionRecord,
};

use super::firestore_value::{decode_fields, encode_fields};
use super::{BackendKind, LedgerStorage};

const LIST_PAGE_SIZE: &str = "300";

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

pub struct DocumentStorage {
    client: Client,
    collection_url: String,
    access_token: SecretString,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl DocumentStorage {
    /// Build a client from settings and verify the collection is reachable.
    ///
    /// Any failure here (missing credentials, unreachable service, rejected
    /// token) is an initialization failure.
    pub async fn connect(
        settings: &DocumentStoreSettings,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let project_id = settings
            .project_id
            .as_deref()
            .context("Document store project id is not configured")?;
        let access_token = resolve_access_token(settings).await?;

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let collection_url = format!(
            "{}/projects/{}/databases/{}/documents/{}",
            settings.base_url.trim_end_matches('/'),
            urlencoding::encode(project_id),
            settings.database,
            urlencoding::encode(&settings.collection),
        );

        let storage = Self {
            client,
            collection_url,
            access_token,
            ids,
            clock,
        };
        storage.probe().await?;
        Ok(storage)
    }

    async fn probe(&self) -> Result<()> {
        self.authorized(self.client.get(&self.collection_url))
            .query(&[("pageSize", "1")])
            .send()
            .await
            .context("Document store is unreachable")?
            .error_for_status()
            .context("Document store rejected the probe request")?;
        debug!(url = %self.collection_url, "Document store probe succeeded");
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.access_token.expose_secret())
    }

    fn document_url(&self, id: &Id) -> String {
        format!("{}/{}", self.collection_url, urlencoding::encode(id.as_str()))
    }

    fn to_document(record: &TransactionRecord) -> Result<Value> {
        let mut value = serde_json::to_value(record).context("Failed to serialize transaction")?;
        let fields = value
            .as_object_mut()
            .context("Transaction did not serialize to an object")?;
        fields.remove("id");
        Ok(json!({ "fields": encode_fields(fields) }))
    }

    fn from_document(document: &Document) -> Result<TransactionRecord> {
        let id = document
            .name
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .with_context(|| format!("Document name has no id: {}", document.name))?;
        let mut fields = decode_fields(&document.fields)?;
        fields.insert("id".to_string(), Value::String(id.to_string()));
        adopt_legacy_keys(&mut fields);
        serde_json::from_value(Value::Object(fields))
            .with_context(|| format!("Unreadable transaction document {}", document.name))
    }

    async fn read_document(response: Response) -> Result<TransactionRecord> {
        let document: Document = response
            .json()
            .await
            .context("Failed to decode document store response")?;
        Self::from_document(&document)
    }
}

/// Fields an update rewrites. Anything else already on the document is left
/// untouched.
const RECORD_FIELDS: [&str; 15] = [
    "type",
    "date",
    "amount",
    "category",
    "notes",
    "status",
    "payment_date",
    "payment_method",
    "interest_rate",
    "paid_amount",
    "action_id",
    "client_id",
    "material_id",
    "created_at",
    "updated_at",
];

async fn resolve_access_token(settings: &DocumentStoreSettings) -> Result<SecretString> {
    if let Some(token) = &settings.access_token {
        return Ok(token.clone());
    }
    let path = settings
        .access_token_file
        .as_ref()
        .context("Document store credentials are not configured")?;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read access token file {}", path.display()))?;
    let token = content.trim();
    if token.is_empty() {
        anyhow::bail!("Access token file {} is empty", path.display());
    }
    Ok(SecretString::from(token.to_string()))
}

#[async_trait::async_trait]
impl LedgerStorage for DocumentStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    async fn create(&self, draft: TransactionDraft) -> Result<TransactionRecord> {
        let record = draft.into_record(self.ids.new_id(), self.clock.now());
        let response = self
            .authorized(self.client.post(&self.collection_url))
            .query(&[("documentId", record.id.as_str())])
            .json(&Self::to_document(&record)?)
            .send()
            .await
            .context("Document store create request failed")?
            .error_for_status()
            .context("Document store refused to create the transaction")?;
        Self::read_document(response).await
    }

    async fn get(&self, id: &Id) -> Result<Option<TransactionRecord>> {
        let response = self
            .authorized(self.client.get(self.document_url(id)))
            .send()
            .await
            .context("Document store get request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .context("Document store refused to read the transaction")?;
        Self::read_document(response).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .authorized(self.client.get(&self.collection_url))
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListDocumentsResponse = request
                .send()
                .await
                .context("Document store list request failed")?
                .error_for_status()
                .context("Document store refused to list transactions")?
                .json()
                .await
                .context("Failed to decode document store listing")?;

            for document in &page.documents {
                match Self::from_document(document) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(
                        document = %document.name,
                        error = %format!("{e:#}"),
                        "Skipping unreadable transaction document"
                    ),
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    async fn update(&self, id: &Id, patch: &TransactionPatch) -> Result<Option<TransactionRecord>> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };
        record.apply(patch, self.clock.now());

        let mut query = vec![("currentDocument.exists", "true")];
        query.extend(RECORD_FIELDS.iter().map(|field| ("updateMask.fieldPaths", *field)));
        let response = self
            .authorized(self.client.patch(self.document_url(id)))
            .query(&query)
            .json(&Self::to_document(&record)?)
            .send()
            .await
            .context("Document store update request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .context("Document store refused to update the transaction")?;
        Self::read_document(response).await.map(Some)
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        let response = self
            .authorized(self.client.delete(self.document_url(id)))
            .query(&[("currentDocument.exists", "true")])
            .send()
            .await
            .context("Document store delete request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response
            .error_for_status()
            .context("Document store refused to delete the transaction")?;
        Ok(true)
    }
}
