//! REST surface over [`LedgerRepository`].
//!
//! `/transactions` serves every entry. `/contas-pagar` and `/contas-receber`
//! serve the same collection scoped to `saida` and `entrada`: listings are
//! restricted to that type and creates default to it.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use caixa::models::{Id, TransactionRecord, TransactionType};
use caixa::normalize::Field;
use caixa::{LedgerError, LedgerRepository, LedgerSummary, ListQuery, RawInput};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Per-collection handler state.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<LedgerRepository>,
    scope: Option<TransactionType>,
}

pub fn router(ledger: Arc<LedgerRepository>) -> Router {
    let diagnostics = Router::new()
        .route("/health", get(health))
        .with_state(ledger.clone());

    Router::new()
        .merge(diagnostics)
        .merge(collection("/transactions", ledger.clone(), None))
        .merge(collection(
            "/contas-pagar",
            ledger.clone(),
            Some(TransactionType::Saida),
        ))
        .merge(collection(
            "/contas-receber",
            ledger,
            Some(TransactionType::Entrada),
        ))
        .layer(TraceLayer::new_for_http())
}

fn collection(
    prefix: &str,
    ledger: Arc<LedgerRepository>,
    scope: Option<TransactionType>,
) -> Router {
    Router::new()
        .route(prefix, get(list_transactions).post(create_transaction))
        .route(&format!("{prefix}/summary"), get(summarize_transactions))
        .route(
            &format!("{prefix}/{{id}}"),
            get(get_transaction)
                .put(update_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        .with_state(AppState { ledger, scope })
}

/// Error body: `{"error": "..."}`, plus `field` for validation failures.
#[derive(Debug)]
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LedgerError::validation("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(LedgerError::validation("query", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            LedgerError::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.0.to_string(), "field": field }),
            ),
            LedgerError::NotFound(_) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.0.to_string() }))
            }
            // Already logged with full context by the repository.
            LedgerError::Backend(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal storage error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: Option<caixa::BackendKind>,
}

async fn health(State(ledger): State<Arc<LedgerRepository>>) -> impl IntoResponse {
    match ledger.backend_kind().await {
        Ok(kind) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                backend: Some(kind),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                backend: None,
            }),
        ),
    }
}

fn scoped_query(state: &AppState, query: ListQuery) -> ListQuery {
    match state.scope {
        Some(kind) => query.with_kind(kind),
        None => query,
    }
}

async fn list_transactions(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<TransactionRecord>>> {
    let Query(query) = query?;
    let records = state
        .ledger
        .list_transactions(&scoped_query(&state, query))
        .await?;
    Ok(Json(records))
}

async fn summarize_transactions(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<LedgerSummary>> {
    let Query(query) = query?;
    let summary = state
        .ledger
        .summarize_transactions(&scoped_query(&state, query))
        .await?;
    Ok(Json(summary))
}

async fn create_transaction(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransactionRecord>)> {
    let Json(body) = body?;
    let mut payload = RawInput::from_value(body)?;
    if let Some(kind) = state.scope {
        let type_keys = state.ledger.normalizer().aliases(Field::Type);
        if payload.first_present(type_keys).is_none() {
            payload.insert("type", kind.as_str());
        }
    }
    let record = state.ledger.create_transaction(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionRecord>> {
    let record = state.ledger.get_transaction(&Id::from(id)).await?;
    Ok(Json(record))
}

async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TransactionRecord>> {
    let Json(body) = body?;
    let payload = RawInput::from_value(body)?;
    let record = state
        .ledger
        .update_transaction(&Id::from(id), payload)
        .await?;
    Ok(Json(record))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = Id::from(id);
    state.ledger.delete_transaction(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}
