use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use caixa::config::{DocumentStoreSettings, StorageSettings};
use caixa::{BackendSelector, LedgerRepository};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

fn file_store(dir: &Path) -> StorageSettings {
    StorageSettings {
        data_dir: dir.to_path_buf(),
        collection: "transactions".to_string(),
        document_store: DocumentStoreSettings::disabled("transactions"),
    }
}

async fn spawn(settings: StorageSettings) -> Result<String> {
    let selector = Arc::new(BackendSelector::new(settings));
    let ledger = Arc::new(LedgerRepository::new(selector));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, caixa_server::router(ledger))
            .await
            .ok();
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn transaction_lifecycle_over_http() -> Result<()> {
    let dir = TempDir::new()?;
    let base = spawn(file_store(dir.path())).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/transactions"))
        .json(&json!({
            "tipo": "pagar",
            "vencimento": "05/03/2024",
            "valor": "1.234,56",
            "descricao": "Aluguel",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await?;
    assert_eq!(created["type"], "saida");
    assert_eq!(created["date"], "2024-03-05");
    assert_eq!(created["amount"], 1234.56);
    assert_eq!(created["status"], "Pendente");
    let id = created["id"].as_str().unwrap().to_string();

    let fetched: Value = client
        .get(format!("{base}/transactions/{id}"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched, created);

    let response = client
        .patch(format!("{base}/transactions/{id}"))
        .json(&json!({ "status": "pago" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["status"], "Pago");
    assert_eq!(updated["amount"], 1234.56);
    assert_eq!(updated["notes"], "Aluguel");

    let response = client
        .put(format!("{base}/transactions/{id}"))
        .json(&json!({ "valor": 10 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["amount"], 10.0);
    assert_eq!(updated["status"], "Pago");

    let response = client
        .delete(format!("{base}/transactions/{id}"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .delete(format!("{base}/transactions/{id}"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert!(body["error"].is_string());

    let response = client
        .get(format!("{base}/transactions/{id}"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn invalid_payloads_are_rejected_with_field() -> Result<()> {
    let dir = TempDir::new()?;
    let base = spawn(file_store(dir.path())).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/transactions"))
        .json(&json!({ "amount": 10 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["field"], "date");

    let response = client
        .post(format!("{base}/transactions"))
        .json(&json!({ "date": "2024-03-05", "amount": "dez reais" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["field"], "amount");

    let response = client
        .post(format!("{base}/transactions"))
        .json(&json!([1, 2, 3]))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["field"], "body");

    let response = client
        .get(format!("{base}/transactions?month=2024-13"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["field"], "month");

    Ok(())
}

#[tokio::test]
async fn payable_and_receivable_routes_scope_by_type() -> Result<()> {
    let dir = TempDir::new()?;
    let base = spawn(file_store(dir.path())).await?;
    let client = reqwest::Client::new();

    let payable: Value = client
        .post(format!("{base}/contas-pagar"))
        .json(&json!({ "dueDate": "2024-03-10", "valor": 300, "status": "em aberto" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(payable["type"], "saida");

    let receivable: Value = client
        .post(format!("{base}/contas-receber"))
        .json(&json!({ "data": "2024-03-12", "valor": 500, "status": "recebido" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(receivable["type"], "entrada");
    assert_eq!(receivable["status"], "Pago");

    let listed: Vec<Value> = client
        .get(format!("{base}/contas-pagar"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], payable["id"]);

    let all: Vec<Value> = client
        .get(format!("{base}/transactions?month=2024-03"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["id"], receivable["id"]);

    let summary: Value = client
        .get(format!("{base}/contas-receber/summary"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(summary["count"], 1);
    assert_eq!(summary["total"], 500.0);
    assert_eq!(summary["settled"], 500.0);
    assert_eq!(summary["open"], 0.0);

    Ok(())
}

#[tokio::test]
async fn unreachable_document_store_serves_from_file() -> Result<()> {
    let dir = TempDir::new()?;
    let settings = StorageSettings {
        document_store: DocumentStoreSettings {
            enabled: true,
            project_id: Some("acme".to_string()),
            base_url: "http://127.0.0.1:1".to_string(),
            access_token: Some("token".to_string().into()),
            request_timeout: Duration::from_secs(2),
            ..DocumentStoreSettings::disabled("transactions")
        },
        ..file_store(dir.path())
    };
    let base = spawn(settings).await?;
    let client = reqwest::Client::new();

    let health: Value = client.get(format!("{base}/health")).send().await?.json().await?;
    assert_eq!(health, json!({ "status": "ok", "backend": "json_file" }));

    let response = client
        .post(format!("{base}/transactions"))
        .json(&json!({ "date": "2024-03-05", "amount": -25 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await?;
    assert_eq!(created["type"], "saida");
    assert_eq!(created["amount"], 25.0);

    let listed: Vec<Value> = client
        .get(format!("{base}/transactions"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed, vec![created]);
    assert!(dir.path().join("transactions.json").exists());

    Ok(())
}
