use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caixa::config::{default_config_path, ResolvedConfig};
use caixa::models::Id;
use caixa::{BackendSelector, LedgerRepository, ListQuery, RawInput};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "caixa")]
#[command(about = "Cash ledger with document-store and JSON-file storage")]
struct Cli {
    /// Path to config file (defaults to ./caixa.toml, then the user data dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show resolved configuration
    Config,
    /// Resolve storage and report which backend is active
    Backend,
    /// List transactions, newest first
    List(FilterArgs),
    /// Show one transaction
    Show { id: String },
    /// Create a transaction from a JSON object
    Add {
        /// e.g. '{"tipo": "pagar", "vencimento": "05/03/2024", "valor": "1.234,56"}'
        json: String,
    },
    /// Merge fields from a JSON object into a transaction
    Update { id: String, json: String },
    /// Delete a transaction
    Remove { id: String },
    /// Totals over the filtered transactions
    Summary(FilterArgs),
}

#[derive(Args)]
struct FilterArgs {
    /// entrada, saida, despesa (pagar/receber accepted)
    #[arg(long = "type")]
    kind: Option<String>,
    /// YYYY-MM
    #[arg(long)]
    month: Option<String>,
    /// YYYY
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    action_id: Option<String>,
    #[arg(long)]
    client_id: Option<String>,
    #[arg(long)]
    status: Option<String>,
    /// Text to look for in notes and category
    #[arg(long)]
    q: Option<String>,
}

impl From<FilterArgs> for ListQuery {
    fn from(args: FilterArgs) -> Self {
        ListQuery {
            kind: args.kind,
            month: args.month,
            year: args.year,
            action_id: args.action_id,
            client_id: args.client_id,
            status: args.status,
            q: args.q,
        }
    }
}

fn parse_payload(raw: &str) -> Result<RawInput> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Payload must be a JSON object")?;
    Ok(RawInput::from_value(value)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)?;

    if let Command::Config = cli.command {
        let storage = &config.storage;
        let doc = &storage.document_store;
        return print_json(&json!({
            "config_file": config.config_path.display().to_string(),
            "data_dir": storage.data_dir.display().to_string(),
            "collection": storage.collection,
            "document_store": {
                "enabled": doc.enabled,
                "project_id": doc.project_id,
                "database": doc.database,
                "base_url": doc.base_url,
                "access_token": doc.access_token.is_some() || doc.access_token_file.is_some(),
                "request_timeout_secs": doc.request_timeout.as_secs(),
            },
        }));
    }

    let selector = Arc::new(BackendSelector::new(config.storage));
    let ledger = LedgerRepository::new(selector.clone());

    match cli.command {
        Command::Config => unreachable!("handled above"),
        Command::Backend => {
            let kind = ledger.backend_kind().await?;
            print_json(&json!({
                "backend": kind,
                "fallback_reason": selector.fallback_reason(),
            }))
        }
        Command::List(filters) => {
            let records = ledger.list_transactions(&filters.into()).await?;
            print_json(&records)
        }
        Command::Show { id } => print_json(&ledger.get_transaction(&Id::parse(id)?).await?),
        Command::Add { json } => {
            let record = ledger.create_transaction(parse_payload(&json)?).await?;
            print_json(&record)
        }
        Command::Update { id, json } => {
            let record = ledger
                .update_transaction(&Id::parse(id)?, parse_payload(&json)?)
                .await?;
            print_json(&record)
        }
        Command::Remove { id } => {
            let id = Id::parse(id)?;
            ledger.delete_transaction(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
        Command::Summary(filters) => {
            let summary = ledger.summarize_transactions(&filters.into()).await?;
            print_json(&summary)
        }
    }
}
