use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::normalize::parse::{parse_amount, parse_amount_or, parse_date};

use super::Id;

/// Direction of a ledger entry. The sign of a movement lives here, never in
/// the stored amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Income. Entries stored without a type read back as this.
    #[default]
    Entrada,
    /// Outflow.
    Saida,
    /// Generic expense.
    Despesa,
}

impl TransactionType {
    /// Fold a client-supplied type, including the payable/receivable
    /// synonyms, into the enum.
    pub fn fold(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "entrada" | "receber" => Some(Self::Entrada),
            "saida" | "saída" | "pagar" => Some(Self::Saida),
            "despesa" => Some(Self::Despesa),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entrada => "entrada",
            Self::Saida => "saida",
            Self::Despesa => "despesa",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::fold(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown transaction type {raw:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TransactionStatus {
    Pago,
    #[default]
    Pendente,
    Cancelado,
}

impl TransactionStatus {
    /// Strict fold used for query parameters: `None` when nothing matches.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pago" | "paga" | "recebido" => Some(Self::Pago),
            "pendente" | "em aberto" | "aberto" => Some(Self::Pendente),
            "cancelado" | "cancelada" => Some(Self::Cancelado),
            _ => None,
        }
    }

    /// Lenient fold used for payloads and stored data: anything unrecognized
    /// becomes `Pendente`.
    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pago => "Pago",
            Self::Pendente => "Pendente",
            Self::Cancelado => "Cancelado",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::normalize).unwrap_or_default())
    }
}

/// Secondary (payment) date. Clients sometimes put free text here, which is
/// kept verbatim instead of rejecting the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentDate {
    Date(NaiveDate),
    Text(String),
}

impl PaymentDate {
    pub fn from_text(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match parse_date(trimmed) {
            Some(date) => Self::Date(date),
            None => Self::Text(trimmed.to_string()),
        })
    }
}

/// The canonical ledger entry. This is the only shape persisted by a backend
/// or returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Id,
    #[serde(rename = "type", default)]
    pub kind: TransactionType,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    /// Non-negative magnitude.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<PaymentDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub interest_rate: Option<f64>,
    /// Amount already settled against this entry.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub paid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_id: Option<String>,
    #[serde(default = "missing_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "missing_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Merge the fields present in `patch` and refresh `updated_at`.
    pub fn apply(&mut self, patch: &TransactionPatch, now: DateTime<Utc>) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(payment_date) = &patch.payment_date {
            self.payment_date = Some(payment_date.clone());
        }
        if let Some(method) = &patch.payment_method {
            self.payment_method = Some(method.clone());
        }
        if let Some(rate) = patch.interest_rate {
            self.interest_rate = Some(rate);
        }
        if let Some(paid) = patch.paid_amount {
            self.paid_amount = Some(paid);
        }
        if let Some(action_id) = &patch.action_id {
            self.action_id = Some(action_id.clone());
        }
        if let Some(client_id) = &patch.client_id {
            self.client_id = Some(client_id.clone());
        }
        if let Some(material_id) = &patch.material_id {
            self.material_id = Some(material_id.clone());
        }
        self.updated_at = now;
    }
}

/// A normalized record that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
    pub notes: String,
    pub status: TransactionStatus,
    pub payment_date: Option<PaymentDate>,
    pub payment_method: Option<String>,
    pub interest_rate: Option<f64>,
    pub paid_amount: Option<f64>,
    pub action_id: Option<String>,
    pub client_id: Option<String>,
    pub material_id: Option<String>,
}

impl TransactionDraft {
    pub fn new(kind: TransactionType, date: NaiveDate, amount: f64) -> Self {
        Self {
            kind,
            date,
            amount,
            category: String::new(),
            notes: String::new(),
            status: TransactionStatus::default(),
            payment_date: None,
            payment_method: None,
            interest_rate: None,
            paid_amount: None,
            action_id: None,
            client_id: None,
            material_id: None,
        }
    }

    pub fn into_record(self, id: Id, now: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            kind: self.kind,
            date: self.date,
            amount: self.amount,
            category: self.category,
            notes: self.notes,
            status: self.status,
            payment_date: self.payment_date,
            payment_method: self.payment_method,
            interest_rate: self.interest_rate,
            paid_amount: self.paid_amount,
            action_id: self.action_id,
            client_id: self.client_id,
            material_id: self.material_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields to overwrite on an existing record; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub kind: Option<TransactionType>,
    pub date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub status: Option<TransactionStatus>,
    pub payment_date: Option<PaymentDate>,
    pub payment_method: Option<String>,
    pub interest_rate: Option<f64>,
    pub paid_amount: Option<f64>,
    pub action_id: Option<String>,
    pub client_id: Option<String>,
    pub material_id: Option<String>,
}

/// Keys older writers stored the payment fields under, with the canonical
/// key each one feeds.
const LEGACY_PAYMENT_KEYS: [(&str, &str); 3] = [
    ("action_text", "payment_date"),
    ("client_text", "payment_method"),
    ("material_text", "interest_rate"),
];

/// Copy legacy payment keys of a stored entry onto their canonical keys.
/// A non-blank canonical value always wins.
pub(crate) fn adopt_legacy_keys(entry: &mut Map<String, Value>) {
    let blank = |v: &Value| match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    for (legacy, canonical) in LEGACY_PAYMENT_KEYS {
        if entry.get(canonical).is_some_and(|v| !blank(v)) {
            continue;
        }
        if let Some(value) = entry.get(legacy).filter(|v| !blank(v)).cloned() {
            entry.insert(canonical.to_string(), value);
        }
    }
}

fn missing_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn deserialize_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("unreadable date {raw:?}")))
}

fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_amount_or(&value, 0.0).abs())
}

fn deserialize_optional_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_amount(&value))
}
