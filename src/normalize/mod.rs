//! Maps loosely-structured client payloads onto the canonical record.
//!
//! Every canonical field has an ordered list of accepted keys in
//! [`ALIAS_TABLE`]; the first key holding a non-empty value wins and is run
//! through the field's parser. Supporting a new client vocabulary means adding
//! a key to the table.

pub mod parse;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LedgerError, Result};
use crate::models::{
    PaymentDate, TransactionDraft, TransactionPatch, TransactionStatus, TransactionType,
};

use self::parse::{parse_amount, parse_date_value};

/// A client payload before normalization: string keys to arbitrary JSON
/// values. Only [`FieldNormalizer`] looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInput(Map<String, Value>);

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts only JSON objects; anything else is a malformed body.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(LedgerError::validation(
                "body",
                format!("expected a JSON object, got {}", json_kind(&other)),
            )),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The first of `keys` that holds a usable value, with the value.
    pub fn first_present(&self, keys: &[&'static str]) -> Option<(&'static str, &Value)> {
        keys.iter()
            .find_map(|key| self.0.get(*key).filter(|v| is_present(v)).map(|v| (*key, v)))
    }
}

impl From<Map<String, Value>> for RawInput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Canonical fields a payload can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    PaymentDate,
    Amount,
    Type,
    Status,
    Category,
    Notes,
    PaymentMethod,
    InterestRate,
    PaidAmount,
    ActionId,
    ClientId,
    MaterialId,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::PaymentDate => "payment_date",
            Self::Amount => "amount",
            Self::Type => "type",
            Self::Status => "status",
            Self::Category => "category",
            Self::Notes => "notes",
            Self::PaymentMethod => "payment_method",
            Self::InterestRate => "interest_rate",
            Self::PaidAmount => "paid_amount",
            Self::ActionId => "action_id",
            Self::ClientId => "client_id",
            Self::MaterialId => "material_id",
        }
    }
}

/// One row of the alias table: a canonical field and the keys that may carry
/// it, highest priority first.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub field: Field,
    pub keys: &'static [&'static str],
}

pub const ALIAS_TABLE: &[FieldAliases] = &[
    FieldAliases {
        field: Field::Date,
        keys: &["date", "due_date", "dueDate", "vencimento", "data"],
    },
    FieldAliases {
        field: Field::PaymentDate,
        keys: &["payment_date", "action_text", "pay_date", "payDate", "dataPagamento"],
    },
    FieldAliases {
        field: Field::Amount,
        keys: &["amount", "valor"],
    },
    FieldAliases {
        field: Field::Type,
        keys: &["type", "tipo"],
    },
    FieldAliases {
        field: Field::Status,
        keys: &["status"],
    },
    FieldAliases {
        field: Field::Category,
        keys: &["category", "categoria"],
    },
    FieldAliases {
        field: Field::Notes,
        keys: &["notes", "descricao", "cliente", "notaFiscal", "observacoes", "obs"],
    },
    FieldAliases {
        field: Field::PaymentMethod,
        keys: &["payment_method", "paymentMethod", "client_text"],
    },
    FieldAliases {
        field: Field::InterestRate,
        keys: &["interest_rate", "interestRate", "material_text"],
    },
    FieldAliases {
        field: Field::PaidAmount,
        keys: &["paid_amount", "valorPago", "valorLiqRecebido"],
    },
    FieldAliases {
        field: Field::ActionId,
        keys: &["action_id", "actionId"],
    },
    FieldAliases {
        field: Field::ClientId,
        keys: &["client_id", "clientId"],
    },
    FieldAliases {
        field: Field::MaterialId,
        keys: &["material_id", "materialId"],
    },
];

/// Pure payload-to-record transform driven by an alias table.
#[derive(Debug, Clone, Copy)]
pub struct FieldNormalizer {
    table: &'static [FieldAliases],
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self { table: ALIAS_TABLE }
    }

    pub fn with_table(table: &'static [FieldAliases]) -> Self {
        Self { table }
    }

    pub fn aliases(&self, field: Field) -> &'static [&'static str] {
        self.table
            .iter()
            .find(|row| row.field == field)
            .map(|row| row.keys)
            .unwrap_or(&[])
    }

    /// Normalize a payload for creation.
    ///
    /// `date` is mandatory. Without a type, the amount's sign decides it:
    /// non-negative is `entrada`, negative is `saida`, and the magnitude is
    /// stored. With an explicit type, a negative amount is rejected.
    pub fn normalize(&self, raw: &RawInput) -> Result<TransactionDraft> {
        let patch = self.collect(raw)?;

        let date = patch.date.ok_or_else(|| {
            LedgerError::validation(
                "date",
                format!(
                    "a date is required under one of {:?} (YYYY-MM-DD, DD/MM/YYYY or DDMMYYYY)",
                    self.aliases(Field::Date)
                ),
            )
        })?;

        let signed = patch.amount.unwrap_or(0.0);
        let kind = match patch.kind {
            Some(kind) => {
                if signed < 0.0 {
                    return Err(negative_amount());
                }
                kind
            }
            None if signed >= 0.0 => TransactionType::Entrada,
            None => TransactionType::Saida,
        };

        Ok(TransactionDraft {
            kind,
            date,
            amount: signed.abs(),
            category: patch.category.unwrap_or_default(),
            notes: patch.notes.unwrap_or_default(),
            status: patch.status.unwrap_or_default(),
            payment_date: patch.payment_date,
            payment_method: patch.payment_method,
            interest_rate: patch.interest_rate,
            paid_amount: patch.paid_amount,
            action_id: patch.action_id,
            client_id: patch.client_id,
            material_id: patch.material_id,
        })
    }

    /// Normalize only the fields present in an update payload.
    pub fn normalize_patch(&self, raw: &RawInput) -> Result<TransactionPatch> {
        let patch = self.collect(raw)?;
        if patch.amount.is_some_and(|amount| amount < 0.0) {
            return Err(negative_amount());
        }
        Ok(patch)
    }

    fn collect(&self, raw: &RawInput) -> Result<TransactionPatch> {
        let mut patch = TransactionPatch::default();
        for row in self.table {
            if let Some((key, value)) = raw.first_present(row.keys) {
                apply_field(row.field, key, value, &mut patch)?;
            }
        }
        Ok(patch)
    }
}

fn negative_amount() -> LedgerError {
    LedgerError::validation(
        "amount",
        "amount must be non-negative; the sign is carried by the type",
    )
}

fn apply_field(field: Field, key: &str, value: &Value, patch: &mut TransactionPatch) -> Result<()> {
    match field {
        Field::Date => {
            let date = parse_date_value(value).ok_or_else(|| {
                LedgerError::validation(
                    "date",
                    format!("'{key}' is not a valid date (YYYY-MM-DD, DD/MM/YYYY or DDMMYYYY)"),
                )
            })?;
            patch.date = Some(date);
        }
        Field::PaymentDate => {
            patch.payment_date = text(value).as_deref().and_then(PaymentDate::from_text);
        }
        Field::Amount => {
            let amount = parse_amount(value).ok_or_else(|| {
                LedgerError::validation("amount", format!("'{key}' is not a valid amount"))
            })?;
            patch.amount = Some(amount);
        }
        Field::Type => {
            let raw = text(value).unwrap_or_default();
            let kind = TransactionType::fold(&raw).ok_or_else(|| {
                LedgerError::validation(
                    "type",
                    format!("'{raw}' is not one of entrada, saida, despesa, pagar, receber"),
                )
            })?;
            patch.kind = Some(kind);
        }
        Field::Status => {
            let raw = text(value).unwrap_or_default();
            patch.status = Some(TransactionStatus::normalize(&raw));
        }
        Field::Category => patch.category = text(value),
        Field::Notes => patch.notes = text(value),
        Field::PaymentMethod => patch.payment_method = text(value),
        Field::InterestRate => patch.interest_rate = parse_amount(value),
        Field::PaidAmount => patch.paid_amount = parse_amount(value).map(f64::abs),
        Field::ActionId => patch.action_id = text(value),
        Field::ClientId => patch.client_id = text(value),
        Field::MaterialId => patch.material_id = text(value),
    }
    Ok(())
}

/// Scalar values as trimmed text; structured values are ignored.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
