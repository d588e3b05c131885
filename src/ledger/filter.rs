use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{TransactionRecord, TransactionStatus, TransactionType};
use crate::normalize::parse::{month_range, year_range};

/// List parameters as clients send them (query string or CLI flags).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `YYYY-MM`
    pub month: Option<String>,
    /// `YYYY`
    pub year: Option<String>,
    pub action_id: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<String>,
    /// Case-insensitive substring over notes and category.
    pub q: Option<String>,
}

impl ListQuery {
    pub fn with_kind(mut self, kind: TransactionType) -> Self {
        self.kind = Some(kind.as_str().to_string());
        self
    }
}

/// Validated list criteria. Every criterion is optional; present ones are
/// combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub kind: Option<TransactionType>,
    /// Inclusive date bounds.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub action_id: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<TransactionStatus>,
    text: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl QueryFilter {
    pub fn from_query(query: &ListQuery) -> Result<Self> {
        let kind = present(&query.kind)
            .map(|raw| {
                TransactionType::fold(raw).ok_or_else(|| {
                    LedgerError::validation("type", format!("unknown transaction type {raw:?}"))
                })
            })
            .transpose()?;

        let month = present(&query.month)
            .map(|raw| {
                month_range(raw).ok_or_else(|| {
                    LedgerError::validation("month", format!("expected YYYY-MM, got {raw:?}"))
                })
            })
            .transpose()?;
        let year = present(&query.year)
            .map(|raw| {
                year_range(raw).ok_or_else(|| {
                    LedgerError::validation("year", format!("expected YYYY, got {raw:?}"))
                })
            })
            .transpose()?;

        let status = present(&query.status)
            .map(|raw| {
                TransactionStatus::parse(raw).ok_or_else(|| {
                    LedgerError::validation("status", format!("unknown status {raw:?}"))
                })
            })
            .transpose()?;

        Ok(Self {
            kind,
            date_range: intersect(month, year),
            action_id: present(&query.action_id).map(str::to_string),
            client_id: present(&query.client_id).map(str::to_string),
            status,
            text: present(&query.q).map(str::to_lowercase),
        })
    }

    pub fn with_text(mut self, text: &str) -> Self {
        let text = text.trim();
        self.text = (!text.is_empty()).then(|| text.to_lowercase());
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if self.kind.is_some_and(|kind| kind != record.kind) {
            return false;
        }
        if let Some((start, end)) = self.date_range {
            if record.date < start || record.date > end {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != record.status) {
            return false;
        }
        if !matches_id(&self.action_id, &record.action_id)
            || !matches_id(&self.client_id, &record.client_id)
        {
            return false;
        }
        match &self.text {
            Some(text) => {
                record.notes.to_lowercase().contains(text)
                    || record.category.to_lowercase().contains(text)
            }
            None => true,
        }
    }

    /// Keep matching records, newest first.
    pub fn apply(&self, records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
        let mut records: Vec<_> = records.into_iter().filter(|r| self.matches(r)).collect();
        records.sort_by(newest_first);
        records
    }
}

fn matches_id(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => actual.as_deref().map(str::trim) == Some(wanted.as_str()),
        None => true,
    }
}

/// Both bounds must hold, so the effective range is their overlap. Disjoint
/// bounds produce an empty range that matches nothing.
fn intersect(
    a: Option<(NaiveDate, NaiveDate)>,
    b: Option<(NaiveDate, NaiveDate)>,
) -> Option<(NaiveDate, NaiveDate)> {
    match (a, b) {
        (Some((a_start, a_end)), Some((b_start, b_end))) => {
            Some((a_start.max(b_start), a_end.min(b_end)))
        }
        (range, None) | (None, range) => range,
    }
}

/// Date descending, then most recently touched, then id descending.
pub fn newest_first(a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| b.id.cmp(&a.id))
}
