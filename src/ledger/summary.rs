use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{TransactionRecord, TransactionStatus};

/// Headline figures over a set of ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// Sum of amounts.
    pub total: f64,
    /// Portion of `total` already settled.
    pub settled: f64,
    /// Portion of `total` still outstanding.
    pub open: f64,
    /// Entries dated before today that still have an open balance.
    pub overdue: usize,
    /// All entries considered, cancelled ones included.
    pub count: usize,
}

#[derive(Default)]
struct Totals {
    total: Decimal,
    settled: Decimal,
    open: Decimal,
    overdue: usize,
    count: usize,
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

impl LedgerSummary {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a TransactionRecord>,
        today: NaiveDate,
    ) -> Self {
        let mut totals = Totals::default();

        for record in records {
            totals.count += 1;
            if record.status == TransactionStatus::Cancelado {
                continue;
            }

            let amount = decimal(record.amount);
            let paid = match (record.paid_amount, record.status) {
                (Some(paid), _) => decimal(paid.max(0.0)),
                (None, TransactionStatus::Pago) => amount,
                (None, _) => Decimal::ZERO,
            };
            let settled = paid.min(amount);
            let open = (amount - paid).max(Decimal::ZERO);

            totals.total += amount;
            totals.settled += settled;
            totals.open += open;
            if open > Decimal::ZERO && record.date < today {
                totals.overdue += 1;
            }
        }

        Self {
            total: totals.total.to_f64().unwrap_or_default(),
            settled: totals.settled.to_f64().unwrap_or_default(),
            open: totals.open.to_f64().unwrap_or_default(),
            overdue: totals.overdue,
            count: totals.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Id, TransactionDraft, TransactionType};
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(
        amount: f64,
        status: TransactionStatus,
        paid: Option<f64>,
        on: NaiveDate,
    ) -> TransactionRecord {
        let mut draft = TransactionDraft::new(TransactionType::Saida, on, amount);
        draft.status = status;
        draft.paid_amount = paid;
        draft.into_record(Id::new(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn sums_without_float_drift() {
        let today = date(2024, 1, 1);
        let records: Vec<_> = (0..10)
            .map(|_| record(0.1, TransactionStatus::Pendente, None, today))
            .collect();

        let summary = LedgerSummary::from_records(&records, today);
        assert_eq!(summary.total, 1.0);
        assert_eq!(summary.open, 1.0);
        assert_eq!(summary.count, 10);
    }

    #[test]
    fn settles_paid_and_partial_entries() {
        let today = date(2024, 3, 10);
        let records = vec![
            record(100.0, TransactionStatus::Pago, None, date(2024, 3, 1)),
            record(200.0, TransactionStatus::Pendente, Some(50.0), date(2024, 3, 1)),
            record(30.0, TransactionStatus::Pendente, None, date(2024, 3, 20)),
            record(999.0, TransactionStatus::Cancelado, None, date(2024, 3, 1)),
        ];

        let summary = LedgerSummary::from_records(&records, today);
        assert_eq!(
            summary,
            LedgerSummary {
                total: 330.0,
                settled: 150.0,
                open: 180.0,
                overdue: 1,
                count: 4,
            }
        );
    }

    #[test]
    fn overpayment_does_not_go_negative() {
        let today = date(2024, 3, 10);
        let records = vec![record(
            100.0,
            TransactionStatus::Pendente,
            Some(120.0),
            date(2024, 3, 1),
        )];

        let summary = LedgerSummary::from_records(&records, today);
        assert_eq!(summary.settled, 100.0);
        assert_eq!(summary.open, 0.0);
        assert_eq!(summary.overdue, 0);
    }
}
