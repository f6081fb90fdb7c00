use super::{date_column, date_value, demo_date, Feature, ListParams};
use crate::db::query::{Comparator, Filter};
use crate::metrics::MetricSet;
use crate::models::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// A bank statement line. Positive amounts are deposits, negative withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransactionRow {
    pub id: i64,
    pub account_name: String,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub reconciled: bool,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankFilters {
    pub account_name: Option<String>,
    pub reconciled: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct Banking;

impl Feature for Banking {
    type Row = BankTransactionRow;
    type Filters = BankFilters;

    const NAME: &'static str = "banking";
    const TABLE: &'static str = "bank_transactions";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["id", "tenant_id", "account_name", "transaction_date", "description", "amount"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["reconciled", "reference"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["description", "reference"];
    const ORDER_COLUMN: &'static str = "transaction_date";

    fn params(filters: &BankFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &BankFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(account) = filters.account_name.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("account_name", account.to_string()));
        }
        if let Some(reconciled) = filters.reconciled {
            out.push(Filter::eq("reconciled", i64::from(reconciled)));
        }
        if let Some(from) = filters.date_from {
            out.push(Filter::new("transaction_date", Comparator::Gte, date_value(from)));
        }
        if let Some(to) = filters.date_to {
            out.push(Filter::new("transaction_date", Comparator::Lte, date_value(to)));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BankTransactionRow> {
        Ok(BankTransactionRow {
            id: row.get("id")?,
            account_name: row.get("account_name")?,
            transaction_date: date_column(row, "transaction_date")?,
            description: row.get("description")?,
            amount: row.get("amount")?,
            reconciled: row.get::<_, Option<i64>>("reconciled")?.unwrap_or(0) != 0,
            reference: row.get("reference")?,
        })
    }

    fn row_id(row: &BankTransactionRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<BankTransactionRow> {
        let txn = |id: i64, date: NaiveDate, description: &str, cents: i64, reconciled: bool| BankTransactionRow {
            id,
            account_name: "Operating Account".to_string(),
            transaction_date: date,
            description: description.to_string(),
            amount: Money::from_cents(cents),
            reconciled,
            reference: None,
        };
        vec![
            txn(4, demo_date(2026, 9, 20), "Transfer to Blue Ridge Supply", -42_000, false),
            txn(3, demo_date(2026, 9, 15), "Card settlement", 8_999, false),
            txn(2, demo_date(2026, 9, 9), "Petty cash withdrawal", -1_575, true),
            txn(1, demo_date(2026, 9, 3), "Deposit from Northwind Traders", 125_000, true),
        ]
    }

    fn summarize(rows: &[BankTransactionRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut deposits = Money::ZERO;
        let mut withdrawals = Money::ZERO;
        let mut unreconciled = 0;
        for row in rows {
            if row.amount >= Money::ZERO {
                deposits += row.amount;
            } else {
                withdrawals += -row.amount;
            }
            if !row.reconciled {
                unreconciled += 1;
            }
        }
        metrics.set_count("transaction_count", rows.len() as i64);
        metrics.set_count("unreconciled_count", unreconciled);
        metrics.set_amount("deposits_total", deposits);
        metrics.set_amount("withdrawals_total", withdrawals);
        metrics.set_amount("balance", deposits - withdrawals);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_balance_is_deposits_minus_withdrawals() {
        let rows = Banking::demo_rows();
        let metrics = Banking::summarize(&rows);
        let signed: Money = rows.iter().map(|row| row.amount).sum();

        assert_eq!(metrics.amount("balance"), signed);
        assert_eq!(metrics.amount("deposits_total"), Money::from_cents(133_999));
        assert_eq!(metrics.amount("withdrawals_total"), Money::from_cents(43_575));
        assert_eq!(metrics.count("unreconciled_count"), 2);
    }

    #[test]
    fn reconciled_filter_binds_an_integer_flag() {
        let filters = BankFilters {
            reconciled: Some(true),
            ..BankFilters::default()
        };
        let built = Banking::filters(&filters);
        assert_eq!(built, vec![Filter::eq("reconciled", 1_i64)]);
    }
}
