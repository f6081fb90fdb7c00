use super::{date_column, date_value, demo_date, Feature, ListParams};
use crate::db::query::{Comparator, Filter};
use crate::metrics::{AggregateSpec, Measure, MetricSet};
use crate::models::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLineRow {
    pub id: i64,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
    pub account_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalFilters {
    pub account_code: Option<String>,
    pub entry_number: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct GeneralLedger;

impl Feature for GeneralLedger {
    type Row = JournalLineRow;
    type Filters = JournalFilters;

    const NAME: &'static str = "accounting";
    const TABLE: &'static str = "journal_lines";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["id", "tenant_id", "entry_number", "entry_date", "account_code", "debit", "credit"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["account_name", "description"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["entry_number", "account_name", "description"];
    const ORDER_COLUMN: &'static str = "entry_date";

    fn params(filters: &JournalFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &JournalFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(code) = filters.account_code.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("account_code", code.to_string()));
        }
        if let Some(number) = filters.entry_number.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("entry_number", number.to_string()));
        }
        if let Some(from) = filters.date_from {
            out.push(Filter::new("entry_date", Comparator::Gte, date_value(from)));
        }
        if let Some(to) = filters.date_to {
            out.push(Filter::new("entry_date", Comparator::Lte, date_value(to)));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalLineRow> {
        Ok(JournalLineRow {
            id: row.get("id")?,
            entry_number: row.get("entry_number")?,
            entry_date: date_column(row, "entry_date")?,
            account_code: row.get("account_code")?,
            debit: row.get("debit")?,
            credit: row.get("credit")?,
            account_name: row.get("account_name")?,
            description: row.get("description")?,
        })
    }

    fn row_id(row: &JournalLineRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<JournalLineRow> {
        let line = |id: i64, entry: &str, date: NaiveDate, code: &str, name: &str, debit: i64, credit: i64, memo: &str| {
            JournalLineRow {
                id,
                entry_number: entry.to_string(),
                entry_date: date,
                account_code: code.to_string(),
                debit: Money::from_cents(debit),
                credit: Money::from_cents(credit),
                account_name: Some(name.to_string()),
                description: Some(memo.to_string()),
            }
        };
        let sale = demo_date(2026, 9, 12);
        let supplies = demo_date(2026, 9, 5);
        let opening = demo_date(2026, 9, 1);
        vec![
            line(7, "JE-003", sale, "2200", "Sales tax payable", 0, 11_364, "Invoice INV-0042"),
            line(6, "JE-003", sale, "4000", "Sales revenue", 0, 113_636, "Invoice INV-0042"),
            line(5, "JE-003", sale, "1200", "Accounts receivable", 125_000, 0, "Invoice INV-0042"),
            line(4, "JE-002", supplies, "1000", "Cash", 0, 15_750, "Printer paper and toner"),
            line(3, "JE-002", supplies, "6100", "Office supplies", 15_750, 0, "Printer paper and toner"),
            line(2, "JE-001", opening, "3000", "Owner's capital", 0, 500_000, "Opening capital"),
            line(1, "JE-001", opening, "1000", "Cash", 500_000, 0, "Opening capital"),
        ]
    }

    fn summarize(rows: &[JournalLineRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        metrics.set_count("line_count", rows.len() as i64);
        metrics.set_amount("total_debit", rows.iter().map(|row| row.debit).sum());
        metrics.set_amount("total_credit", rows.iter().map(|row| row.credit).sum());
        metrics
    }

    fn aggregate_spec() -> Option<AggregateSpec> {
        Some(AggregateSpec {
            table: "journal_lines",
            measures: vec![
                Measure::Count {
                    name: "line_count",
                    condition: None,
                },
                Measure::Sum {
                    name: "total_debit",
                    column: "debit",
                    condition: None,
                },
                Measure::Sum {
                    name: "total_credit",
                    column: "credit",
                    condition: None,
                },
            ],
        })
    }

    fn derive_metrics(metrics: &mut MetricSet) {
        let difference = metrics.amount("total_debit") - metrics.amount("total_credit");
        metrics.set_amount("out_of_balance", difference);
    }
}

pub fn unbalanced_entries(rows: &[JournalLineRow]) -> Vec<String> {
    let mut nets: BTreeMap<&str, Money> = BTreeMap::new();
    for row in rows {
        *nets.entry(row.entry_number.as_str()).or_default() += row.debit - row.credit;
    }
    nets.into_iter()
        .filter(|(_, net)| !net.is_zero())
        .map(|(entry, _)| entry.to_string())
        .collect()
}
