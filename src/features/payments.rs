use super::{date_column, date_value, demo_date, Feature, ListParams};
use crate::db::query::{Comparator, Filter};
use crate::metrics::{AggregateSpec, Buckets, Condition, Measure, MetricSet};
use crate::models::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PAYMENT_METHODS: &[&str] = &["cash", "bank_transfer", "card"];
pub const INCOMING: &str = "incoming";
pub const OUTGOING: &str = "outgoing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
    pub id: i64,
    pub payment_date: NaiveDate,
    pub direction: String,
    pub method: String,
    pub amount: Money,
    pub reference: Option<String>,
    pub counterparty: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentFilters {
    pub direction: Option<String>,
    pub method: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct Payments;

impl Feature for Payments {
    type Row = PaymentRow;
    type Filters = PaymentFilters;

    const NAME: &'static str = "payments";
    const TABLE: &'static str = "payments";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["id", "tenant_id", "payment_date", "direction", "method", "amount"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["reference", "counterparty"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["reference", "counterparty"];
    const ORDER_COLUMN: &'static str = "payment_date";

    fn params(filters: &PaymentFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &PaymentFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(direction) = filters.direction.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("direction", direction.to_string()));
        }
        if let Some(method) = filters.method.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("method", method.to_string()));
        }
        if let Some(from) = filters.date_from {
            out.push(Filter::new("payment_date", Comparator::Gte, date_value(from)));
        }
        if let Some(to) = filters.date_to {
            out.push(Filter::new("payment_date", Comparator::Lte, date_value(to)));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRow> {
        Ok(PaymentRow {
            id: row.get("id")?,
            payment_date: date_column(row, "payment_date")?,
            direction: row.get("direction")?,
            method: row.get("method")?,
            amount: row.get("amount")?,
            reference: row.get("reference")?,
            counterparty: row.get("counterparty")?,
        })
    }

    fn row_id(row: &PaymentRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<PaymentRow> {
        let payment = |id: i64, date: NaiveDate, direction: &str, method: &str, cents: i64, reference: &str, party: &str| {
            PaymentRow {
                id,
                payment_date: date,
                direction: direction.to_string(),
                method: method.to_string(),
                amount: Money::from_cents(cents),
                reference: Some(reference.to_string()),
                counterparty: Some(party.to_string()),
            }
        };
        vec![
            payment(4, demo_date(2026, 9, 20), OUTGOING, "bank_transfer", 42_000, "PO-2207", "Blue Ridge Supply"),
            payment(3, demo_date(2026, 9, 15), INCOMING, "card", 8_999, "SO-1004", "Northwind Traders"),
            payment(2, demo_date(2026, 9, 9), OUTGOING, "cash", 1_575, "PETTY-031", "Office Depot"),
            payment(1, demo_date(2026, 9, 3), INCOMING, "bank_transfer", 125_000, "SO-1001", "Northwind Traders"),
        ]
    }

    fn summarize(rows: &[PaymentRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut methods = Buckets::new(PAYMENT_METHODS);
        let mut incoming = Money::ZERO;
        let mut outgoing = Money::ZERO;
        for row in rows {
            methods.record(&row.method);
            match row.direction.as_str() {
                INCOMING => incoming += row.amount,
                OUTGOING => outgoing += row.amount,
                _ => {}
            }
        }
        metrics.set_count("payment_count", rows.len() as i64);
        methods.write_counts(&mut metrics);
        metrics.set_amount("incoming_total", incoming);
        metrics.set_amount("outgoing_total", outgoing);
        metrics
    }

    fn aggregate_spec() -> Option<AggregateSpec> {
        let mut measures = vec![
            Measure::Count {
                name: "payment_count",
                condition: None,
            },
            Measure::Sum {
                name: "incoming_total",
                column: "amount",
                condition: Some(Condition::eq("direction", INCOMING.to_string())),
            },
            Measure::Sum {
                name: "outgoing_total",
                column: "amount",
                condition: Some(Condition::eq("direction", OUTGOING.to_string())),
            },
        ];
        for method in PAYMENT_METHODS {
            measures.push(Measure::Count {
                name: method_count_name(method),
                condition: Some(Condition::eq("method", method.to_string())),
            });
        }
        Some(AggregateSpec {
            table: "payments",
            measures,
        })
    }

    fn derive_metrics(metrics: &mut MetricSet) {
        let net_flow = metrics.amount("incoming_total") - metrics.amount("outgoing_total");
        metrics.set_amount("net_flow", net_flow);

        if !metrics.values.contains_key("other_count") {
            let known: i64 = PAYMENT_METHODS
                .iter()
                .map(|method| metrics.count(method_count_name(method)))
                .sum();
            let other = (metrics.count("payment_count") - known).max(0);
            metrics.set_count("other_count", other);
        }
    }
}

fn method_count_name(method: &str) -> &'static str {
    match method {
        "cash" => "cash_count",
        "bank_transfer" => "bank_transfer_count",
        "card" => "card_count",
        _ => "other_count",
    }
}
