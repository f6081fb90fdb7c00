use super::{date_column, date_value, demo_date, Feature, ListParams};
use crate::db::query::{Comparator, Filter};
use crate::metrics::{Buckets, MetricSet};
use crate::models::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const ORDER_STATUSES: &[&str] = &["draft", "open", "cancelled"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub order_date: NaiveDate,
    pub status: String,
    pub grand_total: Money,
    pub customer_name: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderFilters {
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_total: Option<Money>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct Orders;

impl Feature for Orders {
    type Row = OrderRow;
    type Filters = OrderFilters;

    const NAME: &'static str = "orders";
    const TABLE: &'static str = "orders";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["id", "tenant_id", "order_number", "order_date", "status", "grand_total"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["customer_name", "currency", "notes"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["order_number", "customer_name", "notes"];
    const ORDER_COLUMN: &'static str = "order_date";

    fn params(filters: &OrderFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &OrderFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(status) = filters.status.as_deref().filter(|status| !status.is_empty()) {
            out.push(Filter::eq("status", status.to_string()));
        }
        if let Some(from) = filters.date_from {
            out.push(Filter::new("order_date", Comparator::Gte, date_value(from)));
        }
        if let Some(to) = filters.date_to {
            out.push(Filter::new("order_date", Comparator::Lte, date_value(to)));
        }
        if let Some(min_total) = filters.min_total {
            out.push(Filter::new("grand_total", Comparator::Gte, min_total.to_string()));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
        Ok(OrderRow {
            id: row.get("id")?,
            order_number: row.get("order_number")?,
            order_date: date_column(row, "order_date")?,
            status: row.get("status")?,
            grand_total: row.get("grand_total")?,
            customer_name: row.get("customer_name")?,
            currency: row.get("currency")?,
            notes: row.get("notes")?,
        })
    }

    fn row_id(row: &OrderRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<OrderRow> {
        let order = |id: i64, number: &str, date: NaiveDate, status: &str, cents: i64, customer: &str| OrderRow {
            id,
            order_number: number.to_string(),
            order_date: date,
            status: status.to_string(),
            grand_total: Money::from_cents(cents),
            customer_name: Some(customer.to_string()),
            currency: Some("USD".to_string()),
            notes: None,
        };
        vec![
            order(4, "SO-1004", demo_date(2026, 9, 18), "open", 8_999, "Northwind Traders"),
            order(3, "SO-1003", demo_date(2026, 9, 12), "cancelled", 50_000, "Contoso Ltd"),
            order(2, "SO-1002", demo_date(2026, 9, 7), "draft", 31_050, "Fabrikam Inc"),
            order(1, "SO-1001", demo_date(2026, 9, 2), "open", 125_000, "Northwind Traders"),
        ]
    }

    fn summarize(rows: &[OrderRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut statuses = Buckets::new(ORDER_STATUSES);
        let mut total_value = Money::ZERO;
        let mut open_value = Money::ZERO;
        for row in rows {
            if statuses.record(&row.status) == "open" {
                open_value += row.grand_total;
            }
            total_value += row.grand_total;
        }
        metrics.set_count("order_count", rows.len() as i64);
        statuses.write_counts(&mut metrics);
        metrics.set_amount("total_value", total_value);
        metrics.set_amount("open_value", open_value);
        metrics
    }
}
