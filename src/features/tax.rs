use super::{Feature, ListParams};
use crate::db::query::Filter;
use crate::metrics::{Buckets, MetricSet};
use serde::{Deserialize, Serialize};

pub const TAX_KINDS: &[&str] = &["sales", "purchase", "withholding"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub kind: String,
    // Rate in basis points; 2000 is 20%.
    pub rate_bps: i64,
    pub active: bool,
}

impl TaxRateRow {
    pub fn rate_label(&self) -> String {
        let whole = self.rate_bps / 100;
        let fraction = (self.rate_bps % 100).abs();
        if fraction == 0 {
            format!("{whole}%")
        } else {
            format!("{whole}.{fraction:02}%")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxFilters {
    pub kind: Option<String>,
    pub active: Option<bool>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct TaxRates;

impl Feature for TaxRates {
    type Row = TaxRateRow;
    type Filters = TaxFilters;

    const NAME: &'static str = "tax";
    const TABLE: &'static str = "tax_rates";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["id", "tenant_id", "code", "name", "kind", "rate_bps"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["active"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "name"];
    const ORDER_COLUMN: &'static str = "code";

    fn params(filters: &TaxFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &TaxFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(kind) = filters.kind.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("kind", kind.to_string()));
        }
        if let Some(active) = filters.active {
            out.push(Filter::eq("active", i64::from(active)));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaxRateRow> {
        Ok(TaxRateRow {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            kind: row.get("kind")?,
            rate_bps: row.get("rate_bps")?,
            // Schemas predating the flag treat every rate as active.
            active: row.get::<_, Option<i64>>("active")?.unwrap_or(1) != 0,
        })
    }

    fn row_id(row: &TaxRateRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<TaxRateRow> {
        let rate = |id: i64, code: &str, name: &str, kind: &str, rate_bps: i64, active: bool| TaxRateRow {
            id,
            code: code.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            rate_bps,
            active,
        };
        vec![
            rate(4, "WHT-10", "Contractor withholding", "withholding", 1_000, true),
            rate(3, "VAT-5", "Reduced rate", "sales", 500, false),
            rate(2, "VAT-20", "Standard rate", "sales", 2_000, true),
            rate(1, "IN-VAT-20", "Input VAT", "purchase", 2_000, true),
        ]
    }

    fn summarize(rows: &[TaxRateRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut kinds = Buckets::new(TAX_KINDS);
        for row in rows {
            kinds.record(&row.kind);
        }
        metrics.set_count("rate_count", rows.len() as i64);
        metrics.set_count("active_count", rows.iter().filter(|row| row.active).count() as i64);
        kinds.write_counts(&mut metrics);
        metrics
    }
}
