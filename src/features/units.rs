use super::{Feature, ListParams};
use crate::db::query::Filter;
use crate::metrics::{Buckets, MetricSet};
use serde::{Deserialize, Serialize};

pub const UNIT_CATEGORIES: &[&str] = &["mass", "volume", "length", "count", "time"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub category: String,
    // Multiplier to the category's base unit.
    pub factor: f64,
    pub is_base: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitFilters {
    pub category: Option<String>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct UnitsOfMeasure;

impl Feature for UnitsOfMeasure {
    type Row = UnitRow;
    type Filters = UnitFilters;

    const NAME: &'static str = "units";
    const TABLE: &'static str = "units_of_measure";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["id", "tenant_id", "code", "name", "category"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["factor", "is_base"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "name"];
    const ORDER_COLUMN: &'static str = "code";

    fn params(filters: &UnitFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &UnitFilters) -> Vec<Filter> {
        filters
            .category
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|category| vec![Filter::eq("category", category.to_string())])
            .unwrap_or_default()
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnitRow> {
        Ok(UnitRow {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            category: row.get("category")?,
            factor: row.get::<_, Option<f64>>("factor")?.unwrap_or(1.0),
            is_base: row.get::<_, Option<i64>>("is_base")?.unwrap_or(0) != 0,
        })
    }

    fn row_id(row: &UnitRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<UnitRow> {
        let unit = |id: i64, code: &str, name: &str, category: &str, factor: f64, is_base: bool| UnitRow {
            id,
            code: code.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            factor,
            is_base,
        };
        vec![
            unit(5, "pc", "Piece", "count", 1.0, true),
            unit(4, "m", "Metre", "length", 1.0, true),
            unit(3, "l", "Litre", "volume", 1.0, true),
            unit(1, "kg", "Kilogram", "mass", 1.0, true),
            unit(2, "g", "Gram", "mass", 0.001, false),
        ]
    }

    fn summarize(rows: &[UnitRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut categories = Buckets::new(UNIT_CATEGORIES);
        for row in rows {
            categories.record(&row.category);
        }
        metrics.set_count("unit_count", rows.len() as i64);
        metrics.set_count("base_unit_count", rows.iter().filter(|row| row.is_base).count() as i64);
        categories.write_counts(&mut metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_units_have_one_base_per_used_category() {
        let rows = UnitsOfMeasure::demo_rows();
        for category in UNIT_CATEGORIES {
            let bases = rows
                .iter()
                .filter(|row| row.category == *category && row.is_base)
                .count();
            let used = rows.iter().any(|row| row.category == *category);
            assert_eq!(bases, usize::from(used), "category {category}");
        }
    }

    #[test]
    fn demo_rows_are_ordered_like_live_rows() {
        let rows = UnitsOfMeasure::demo_rows();
        assert!(rows.windows(2).all(|pair| pair[0].code > pair[1].code));
    }

    #[test]
    fn demo_summary_counts_categories() {
        let metrics = UnitsOfMeasure::summarize(&UnitsOfMeasure::demo_rows());
        assert_eq!(metrics.count("unit_count"), 5);
        assert_eq!(metrics.count("mass_count"), 2);
        assert_eq!(metrics.count("time_count"), 0);
        assert_eq!(metrics.count("base_unit_count"), 4);
    }
}
