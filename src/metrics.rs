use crate::db::capability::SchemaProber;
use crate::db::query::WhereClause;
use crate::models::Money;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

pub const OTHER_BUCKET: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MetricValue {
    Count(i64),
    Amount(Money),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSet {
    pub values: BTreeMap<String, MetricValue>,
    pub storage_ready: bool,
    pub period_label: Option<String>,
}

impl MetricSet {
    pub fn new(storage_ready: bool) -> Self {
        Self {
            storage_ready,
            ..Self::default()
        }
    }

    pub fn set_count(&mut self, name: &str, value: i64) {
        self.values.insert(name.to_string(), MetricValue::Count(value));
    }

    pub fn set_amount(&mut self, name: &str, value: Money) {
        self.values.insert(name.to_string(), MetricValue::Amount(value));
    }

    pub fn count(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(MetricValue::Count(value)) => *value,
            _ => 0,
        }
    }

    pub fn amount(&self, name: &str) -> Money {
        match self.values.get(name) {
            Some(MetricValue::Amount(value)) => *value,
            _ => Money::ZERO,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Buckets {
    known: &'static [&'static str],
    counts: BTreeMap<&'static str, i64>,
}

impl Buckets {
    pub fn new(known: &'static [&'static str]) -> Self {
        let mut counts: BTreeMap<&'static str, i64> = known.iter().map(|name| (*name, 0)).collect();
        counts.insert(OTHER_BUCKET, 0);
        Self { known, counts }
    }

    pub fn bucket_for(&self, value: &str) -> &'static str {
        self.known
            .iter()
            .copied()
            .find(|known| *known == value)
            .unwrap_or(OTHER_BUCKET)
    }

    pub fn record(&mut self, value: &str) -> &'static str {
        let bucket = self.bucket_for(value);
        *self.counts.entry(bucket).or_insert(0) += 1;
        bucket
    }

    pub fn get(&self, bucket: &str) -> i64 {
        self.counts.get(bucket).copied().unwrap_or(0)
    }

    pub fn write_counts(&self, metrics: &mut MetricSet) {
        for (bucket, count) in &self.counts {
            metrics.set_count(&format!("{bucket}_count"), *count);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub value: Value,
}

impl Condition {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Count {
        name: &'static str,
        condition: Option<Condition>,
    },
    Sum {
        name: &'static str,
        column: &'static str,
        condition: Option<Condition>,
    },
}

impl Measure {
    fn name(&self) -> &'static str {
        match self {
            Self::Count { name, .. } | Self::Sum { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub table: &'static str,
    pub measures: Vec<Measure>,
}

// Runs every measure in one statement over the rows `scope` selects, so the
// metrics describe the same filtered set as the listing. Sums are computed in
// integer cents. Measures that reference a missing column read as zero.
pub fn run_aggregate(
    conn: &Connection,
    prober: &SchemaProber<'_>,
    scope: &WhereClause,
    spec: &AggregateSpec,
) -> rusqlite::Result<MetricSet> {
    let mut metrics = MetricSet::new(true);
    let mut expressions = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    let mut computed: Vec<&Measure> = Vec::new();

    for measure in &spec.measures {
        let (column, condition) = match measure {
            Measure::Count { condition, .. } => (None, condition.as_ref()),
            Measure::Sum { column, condition, .. } => (Some(*column), condition.as_ref()),
        };
        let columns_present = column.map(|name| prober.has_column(spec.table, name)).unwrap_or(true)
            && condition
                .map(|cond| prober.has_column(spec.table, cond.column))
                .unwrap_or(true);
        if !columns_present {
            match measure {
                Measure::Count { name, .. } => metrics.set_count(name, 0),
                Measure::Sum { name, .. } => metrics.set_amount(name, Money::ZERO),
            }
            continue;
        }

        let guard = condition.map(|cond| format!("{} = ?", cond.column));
        let expression = match (column, &guard) {
            (None, None) => "COUNT(1)".to_string(),
            (None, Some(guard)) => format!("COALESCE(SUM(CASE WHEN {guard} THEN 1 ELSE 0 END), 0)"),
            (Some(column), None) => format!("COALESCE(SUM({}), 0)", cents_expr(column)),
            (Some(column), Some(guard)) => {
                format!("COALESCE(SUM(CASE WHEN {guard} THEN {} ELSE 0 END), 0)", cents_expr(column))
            }
        };
        if let Some(cond) = condition {
            binds.push(cond.value.clone());
        }
        expressions.push(expression);
        computed.push(measure);
    }

    if expressions.is_empty() {
        return Ok(metrics);
    }

    // Measure conditions bind inside the SELECT list, ahead of the scope.
    let sql = format!("SELECT {} FROM {} WHERE {}", expressions.join(", "), spec.table, scope.sql);
    binds.extend(scope.binds.iter().cloned());

    let values: Vec<i64> = conn.query_row(&sql, rusqlite::params_from_iter(binds.iter()), |row| {
        (0..computed.len()).map(|index| row.get::<_, i64>(index)).collect()
    })?;

    for (measure, value) in computed.iter().zip(values) {
        match measure {
            Measure::Count { .. } => metrics.set_count(measure.name(), value),
            Measure::Sum { .. } => metrics.set_amount(measure.name(), Money::from_cents(value)),
        }
    }
    Ok(metrics)
}

fn cents_expr(column: &str) -> String {
    format!("CAST(ROUND(COALESCE({column}, 0) * 100) AS INTEGER)")
}

pub fn period_label_for(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
