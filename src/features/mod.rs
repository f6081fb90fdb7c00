pub mod accounting;
pub mod banking;
pub mod orders;
pub mod payments;
pub mod payroll;
pub mod suppliers;
pub mod tax;
pub mod units;

use crate::config::Settings;
use crate::db::capability::SchemaProber;
use crate::db::query::{Direction, Filter, QueryBuilder, QuerySpec, Search};
use crate::errors::AppResult;
use crate::metrics::{run_aggregate, AggregateSpec, MetricSet};
use crate::models::{Listing, TenantId};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const DEMO_DATASET_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListParams {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|term| !term.is_empty())
    }
}

pub trait Feature {
    type Row: Clone + Serialize;
    type Filters;

    const NAME: &'static str;
    const TABLE: &'static str;
    // Must include `id` and `tenant_id`.
    const REQUIRED_COLUMNS: &'static [&'static str];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &[];
    const SEARCH_COLUMNS: &'static [&'static str] = &[];
    const ORDER_COLUMN: &'static str;
    // Demo rows are stored in this order too.
    const ORDER_DIRECTION: Direction = Direction::Desc;

    fn params(filters: &Self::Filters) -> &ListParams;

    fn filters(filters: &Self::Filters) -> Vec<Filter>;

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self::Row>;

    fn row_id(row: &Self::Row) -> i64;

    fn demo_rows() -> Vec<Self::Row>;

    fn summarize(rows: &[Self::Row]) -> MetricSet;

    // When set, live metrics run in SQL over every row the listing's filters
    // match, not just the fetched page.
    fn aggregate_spec() -> Option<AggregateSpec> {
        None
    }

    fn derive_metrics(_metrics: &mut MetricSet) {}
}

pub trait DataSource<F: Feature> {
    fn storage_ready(&self) -> bool;

    fn list(&self, tenant: TenantId, filters: &F::Filters) -> AppResult<Listing<F::Row>>;

    fn find(&self, tenant: TenantId, id: i64) -> AppResult<Option<F::Row>>;
}

pub fn storage_ready<F: Feature>(prober: &SchemaProber<'_>) -> bool {
    prober.has_columns(F::TABLE, F::REQUIRED_COLUMNS)
}

pub fn select_source<'a, F: Feature + 'a>(
    conn: &'a Connection,
    prober: SchemaProber<'a>,
    settings: &'a Settings,
) -> Box<dyn DataSource<F> + 'a> {
    if storage_ready::<F>(&prober) {
        Box::new(LiveSource {
            conn,
            prober,
            settings,
        })
    } else {
        Box::new(DemoSource)
    }
}

pub struct LiveSource<'a> {
    conn: &'a Connection,
    prober: SchemaProber<'a>,
    settings: &'a Settings,
}

impl LiveSource<'_> {
    fn spec<F: Feature>(&self, tenant: TenantId) -> QuerySpec {
        QuerySpec {
            required_columns: F::REQUIRED_COLUMNS,
            optional_columns: F::OPTIONAL_COLUMNS,
            order_by: F::ORDER_COLUMN,
            direction: F::ORDER_DIRECTION,
            limit: self.settings.row_limit(None),
            ..QuerySpec::new(F::TABLE, tenant)
        }
    }
}

impl<F: Feature> DataSource<F> for LiveSource<'_> {
    fn storage_ready(&self) -> bool {
        true
    }

    fn list(&self, tenant: TenantId, filters: &F::Filters) -> AppResult<Listing<F::Row>> {
        let params = F::params(filters);
        let mut spec = self.spec::<F>(tenant);
        spec.filters = F::filters(filters);
        spec.search = params.search_term().map(|term| Search {
            term: term.to_string(),
            columns: F::SEARCH_COLUMNS,
        });
        spec.limit = self.settings.row_limit(params.limit);
        spec.offset = params.offset.unwrap_or(0);

        let built = QueryBuilder::build(&spec, &self.prober);
        if !built.ignored_filters.is_empty() {
            tracing::debug!(
                feature = F::NAME,
                tenant = %tenant,
                ignored = ?built.ignored_filters,
                "filters dropped for columns this schema does not have"
            );
        }
        let records = built.fetch(self.conn, F::map_row)?;

        let mut metrics = match F::aggregate_spec() {
            Some(aggregate) => run_aggregate(self.conn, &self.prober, &built.scope, &aggregate)?,
            None => F::summarize(&records),
        };
        metrics.storage_ready = true;
        F::derive_metrics(&mut metrics);

        Ok(Listing {
            records,
            metrics,
            storage_ready: true,
            applied_filters: built.applied_filters,
            ignored_filters: built.ignored_filters,
        })
    }

    fn find(&self, tenant: TenantId, id: i64) -> AppResult<Option<F::Row>> {
        let mut spec = self.spec::<F>(tenant);
        spec.filters = vec![Filter::eq("id", id)];
        spec.limit = 1;
        let built = QueryBuilder::build(&spec, &self.prober);
        let mut rows = built.fetch(self.conn, F::map_row)?;
        Ok(rows.pop())
    }
}

pub struct DemoSource;

impl<F: Feature> DataSource<F> for DemoSource {
    fn storage_ready(&self) -> bool {
        false
    }

    fn list(&self, tenant: TenantId, filters: &F::Filters) -> AppResult<Listing<F::Row>> {
        tracing::info!(feature = F::NAME, tenant = %tenant, "storage not ready; serving demo data");
        let params = F::params(filters);
        let mut ignored_filters: Vec<String> = F::filters(filters).iter().map(Filter::describe).collect();
        if params.search_term().is_some() {
            ignored_filters.push(
                Search {
                    term: String::new(),
                    columns: F::SEARCH_COLUMNS,
                }
                .describe(),
            );
        }

        let records = F::demo_rows();
        let mut metrics = F::summarize(&records);
        metrics.storage_ready = false;
        F::derive_metrics(&mut metrics);

        Ok(Listing {
            records,
            metrics,
            storage_ready: false,
            applied_filters: Vec::new(),
            ignored_filters,
        })
    }

    fn find(&self, _tenant: TenantId, id: i64) -> AppResult<Option<F::Row>> {
        Ok(F::demo_rows().into_iter().find(|row| F::row_id(row) == id))
    }
}

// Tolerates a trailing time part after `YYYY-MM-DD`.
pub(crate) fn date_column(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(column)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
        )
    })
}

// An impossible literal shows up as the epoch.
pub(crate) fn demo_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

pub(crate) fn date_value(date: NaiveDate) -> rusqlite::types::Value {
    rusqlite::types::Value::Text(date.format("%Y-%m-%d").to_string())
}
