// Column and table names only come from feature descriptors; caller input
// travels as bind values.

use crate::db::capability::SchemaProber;
use crate::models::TenantId;
use rusqlite::types::Value;
use rusqlite::Connection;

pub const TENANT_COLUMN: &str = "tenant_id";
pub const TIEBREAK_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl Comparator {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "LIKE",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub comparator: Comparator,
    pub value: Value,
}

impl Filter {
    pub fn new(field: &'static str, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            field,
            comparator,
            value: value.into(),
        }
    }

    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self::new(field, Comparator::Eq, value)
    }

    pub fn describe(&self) -> String {
        format!("{}:{}", self.field, self.comparator.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub term: String,
    pub columns: &'static [&'static str],
}

impl Search {
    pub fn describe(&self) -> String {
        format!("search:{}", self.columns.join("|"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub table: &'static str,
    pub required_columns: &'static [&'static str],
    pub optional_columns: &'static [&'static str],
    pub tenant: TenantId,
    pub filters: Vec<Filter>,
    pub search: Option<Search>,
    pub order_by: &'static str,
    pub direction: Direction,
    pub limit: u32,
    pub offset: u32,
}

impl QuerySpec {
    pub fn new(table: &'static str, tenant: TenantId) -> Self {
        Self {
            table,
            required_columns: &[],
            optional_columns: &[],
            tenant,
            filters: Vec::new(),
            search: None,
            order_by: TIEBREAK_COLUMN,
            direction: Direction::Desc,
            limit: crate::config::MAX_ROW_LIMIT,
            offset: 0,
        }
    }
}

// `tenant_id = ?` followed by every confirmed filter and the search, without
// ordering or paging. Shared by the row query and SQL aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl WhereClause {
    pub fn tenant_only(tenant: TenantId) -> Self {
        Self {
            sql: format!("{TENANT_COLUMN} = ?"),
            binds: vec![Value::Integer(tenant.get())],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub binds: Vec<Value>,
    pub scope: WhereClause,
    pub applied_filters: Vec<String>,
    pub ignored_filters: Vec<String>,
}

impl BuiltQuery {
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    pub fn fetch<T, F>(&self, conn: &Connection, map: F) -> rusqlite::Result<Vec<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let mut statement = conn.prepare(&self.sql)?;
        let rows = statement.query_map(rusqlite::params_from_iter(self.binds.iter()), map)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

pub struct QueryBuilder;

impl QueryBuilder {
    pub fn build(spec: &QuerySpec, prober: &SchemaProber<'_>) -> BuiltQuery {
        let table = spec.table;

        let mut select = Vec::with_capacity(spec.required_columns.len() + spec.optional_columns.len());
        select.extend(spec.required_columns.iter().map(|column| column.to_string()));
        for column in spec.optional_columns {
            if prober.has_column(table, column) {
                select.push(column.to_string());
            } else {
                select.push(format!("NULL AS {column}"));
            }
        }
        if select.is_empty() {
            select.push("*".to_string());
        }

        let mut scope = WhereClause::tenant_only(spec.tenant);
        let mut applied_filters = Vec::new();
        let mut ignored_filters = Vec::new();

        for filter in &spec.filters {
            if !prober.has_column(table, filter.field) {
                ignored_filters.push(filter.describe());
                continue;
            }
            match filter.comparator {
                Comparator::Contains => {
                    scope.sql.push_str(&format!(" AND {} LIKE ? ESCAPE '\\'", filter.field));
                    scope
                        .binds
                        .push(Value::Text(contains_pattern(&value_text(&filter.value))));
                }
                comparator => {
                    scope
                        .sql
                        .push_str(&format!(" AND {} {} ?", filter.field, comparator.sql()));
                    scope.binds.push(filter.value.clone());
                }
            }
            applied_filters.push(filter.describe());
        }

        if let Some(search) = &spec.search {
            let columns: Vec<&str> = search
                .columns
                .iter()
                .copied()
                .filter(|column| prober.has_column(table, column))
                .collect();
            if columns.is_empty() {
                ignored_filters.push(search.describe());
            } else {
                let pattern = contains_pattern(&search.term);
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                    .collect();
                scope.sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
                scope
                    .binds
                    .extend(columns.iter().map(|_| Value::Text(pattern.clone())));
                applied_filters.push(search.describe());
            }
        }

        let mut sql = format!("SELECT {} FROM {table} WHERE {}", select.join(", "), scope.sql);
        let mut binds = scope.binds.clone();

        let direction = spec.direction.sql();
        if spec.order_by != TIEBREAK_COLUMN && prober.has_column(table, spec.order_by) {
            sql.push_str(&format!(" ORDER BY {} {direction}, {TIEBREAK_COLUMN} {direction}", spec.order_by));
        } else {
            sql.push_str(&format!(" ORDER BY {TIEBREAK_COLUMN} {direction}"));
        }

        let limit = spec.limit.clamp(1, crate::config::MAX_ROW_LIMIT);
        sql.push_str(" LIMIT ? OFFSET ?");
        binds.push(Value::Integer(i64::from(limit)));
        binds.push(Value::Integer(i64::from(spec.offset)));

        BuiltQuery {
            sql,
            binds,
            scope,
            applied_filters,
            ignored_filters,
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

// `%term%` with LIKE metacharacters escaped by a backslash.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
