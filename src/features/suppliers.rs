use super::{Feature, ListParams};
use crate::db::capability::SchemaProber;
use crate::db::query::{Direction, Filter};
use crate::errors::{AppError, AppResult, ValidationErrors};
use crate::metrics::{Buckets, MetricSet};
use crate::models::TenantId;
use crate::validation::{is_valid_code, is_valid_email};
use rusqlite::types::Value;
use rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const SUPPLIER_STATUSES: &[&str] = &["active", "inactive"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub status: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupplierFilters {
    pub status: Option<String>,
    #[serde(flatten)]
    pub params: ListParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSupplier {
    pub code: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_number: String,
}

pub struct Suppliers;

impl Feature for Suppliers {
    type Row = SupplierRow;
    type Filters = SupplierFilters;

    const NAME: &'static str = "suppliers";
    const TABLE: &'static str = "suppliers";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["id", "tenant_id", "code", "name", "status"];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["email", "phone", "tax_number"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "name", "email"];
    const ORDER_COLUMN: &'static str = "name";
    const ORDER_DIRECTION: Direction = Direction::Asc;

    fn params(filters: &SupplierFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &SupplierFilters) -> Vec<Filter> {
        filters
            .status
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|status| vec![Filter::eq("status", status.to_string())])
            .unwrap_or_default()
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SupplierRow> {
        Ok(SupplierRow {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            status: row.get("status")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            tax_number: row.get("tax_number")?,
        })
    }

    fn row_id(row: &SupplierRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<SupplierRow> {
        let supplier = |id: i64, code: &str, name: &str, status: &str, email: &str| SupplierRow {
            id,
            code: code.to_string(),
            name: name.to_string(),
            status: status.to_string(),
            email: Some(email.to_string()),
            phone: None,
            tax_number: None,
        };
        vec![
            supplier(1, "SUP-001", "Blue Ridge Supply", "active", "billing@blueridge.test"),
            supplier(2, "SUP-002", "Harbor Freight Logistics", "active", "dispatch@harborfreight.test"),
            supplier(3, "SUP-003", "Office Depot", "inactive", "orders@officedepot.test"),
        ]
    }

    fn summarize(rows: &[SupplierRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut statuses = Buckets::new(SUPPLIER_STATUSES);
        for row in rows {
            statuses.record(&row.status);
        }
        metrics.set_count("supplier_count", rows.len() as i64);
        statuses.write_counts(&mut metrics);
        metrics
    }
}

pub fn create_supplier(
    conn: &Connection,
    prober: &SchemaProber<'_>,
    tenant: TenantId,
    input: &NewSupplier,
) -> AppResult<SupplierRow> {
    if !super::storage_ready::<Suppliers>(prober) {
        return Err(AppError::StorageNotReady(Suppliers::NAME.to_string()));
    }

    let submitted = serde_json::to_value(input)?;
    let mut errors = ValidationErrors::new(submitted);
    let code = input.code.trim();
    let name = input.name.trim();
    let email = input.email.trim();

    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if code.is_empty() {
        errors.add("code", "Code is required");
    } else if !is_valid_code(code) {
        errors.add("code", "Use up to 32 letters, digits, dots, dashes or underscores");
    } else if code_taken(conn, tenant, code)? {
        errors.add("code", "A supplier with this code already exists");
    }
    if !email.is_empty() && !is_valid_email(email) {
        errors.add("email", "Enter a valid email address");
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut columns = vec!["tenant_id", "code", "name", "status"];
    let mut values = vec![
        Value::Integer(tenant.get()),
        Value::Text(code.to_string()),
        Value::Text(name.to_string()),
        Value::Text("active".to_string()),
    ];
    let optional = [
        ("email", email),
        ("phone", input.phone.trim()),
        ("tax_number", input.tax_number.trim()),
    ];
    for (column, value) in optional {
        if !value.is_empty() && prober.has_column(Suppliers::TABLE, column) {
            columns.push(column);
            values.push(Value::Text(value.to_string()));
        }
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        Suppliers::TABLE,
        columns.join(", ")
    );
    match conn.execute(&sql, rusqlite::params_from_iter(values.iter())) {
        Ok(_) => {}
        // A concurrent insert can still win the race past `code_taken`.
        Err(rusqlite::Error::SqliteFailure(failure, _)) if failure.extended_code == SQLITE_CONSTRAINT_UNIQUE => {
            let mut errors = ValidationErrors::new(serde_json::to_value(input)?);
            errors.add("code", "A supplier with this code already exists");
            return Err(AppError::Validation(errors));
        }
        Err(error) => return Err(error.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(tenant = %tenant, supplier_id = id, code = %code, "supplier created");

    let stored = |column: &str, value: &str| {
        (!value.is_empty() && prober.has_column(Suppliers::TABLE, column)).then(|| value.to_string())
    };
    Ok(SupplierRow {
        id,
        code: code.to_string(),
        name: name.to_string(),
        status: "active".to_string(),
        email: stored("email", email),
        phone: stored("phone", input.phone.trim()),
        tax_number: stored("tax_number", input.tax_number.trim()),
    })
}

fn code_taken(conn: &Connection, tenant: TenantId, code: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM suppliers WHERE tenant_id = ?1 AND code = ?2",
        rusqlite::params![tenant, code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::capability::CapabilityCache;

    fn tenant(raw: i64) -> TenantId {
        TenantId::new(raw).expect("tenant")
    }

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().expect("db");
        conn.execute_batch(
            "CREATE TABLE suppliers (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               tenant_id INTEGER NOT NULL,
               code TEXT NOT NULL,
               name TEXT NOT NULL,
               status TEXT NOT NULL,
               email TEXT,
               UNIQUE (tenant_id, code)
             );",
        )
        .expect("schema");
        conn
    }

    fn input(code: &str) -> NewSupplier {
        NewSupplier {
            code: code.to_string(),
            name: "Blue Ridge Supply".to_string(),
            email: "billing@blueridge.test".to_string(),
            phone: "555-0142".to_string(),
            ..NewSupplier::default()
        }
    }

    #[test]
    fn creates_supplier_and_skips_missing_optional_columns() {
        let conn = connection();
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);

        let created = create_supplier(&conn, &prober, tenant(1), &input("SUP-001")).expect("created");
        assert_eq!(created.status, "active");
        assert_eq!(created.email.as_deref(), Some("billing@blueridge.test"));
        assert_eq!(created.phone, None);
    }

    #[test]
    fn duplicate_code_is_a_field_error_per_tenant() {
        let conn = connection();
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);

        create_supplier(&conn, &prober, tenant(1), &input("SUP-001")).expect("first");
        create_supplier(&conn, &prober, tenant(2), &input("SUP-001")).expect("other tenant may reuse code");

        match create_supplier(&conn, &prober, tenant(1), &input("SUP-001")) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("code"));
                assert_eq!(errors.submitted["code"], "SUP-001");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_fields_are_collected_together() {
        let conn = connection();
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);

        let bad = NewSupplier {
            code: String::new(),
            name: "  ".to_string(),
            email: "not-an-email".to_string(),
            ..NewSupplier::default()
        };
        match create_supplier(&conn, &prober, tenant(1), &bad) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("code"));
                assert!(errors.has("name"));
                assert!(errors.has("email"));
                assert_eq!(errors.submitted["email"], "not-an-email");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unique_violation_from_legacy_index_is_a_code_error() {
        let conn = Connection::open_in_memory().expect("db");
        conn.execute_batch(
            "CREATE TABLE suppliers (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               tenant_id INTEGER NOT NULL,
               code TEXT NOT NULL UNIQUE,
               name TEXT NOT NULL,
               status TEXT NOT NULL
             );",
        )
        .expect("schema");
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);

        create_supplier(&conn, &prober, tenant(1), &input("SUP-001")).expect("first");
        match create_supplier(&conn, &prober, tenant(2), &input("SUP-001")) {
            Err(AppError::Validation(errors)) => assert!(errors.has("code")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn other_constraint_failures_are_not_reported_as_duplicates() {
        let conn = Connection::open_in_memory().expect("db");
        conn.execute_batch(
            "CREATE TABLE suppliers (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               tenant_id INTEGER NOT NULL,
               code TEXT NOT NULL,
               name TEXT NOT NULL,
               status TEXT NOT NULL,
               region TEXT NOT NULL
             );",
        )
        .expect("schema");
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);

        let result = create_supplier(&conn, &prober, tenant(1), &input("SUP-001"));
        assert!(matches!(result, Err(AppError::Internal(_))), "got {result:?}");
    }

    #[test]
    fn demo_suppliers_are_listed_by_name() {
        let names: Vec<String> = Suppliers::demo_rows().into_iter().map(|row| row.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn missing_table_is_storage_not_ready() {
        let conn = Connection::open_in_memory().expect("db");
        let cache = CapabilityCache::new();
        let prober = SchemaProber::new(&conn, &cache);
        let result = create_supplier(&conn, &prober, tenant(1), &input("SUP-001"));
        assert!(matches!(result, Err(AppError::StorageNotReady(_))));
    }
}
