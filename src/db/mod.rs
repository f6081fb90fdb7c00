pub mod capability;
pub mod query;

use crate::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const FEATURE_SCHEMAS: &[(&str, &str, &str)] = &[
    ("orders", "orders", include_str!("schema/orders.sql")),
    ("payments", "payments", include_str!("schema/payments.sql")),
    ("accounting", "journal_lines", include_str!("schema/accounting.sql")),
    ("payroll", "payslips", include_str!("schema/payroll.sql")),
    ("suppliers", "suppliers", include_str!("schema/suppliers.sql")),
    ("banking", "bank_transactions", include_str!("schema/banking.sql")),
    ("tax", "tax_rates", include_str!("schema/tax.sql")),
    ("units", "units_of_measure", include_str!("schema/units.sql")),
];

pub fn feature_schema(feature: &str) -> Option<&'static str> {
    FEATURE_SCHEMAS
        .iter()
        .find(|(name, _, _)| *name == feature)
        .map(|(_, _, sql)| *sql)
}

pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURE_SCHEMAS.iter().map(|(name, _, _)| *name)
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn install_feature(&self, feature: &str) -> AppResult<&'static str> {
        let (_, table, sql) = FEATURE_SCHEMAS
            .iter()
            .find(|(name, _, _)| *name == feature)
            .ok_or_else(|| AppError::NotFound(format!("feature schema {feature}")))?;
        let conn = self.lock()?;
        conn.execute_batch(sql)?;
        tracing::info!(feature = %feature, table = %table, "feature schema installed");
        Ok(*table)
    }
}
