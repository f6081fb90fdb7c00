use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityKey {
    Table(String),
    Column(String, String),
}

impl CapabilityKey {
    pub fn table(name: &str) -> Self {
        Self::Table(name.to_ascii_lowercase())
    }

    pub fn column(table: &str, column: &str) -> Self {
        Self::Column(table.to_ascii_lowercase(), column.to_ascii_lowercase())
    }

    fn table_name(&self) -> &str {
        match self {
            Self::Table(table) | Self::Column(table, _) => table,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    present: bool,
    observed_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

// Answers about schema shape, shared across requests. Entries only change when
// the schema does, so an entry is trusted until the TTL (if any) runs out or
// someone invalidates it after a migration.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<CapabilityKey, CacheEntry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &CapabilityKey) -> Option<bool> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let found = entries.get(key).and_then(|entry| {
            let fresh = self
                .ttl
                .map(|ttl| entry.observed_at.elapsed() < ttl)
                .unwrap_or(true);
            fresh.then_some(entry.present)
        });
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: CapabilityKey, present: bool) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key,
            CacheEntry {
                present,
                observed_at: Instant::now(),
            },
        );
    }

    pub fn invalidate_all(&self) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.clear();
    }

    pub fn invalidate_table(&self, table: &str) {
        let table = table.to_ascii_lowercase();
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|key, _| key.table_name() != table);
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

// Run-time schema inspection for one connection. Never fails: anything that
// goes wrong while inspecting reads as "absent".
pub struct SchemaProber<'a> {
    conn: &'a Connection,
    cache: &'a CapabilityCache,
}

impl<'a> SchemaProber<'a> {
    pub fn new(conn: &'a Connection, cache: &'a CapabilityCache) -> Self {
        Self { conn, cache }
    }

    pub fn has_table(&self, table: &str) -> bool {
        let key = CapabilityKey::table(table);
        if let Some(present) = self.cache.get(&key) {
            return present;
        }
        let present = match inspect_table(self.conn, table) {
            Ok(present) => present,
            Err(error) => {
                tracing::warn!(table = %table, error = %error, "table inspection failed; treating as absent");
                false
            }
        };
        self.cache.insert(key, present);
        present
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        let key = CapabilityKey::column(table, column);
        if let Some(present) = self.cache.get(&key) {
            return present;
        }
        let present = match inspect_column(self.conn, table, column) {
            Ok(present) => present,
            Err(error) => {
                tracing::warn!(
                    table = %table,
                    column = %column,
                    error = %error,
                    "column inspection failed; treating as absent"
                );
                false
            }
        };
        self.cache.insert(key, present);
        present
    }

    pub fn has_columns(&self, table: &str, columns: &[&str]) -> bool {
        self.has_table(table) && columns.iter().all(|column| self.has_column(table, column))
    }
}

fn inspect_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn inspect_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
