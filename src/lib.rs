pub mod assets;
pub mod config;
pub mod db;
pub mod errors;
pub mod features;
pub mod metrics;
pub mod models;
pub mod validation;

pub use crate::assets::AssetStore;
pub use crate::config::Settings;
pub use crate::db::capability::{CapabilityCache, SchemaProber};
pub use crate::db::Database;
pub use crate::errors::{respond, AppError, AppResult, Response, ValidationErrors};
pub use crate::features::{DataSource, Feature, ListParams};
pub use crate::metrics::{MetricSet, MetricValue};
pub use crate::models::{AssetRef, DocumentMeta, IdentityRecord, Listing, Money, TenantId};

use crate::features::accounting::{GeneralLedger, JournalFilters, JournalLineRow};
use crate::features::banking::{BankFilters, BankTransactionRow, Banking};
use crate::features::orders::{OrderFilters, OrderRow, Orders};
use crate::features::payments::{PaymentFilters, PaymentRow, Payments};
use crate::features::payroll::{Payroll, PayrollFilters, PayrollRow};
use crate::features::suppliers::{NewSupplier, SupplierFilters, SupplierRow, Suppliers};
use crate::features::tax::{TaxFilters, TaxRateRow, TaxRates};
use crate::features::units::{UnitFilters, UnitRow, UnitsOfMeasure};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub struct BackendCore {
    db: Database,
    capabilities: Arc<CapabilityCache>,
    settings: Settings,
    assets: AssetStore,
}

impl BackendCore {
    pub fn new(db: Database, settings: Settings) -> Self {
        let capabilities = Arc::new(CapabilityCache::with_ttl(settings.capability_ttl()));
        Self::with_cache(db, settings, capabilities)
    }

    // Cache keys are table and column names only, so cores sharing a cache
    // must point at the same database.
    pub fn with_cache(db: Database, settings: Settings, capabilities: Arc<CapabilityCache>) -> Self {
        let assets = AssetStore::new(&settings);
        Self {
            db,
            capabilities,
            settings,
            assets,
        }
    }

    pub fn open(db_path: &Path, settings: Settings) -> AppResult<Self> {
        let db = Database::new(db_path)?;
        tracing::info!(path = %db_path.to_string_lossy(), "backend core opened");
        Ok(Self::new(db, settings))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn capabilities(&self) -> &Arc<CapabilityCache> {
        &self.capabilities
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn storage_ready<F: Feature + 'static>(&self) -> AppResult<bool> {
        let conn = self.db.lock()?;
        let prober = SchemaProber::new(&conn, &self.capabilities);
        Ok(features::storage_ready::<F>(&prober))
    }

    pub fn list<F: Feature + 'static>(&self, tenant: TenantId, filters: &F::Filters) -> AppResult<Listing<F::Row>> {
        let conn = self.db.lock()?;
        let source = features::select_source::<F>(&conn, SchemaProber::new(&conn, &self.capabilities), &self.settings);
        let listing = source.list(tenant, filters)?;
        Ok(listing)
    }

    pub fn get<F: Feature + 'static>(&self, tenant: TenantId, id: i64) -> AppResult<F::Row> {
        let conn = self.db.lock()?;
        let source = features::select_source::<F>(&conn, SchemaProber::new(&conn, &self.capabilities), &self.settings);
        let found = source.find(tenant, id)?;
        found.ok_or_else(|| AppError::NotFound(format!("{} record {id}", F::NAME)))
    }

    pub fn list_orders(&self, tenant: TenantId, filters: &OrderFilters) -> AppResult<Listing<OrderRow>> {
        self.list::<Orders>(tenant, filters)
    }

    pub fn list_payments(&self, tenant: TenantId, filters: &PaymentFilters) -> AppResult<Listing<PaymentRow>> {
        self.list::<Payments>(tenant, filters)
    }

    pub fn list_journal_lines(&self, tenant: TenantId, filters: &JournalFilters) -> AppResult<Listing<JournalLineRow>> {
        self.list::<GeneralLedger>(tenant, filters)
    }

    pub fn list_payslips(&self, tenant: TenantId, filters: &PayrollFilters) -> AppResult<Listing<PayrollRow>> {
        self.list::<Payroll>(tenant, filters)
    }

    pub fn list_suppliers(&self, tenant: TenantId, filters: &SupplierFilters) -> AppResult<Listing<SupplierRow>> {
        self.list::<Suppliers>(tenant, filters)
    }

    pub fn list_bank_transactions(
        &self,
        tenant: TenantId,
        filters: &BankFilters,
    ) -> AppResult<Listing<BankTransactionRow>> {
        self.list::<Banking>(tenant, filters)
    }

    pub fn list_tax_rates(&self, tenant: TenantId, filters: &TaxFilters) -> AppResult<Listing<TaxRateRow>> {
        self.list::<TaxRates>(tenant, filters)
    }

    pub fn list_units(&self, tenant: TenantId, filters: &UnitFilters) -> AppResult<Listing<UnitRow>> {
        self.list::<UnitsOfMeasure>(tenant, filters)
    }

    pub fn create_supplier(&self, tenant: TenantId, input: &NewSupplier) -> AppResult<SupplierRow> {
        let conn = self.db.lock()?;
        let prober = SchemaProber::new(&conn, &self.capabilities);
        features::suppliers::create_supplier(&conn, &prober, tenant, input)
    }

    pub fn install_feature(&self, feature: &str) -> AppResult<()> {
        let table = self.db.install_feature(feature)?;
        self.capabilities.invalidate_table(table);
        Ok(())
    }

    pub fn refresh_capabilities(&self) {
        self.capabilities.invalidate_all();
        tracing::info!("schema capability cache cleared");
    }
}

// Installs JSON logging to a daily-rolling file under `log_dir`. The filter
// comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.to_string_lossy()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "bizdesk.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error.to_string()))
        .context("failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> (tempfile::TempDir, BackendCore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            asset_root: dir.path().join("assets"),
            ..Settings::default()
        };
        let core = BackendCore::new(Database::open_in_memory().expect("db"), settings);
        (dir, core)
    }

    #[test]
    fn install_feature_switches_listing_to_live_storage() {
        let (_dir, core) = core();
        let tenant = TenantId::new(1).expect("tenant");

        assert!(!core.storage_ready::<Payroll>().expect("capability check"));
        assert!(!core.list_payslips(tenant, &PayrollFilters::default()).expect("demo").storage_ready);

        core.install_feature("payroll").expect("install");
        assert!(core.storage_ready::<Payroll>().expect("capability check"));
        let listing = core.list_payslips(tenant, &PayrollFilters::default()).expect("live");
        assert!(listing.storage_ready);
        assert!(listing.records.is_empty());
    }

    #[test]
    fn get_maps_missing_rows_to_not_found() {
        let (_dir, core) = core();
        let tenant = TenantId::new(1).expect("tenant");
        let demo = core.get::<Orders>(tenant, 1).expect("demo order");
        assert_eq!(demo.id, 1);

        core.install_feature("orders").expect("install");
        assert!(matches!(core.get::<Orders>(tenant, 1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn cores_on_one_database_share_capability_verdicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("bizdesk.db");
        let settings = Settings {
            asset_root: dir.path().join("assets"),
            ..Settings::default()
        };
        let cache = Arc::new(CapabilityCache::new());
        let writer = BackendCore::with_cache(Database::new(&db_path).expect("db"), settings.clone(), cache.clone());
        let reader = BackendCore::with_cache(Database::new(&db_path).expect("db"), settings, cache);

        assert!(!reader.storage_ready::<Payroll>().expect("capability check"));
        writer.install_feature("payroll").expect("install");
        assert!(reader.storage_ready::<Payroll>().expect("cached check"));
    }

    #[test]
    fn init_tracing_creates_log_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_dir = dir.path().join("logs");
        // A subscriber may already be installed by another test; only the directory matters here.
        let _ = init_tracing(&log_dir);
        assert!(log_dir.is_dir());
    }
}
