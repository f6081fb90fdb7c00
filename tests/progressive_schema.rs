use bizdesk_core_lib::features::accounting::{unbalanced_entries, JournalFilters};
use bizdesk_core_lib::features::banking::{BankFilters, Banking};
use bizdesk_core_lib::features::orders::{OrderFilters, Orders};
use bizdesk_core_lib::features::payments::PaymentFilters;
use bizdesk_core_lib::features::suppliers::{NewSupplier, SupplierFilters};
use bizdesk_core_lib::features::{Feature, ListParams};
use bizdesk_core_lib::{respond, BackendCore, Database, Money, Response, Settings, TenantId};

fn open_core() -> (tempfile::TempDir, BackendCore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        asset_root: dir.path().join("assets"),
        ..Settings::default()
    };
    let db = Database::new(&dir.path().join("data/bizdesk.db")).expect("database");
    (dir, BackendCore::new(db, settings))
}

fn tenant(raw: i64) -> TenantId {
    TenantId::new(raw).expect("tenant")
}

fn insert_order(core: &BackendCore, tenant_id: i64, number: &str, date: &str, status: &str, total: &str) {
    let conn = core.database().lock().expect("lock");
    conn.execute(
        "INSERT INTO orders (tenant_id, order_number, order_date, status, grand_total) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![tenant_id, number, date, status, total],
    )
    .expect("insert order");
}

#[test]
fn tenant_without_orders_table_gets_demo_orders() {
    let (_dir, core) = open_core();

    let listing = core.list_orders(tenant(42), &OrderFilters::default()).expect("listing");

    assert!(!listing.storage_ready);
    assert!(!listing.metrics.storage_ready);
    assert_eq!(listing.records, Orders::demo_rows());
    assert_eq!(listing.metrics.count("order_count"), listing.records.len() as i64);
    assert_eq!(listing.metrics.count("cancelled_count"), 1);
}

#[test]
fn live_orders_report_cancelled_metrics() {
    let (_dir, core) = open_core();
    core.install_feature("orders").expect("install");
    insert_order(&core, 7, "SO-7001", "2026-10-01", "open", "120.50");
    insert_order(&core, 7, "SO-7002", "2026-10-02", "cancelled", "500");
    insert_order(&core, 7, "SO-7003", "2026-10-03", "draft", "79.50");

    let listing = core.list_orders(tenant(7), &OrderFilters::default()).expect("listing");

    assert!(listing.storage_ready);
    assert_eq!(listing.records.len(), 3);
    assert_eq!(listing.records[0].order_number, "SO-7003");
    assert_eq!(listing.metrics.count("order_count"), 3);
    assert_eq!(listing.metrics.count("cancelled_count"), 1);
    assert_eq!(listing.metrics.count("open_count"), 1);
    assert_eq!(listing.metrics.count("draft_count"), 1);
    assert_eq!(listing.metrics.amount("total_value"), Money::from_units(700));
    assert_eq!(listing.metrics.amount("open_value"), Money::from_cents(12_050));

    let cancelled = listing
        .records
        .iter()
        .find(|row| row.status == "cancelled")
        .expect("cancelled order");
    assert_eq!(cancelled.grand_total, Money::from_units(500));
}

fn insert_payment(core: &BackendCore, tenant_id: i64, date: &str, direction: &str, method: &str, amount: &str) {
    let conn = core.database().lock().expect("lock");
    conn.execute(
        "INSERT INTO payments (tenant_id, payment_date, direction, method, amount) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![tenant_id, date, direction, method, amount],
    )
    .expect("insert payment");
}

fn insert_journal_line(core: &BackendCore, tenant_id: i64, entry: &str, account: &str, debit: &str, credit: &str) {
    let conn = core.database().lock().expect("lock");
    conn.execute(
        "INSERT INTO journal_lines (tenant_id, entry_number, entry_date, account_code, debit, credit)
         VALUES (?1, ?2, '2026-10-05', ?3, ?4, ?5)",
        rusqlite::params![tenant_id, entry, account, debit, credit],
    )
    .expect("insert journal line");
}

#[test]
fn live_payment_metrics_follow_the_listing_filters() {
    let (_dir, core) = open_core();
    core.install_feature("payments").expect("install");
    insert_payment(&core, 6, "2026-10-01", "incoming", "card", "120.00");
    insert_payment(&core, 6, "2026-10-02", "outgoing", "cash", "30.00");
    insert_payment(&core, 6, "2026-10-03", "outgoing", "bank_transfer", "20.00");
    insert_payment(&core, 6, "2026-10-04", "outgoing", "cheque", "5.00");
    insert_payment(&core, 99, "2026-10-04", "incoming", "card", "1000.00");

    let all = core.list_payments(tenant(6), &PaymentFilters::default()).expect("all payments");
    assert!(all.storage_ready);
    assert_eq!(all.records.len(), 4);
    assert_eq!(all.metrics.count("payment_count"), 4);
    assert_eq!(all.metrics.amount("incoming_total"), Money::from_units(120));
    assert_eq!(all.metrics.amount("outgoing_total"), Money::from_units(55));
    assert_eq!(all.metrics.amount("net_flow"), Money::from_units(65));
    assert_eq!(all.metrics.count("card_count"), 1);
    assert_eq!(all.metrics.count("cash_count"), 1);
    assert_eq!(all.metrics.count("bank_transfer_count"), 1);
    assert_eq!(all.metrics.count("other_count"), 1);

    let incoming = core
        .list_payments(
            tenant(6),
            &PaymentFilters {
                direction: Some("incoming".to_string()),
                ..PaymentFilters::default()
            },
        )
        .expect("incoming payments");
    assert_eq!(incoming.records.len(), 1);
    assert_eq!(incoming.metrics.count("payment_count"), 1);
    assert_eq!(incoming.metrics.amount("incoming_total"), Money::from_units(120));
    assert_eq!(incoming.metrics.amount("outgoing_total"), Money::ZERO);
    assert_eq!(incoming.metrics.amount("net_flow"), Money::from_units(120));
    assert_eq!(incoming.metrics.count("other_count"), 0);

    // Paging narrows the records but not the filtered set the metrics describe.
    let first_page = core
        .list_payments(
            tenant(6),
            &PaymentFilters {
                params: ListParams {
                    limit: Some(1),
                    ..ListParams::default()
                },
                ..PaymentFilters::default()
            },
        )
        .expect("first page");
    assert_eq!(first_page.records.len(), 1);
    assert_eq!(first_page.metrics.count("payment_count"), 4);
}

#[test]
fn live_ledger_reports_imbalance_for_the_filtered_lines() {
    let (_dir, core) = open_core();
    core.install_feature("accounting").expect("install");
    insert_journal_line(&core, 6, "JE-1", "1000", "100.00", "0");
    insert_journal_line(&core, 6, "JE-1", "4000", "0", "100.00");
    insert_journal_line(&core, 6, "JE-2", "6100", "40.00", "0");
    insert_journal_line(&core, 6, "JE-2", "1000", "0", "35.00");

    let all = core.list_journal_lines(tenant(6), &JournalFilters::default()).expect("ledger");
    assert_eq!(all.metrics.count("line_count"), 4);
    assert_eq!(all.metrics.amount("total_debit"), Money::from_units(140));
    assert_eq!(all.metrics.amount("total_credit"), Money::from_units(135));
    assert_eq!(all.metrics.amount("out_of_balance"), Money::from_units(5));
    assert_eq!(unbalanced_entries(&all.records), vec!["JE-2".to_string()]);

    let cash = core
        .list_journal_lines(
            tenant(6),
            &JournalFilters {
                account_code: Some("1000".to_string()),
                ..JournalFilters::default()
            },
        )
        .expect("cash lines");
    assert_eq!(cash.records.len(), 2);
    assert_eq!(cash.metrics.count("line_count"), 2);
    assert_eq!(cash.metrics.amount("total_debit"), Money::from_units(100));
    assert_eq!(cash.metrics.amount("total_credit"), Money::from_units(35));
    assert_eq!(cash.metrics.amount("out_of_balance"), Money::from_units(65));

    let balanced = core
        .list_journal_lines(
            tenant(6),
            &JournalFilters {
                entry_number: Some("JE-1".to_string()),
                ..JournalFilters::default()
            },
        )
        .expect("JE-1 lines");
    assert_eq!(balanced.metrics.count("line_count"), 2);
    assert_eq!(balanced.metrics.amount("out_of_balance"), Money::ZERO);
}

#[test]
fn empty_live_table_is_not_padded_with_demo_rows() {
    let (_dir, core) = open_core();
    core.install_feature("orders").expect("install");

    let listing = core.list_orders(tenant(3), &OrderFilters::default()).expect("listing");
    assert!(listing.storage_ready);
    assert!(listing.records.is_empty());
    assert_eq!(listing.metrics.count("order_count"), 0);
    assert_eq!(listing.metrics.amount("total_value"), Money::ZERO);
}

#[test]
fn tenants_never_see_each_others_rows() {
    let (_dir, core) = open_core();
    core.install_feature("orders").expect("install");
    insert_order(&core, 7, "SO-7001", "2026-10-01", "open", "10");
    insert_order(&core, 8, "SO-8001", "2026-10-01", "open", "20");
    insert_order(&core, 8, "SO-8002", "2026-10-02", "open", "30");

    let seven = core.list_orders(tenant(7), &OrderFilters::default()).expect("tenant 7");
    let eight = core.list_orders(tenant(8), &OrderFilters::default()).expect("tenant 8");

    assert_eq!(seven.records.len(), 1);
    assert_eq!(seven.records[0].order_number, "SO-7001");
    assert_eq!(eight.records.len(), 2);
    assert!(eight.records.iter().all(|row| row.order_number.starts_with("SO-8")));
}

#[test]
fn filters_search_and_paging_apply_to_live_rows() {
    let (_dir, core) = open_core();
    core.install_feature("orders").expect("install");
    insert_order(&core, 7, "SO-7001", "2026-10-01", "open", "10");
    insert_order(&core, 7, "SO-7002", "2026-10-02", "cancelled", "20");
    insert_order(&core, 7, "SO-7003", "2026-10-03", "open", "30");

    let open = core
        .list_orders(
            tenant(7),
            &OrderFilters {
                status: Some("open".to_string()),
                ..OrderFilters::default()
            },
        )
        .expect("open orders");
    assert_eq!(open.records.len(), 2);
    assert_eq!(open.metrics.count("order_count"), 2);
    assert_eq!(open.metrics.count("cancelled_count"), 0);
    assert_eq!(open.applied_filters, vec!["status:eq".to_string()]);
    assert!(open.ignored_filters.is_empty());

    let searched = core
        .list_orders(
            tenant(7),
            &OrderFilters {
                params: ListParams {
                    search: Some("7002".to_string()),
                    ..ListParams::default()
                },
                ..OrderFilters::default()
            },
        )
        .expect("search");
    assert_eq!(searched.records.len(), 1);
    assert_eq!(searched.records[0].order_number, "SO-7002");

    let second_page = core
        .list_orders(
            tenant(7),
            &OrderFilters {
                params: ListParams {
                    limit: Some(2),
                    offset: Some(2),
                    ..ListParams::default()
                },
                ..OrderFilters::default()
            },
        )
        .expect("page");
    assert_eq!(second_page.records.len(), 1);
    assert_eq!(second_page.records[0].order_number, "SO-7001");
}

#[test]
fn filters_on_missing_optional_columns_are_reported_as_ignored() {
    let (_dir, core) = open_core();
    {
        let conn = core.database().lock().expect("lock");
        conn.execute_batch(
            "CREATE TABLE bank_transactions (
                id INTEGER PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                account_name TEXT NOT NULL,
                transaction_date TEXT NOT NULL,
                description TEXT NOT NULL,
                amount NUMERIC NOT NULL
            );
            INSERT INTO bank_transactions (tenant_id, account_name, transaction_date, description, amount)
            VALUES (5, 'Operating', '2026-10-04', 'Opening deposit', 250.00);",
        )
        .expect("legacy schema");
    }

    let listing = core
        .list_bank_transactions(
            tenant(5),
            &BankFilters {
                reconciled: Some(false),
                ..BankFilters::default()
            },
        )
        .expect("listing");

    assert!(listing.storage_ready);
    assert_eq!(listing.records.len(), 1);
    assert!(!listing.records[0].reconciled);
    assert_eq!(listing.records[0].reference, None);
    assert_eq!(listing.ignored_filters, vec!["reconciled:eq".to_string()]);
    assert_eq!(listing.metrics.amount("balance"), Money::from_units(250));
}

#[test]
fn schema_changes_outside_the_core_need_a_cache_refresh() {
    let (_dir, core) = open_core();
    assert!(!core.storage_ready::<Banking>().expect("capability check"));

    {
        let conn = core.database().lock().expect("lock");
        conn.execute_batch(bizdesk_core_lib::db::feature_schema("banking").expect("banking schema"))
            .expect("schema");
    }
    assert!(!core.storage_ready::<Banking>().expect("cached check"));

    core.refresh_capabilities();
    assert!(core.storage_ready::<Banking>().expect("fresh check"));
    assert_eq!(Banking::TABLE, "bank_transactions");
}

#[test]
fn supplier_creation_goes_through_the_request_boundary() {
    let (_dir, core) = open_core();
    let input = NewSupplier {
        code: "BRS".to_string(),
        name: "Blue Ridge Supply".to_string(),
        email: "ap@blueridge.test".to_string(),
        ..NewSupplier::default()
    };

    let not_ready = respond("create_supplier", tenant(4), || core.create_supplier(tenant(4), &input));
    assert!(matches!(not_ready, Response::Failed { .. }));

    core.install_feature("suppliers").expect("install");
    let created = respond("create_supplier", tenant(4), || core.create_supplier(tenant(4), &input));
    let created = created.data().expect("created supplier");
    assert_eq!(created.code, "BRS");

    let duplicate = respond("create_supplier", tenant(4), || core.create_supplier(tenant(4), &input));
    match duplicate {
        Response::Invalid { errors } => {
            assert!(errors.has("code"));
            assert_eq!(errors.submitted["name"], "Blue Ridge Supply");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let missing = respond("get_supplier", tenant(4), || {
        core.get::<bizdesk_core_lib::features::suppliers::Suppliers>(tenant(4), 999)
    });
    assert!(matches!(missing, Response::NotFound { .. }));
}

#[test]
fn live_suppliers_are_listed_alphabetically() {
    let (_dir, core) = open_core();
    core.install_feature("suppliers").expect("install");
    for (code, name) in [("HFL", "Harbor Freight Logistics"), ("ZEN", "Zenith Parts"), ("ACM", "Acme Tools")] {
        let input = NewSupplier {
            code: code.to_string(),
            name: name.to_string(),
            ..NewSupplier::default()
        };
        core.create_supplier(tenant(4), &input).expect("create supplier");
    }

    let listing = core.list_suppliers(tenant(4), &SupplierFilters::default()).expect("suppliers");
    let names: Vec<&str> = listing.records.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["Acme Tools", "Harbor Freight Logistics", "Zenith Parts"]);
    assert_eq!(listing.metrics.count("supplier_count"), 3);
}
