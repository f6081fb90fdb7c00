use super::{date_column, date_value, demo_date, Feature, ListParams};
use crate::db::query::{Comparator, Filter};
use crate::metrics::{period_label_for, Buckets, MetricSet};
use crate::models::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PAYSLIP_STATUSES: &[&str] = &["draft", "approved", "paid"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRow {
    pub id: i64,
    pub employee_name: String,
    pub pay_date: NaiveDate,
    pub status: String,
    pub gross_pay: Money,
    pub deductions: Money,
    pub overtime: Money,
    pub net_pay: Money,
    pub employee_code: Option<String>,
}

impl PayrollRow {
    pub fn expected_net(&self) -> Money {
        self.gross_pay - self.deductions + self.overtime
    }

    pub fn is_consistent(&self) -> bool {
        self.net_pay == self.expected_net()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollFilters {
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(flatten)]
    pub params: ListParams,
}

pub struct Payroll;

impl Feature for Payroll {
    type Row = PayrollRow;
    type Filters = PayrollFilters;

    const NAME: &'static str = "payroll";
    const TABLE: &'static str = "payslips";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "employee_name",
        "pay_date",
        "status",
        "gross_pay",
        "deductions",
        "net_pay",
    ];
    const OPTIONAL_COLUMNS: &'static [&'static str] = &["overtime", "employee_code"];
    const SEARCH_COLUMNS: &'static [&'static str] = &["employee_name", "employee_code"];
    const ORDER_COLUMN: &'static str = "pay_date";

    fn params(filters: &PayrollFilters) -> &ListParams {
        &filters.params
    }

    fn filters(filters: &PayrollFilters) -> Vec<Filter> {
        let mut out = Vec::new();
        if let Some(status) = filters.status.as_deref().filter(|value| !value.is_empty()) {
            out.push(Filter::eq("status", status.to_string()));
        }
        if let Some(from) = filters.date_from {
            out.push(Filter::new("pay_date", Comparator::Gte, date_value(from)));
        }
        if let Some(to) = filters.date_to {
            out.push(Filter::new("pay_date", Comparator::Lte, date_value(to)));
        }
        out
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PayrollRow> {
        Ok(PayrollRow {
            id: row.get("id")?,
            employee_name: row.get("employee_name")?,
            pay_date: date_column(row, "pay_date")?,
            status: row.get("status")?,
            gross_pay: row.get("gross_pay")?,
            deductions: row.get("deductions")?,
            overtime: row.get("overtime")?,
            net_pay: row.get("net_pay")?,
            employee_code: row.get("employee_code")?,
        })
    }

    fn row_id(row: &PayrollRow) -> i64 {
        row.id
    }

    fn demo_rows() -> Vec<PayrollRow> {
        let payday = demo_date(2026, 9, 30);
        let slip = |id: i64, name: &str, code: &str, status: &str, gross: i64, deductions: i64, overtime: i64| {
            let gross_pay = Money::from_cents(gross);
            let deductions = Money::from_cents(deductions);
            let overtime = Money::from_cents(overtime);
            PayrollRow {
                id,
                employee_name: name.to_string(),
                pay_date: payday,
                status: status.to_string(),
                gross_pay,
                deductions,
                overtime,
                net_pay: gross_pay - deductions + overtime,
                employee_code: Some(code.to_string()),
            }
        };
        vec![
            slip(3, "Priya Natarajan", "EMP-003", "draft", 410_000, 98_400, 0),
            slip(2, "Marcus Oyelaran", "EMP-002", "approved", 365_000, 82_125, 27_375),
            slip(1, "Elena Sokolova", "EMP-001", "paid", 520_000, 135_200, 19_500),
        ]
    }

    fn summarize(rows: &[PayrollRow]) -> MetricSet {
        let mut metrics = MetricSet::default();
        let mut statuses = Buckets::new(PAYSLIP_STATUSES);
        for row in rows {
            statuses.record(&row.status);
        }
        metrics.set_count("payslip_count", rows.len() as i64);
        statuses.write_counts(&mut metrics);
        metrics.set_amount("gross_total", rows.iter().map(|row| row.gross_pay).sum());
        metrics.set_amount("deductions_total", rows.iter().map(|row| row.deductions).sum());
        metrics.set_amount("overtime_total", rows.iter().map(|row| row.overtime).sum());
        metrics.set_amount("net_total", rows.iter().map(|row| row.net_pay).sum());
        metrics.period_label = rows.iter().map(|row| row.pay_date).max().map(period_label_for);
        metrics
    }
}
