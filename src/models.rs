use crate::errors::{AppError, AppResult};
use crate::metrics::MetricSet;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(i64);

impl TenantId {
    pub fn new(raw: i64) -> AppResult<Self> {
        if raw <= 0 {
            return Err(AppError::Precondition(format!(
                "tenant id must be a positive integer, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn dir_name(self) -> String {
        format!("tenant_{}", self.0)
    }
}

impl TryFrom<i64> for TenantId {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for i64 {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for TenantId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

// Currency amount held in minor units (cents). Sums never go through floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    // Parses a plain decimal string such as `"1250"`, `"-3.5"` or `"19.999"`.
    // Digits past the second decimal place are rounded half away from zero.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|ch| ch.is_ascii_digit()) || !fraction.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }

        let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut fraction_digits = fraction.bytes().map(|byte| i64::from(byte - b'0'));
        let tenths = fraction_digits.next().unwrap_or(0);
        let hundredths = fraction_digits.next().unwrap_or(0);
        let round_up = fraction_digits.next().unwrap_or(0) >= 5;

        let mut cents = whole_value.checked_mul(100)?.checked_add(tenths * 10 + hundredths)?;
        if round_up {
            cents = cents.checked_add(1)?;
        }
        Some(Self(if negative { -cents } else { cents }))
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents < i64::MIN as f64 || cents > i64::MAX as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Money::ZERO),
            ValueRef::Integer(units) => units
                .checked_mul(100)
                .map(Money)
                .ok_or(FromSqlError::OutOfRange(units)),
            ValueRef::Real(value) => Money::from_f64(value).ok_or(FromSqlError::InvalidType),
            ValueRef::Text(raw) => {
                let text = std::str::from_utf8(raw).map_err(|error| FromSqlError::Other(Box::new(error)))?;
                Money::parse(text).ok_or(FromSqlError::InvalidType)
            }
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing<T> {
    pub records: Vec<T>,
    pub metrics: MetricSet,
    pub storage_ready: bool,
    pub applied_filters: Vec<String>,
    pub ignored_filters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Logo,
    Identity,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub tenant: TenantId,
    pub kind: AssetKind,
    pub directory: PathBuf,
    pub path: Option<PathBuf>,
}

impl AssetRef {
    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_ref()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
    }

    pub fn url(&self, public_prefix: &str) -> Option<String> {
        let file_name = self.file_name()?;
        let prefix = public_prefix.trim_end_matches('/');
        let segment = match self.kind {
            AssetKind::Logo => "logo/",
            AssetKind::Document => "documents/",
            AssetKind::Identity => "",
        };
        Some(format!("{prefix}/{}/{segment}{file_name}", self.tenant.dir_name()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRecord {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

impl IdentityRecord {
    pub fn merged_over(&self, fallback: &IdentityRecord) -> IdentityRecord {
        fn pick(stored: &str, fallback: &str) -> String {
            if stored.trim().is_empty() {
                fallback.to_string()
            } else {
                stored.to_string()
            }
        }

        IdentityRecord {
            name: pick(&self.name, &fallback.name),
            address: pick(&self.address, &fallback.address),
            phone: pick(&self.phone, &fallback.phone),
            email: pick(&self.email, &fallback.email),
        }
    }

    pub fn trimmed(&self) -> IdentityRecord {
        IdentityRecord {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub media_type: &'static str,
    pub url: String,
}
