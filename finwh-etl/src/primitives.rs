use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Surrogate key of the date dimension: the calendar date encoded as `YYYYMMDD`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct DateId(i32);

impl DateId {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl From<NaiveDate> for DateId {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl std::fmt::Display for DateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier supplied by the source system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loan identifier supplied by the source system.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct LoanSourceId(String);

impl LoanSourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LoanSourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LoanSourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LoanSourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Warehouse-generated key of a loan row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct LoanId(i64);

impl LoanId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for LoanId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of record collections a batch envelope may carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum EntityKind {
    #[serde(rename = "BankAccounts")]
    #[strum(serialize = "BankAccounts")]
    BankAccounts,
    #[serde(rename = "Zaimy")]
    #[strum(serialize = "Zaimy")]
    Loans,
}

impl EntityKind {
    pub fn supported() -> Vec<EntityKind> {
        use strum::IntoEnumIterator;
        Self::iter().collect()
    }
}
