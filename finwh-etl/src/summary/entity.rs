use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::primitives::DateId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyAccountSummary {
    pub date_id: DateId,
    pub total_balance_byn: Decimal,
    pub account_count: i64,
    pub processing_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyLoanSummary {
    pub date_id: DateId,
    pub total_debt_byn: Decimal,
    pub loan_count: i64,
    pub processing_date: NaiveDate,
}

/// `SUM` and `COUNT(DISTINCT ..)` over one day's fact rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct FactAggregate {
    pub total: Option<Decimal>,
    pub entity_count: i64,
}

impl FactAggregate {
    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub date_id: DateId,
    pub total: Decimal,
    pub count: i64,
    /// Whether a new summary row was inserted rather than replaced.
    pub created: bool,
    /// False when the day had no fact rows and nothing was written.
    pub written: bool,
}
