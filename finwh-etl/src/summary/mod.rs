//! Per-day aggregates, always recomputed from the fact table rather than
//! maintained incrementally.
mod entity;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::{
    primitives::DateId,
    store::{StoreError, WarehouseTx},
};

pub use entity::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct Summaries {}

impl Summaries {
    pub fn new() -> Self {
        Self {}
    }

    /// Must run after every account fact of `date_id` in the batch was flushed.
    #[instrument(name = "finwh.summary.recompute_account_summary", skip(self, tx), err)]
    pub async fn recompute_account_summary(
        &self,
        tx: &mut dyn WarehouseTx,
        date_id: DateId,
        processing_date: NaiveDate,
    ) -> Result<SummaryResult, StoreError> {
        let aggregate = tx.aggregate_account_balances(date_id).await?;
        if aggregate.is_empty() {
            return Ok(SummaryResult::empty(date_id));
        }
        let total = aggregate.total.unwrap_or(Decimal::ZERO);
        let created = tx
            .upsert_account_summary(&DailyAccountSummary {
                date_id,
                total_balance_byn: total,
                account_count: aggregate.entity_count,
                processing_date,
            })
            .await?;
        tracing::info!(%date_id, %total, count = aggregate.entity_count, "account summary recomputed");
        Ok(SummaryResult {
            date_id,
            total,
            count: aggregate.entity_count,
            created,
            written: true,
        })
    }

    /// Aggregates the day's loan facts, stamps the "total repaid" column and
    /// replaces the day's loan summary.
    #[instrument(name = "finwh.summary.recompute_loan_summary", skip(self, tx), err)]
    pub async fn recompute_loan_summary(
        &self,
        tx: &mut dyn WarehouseTx,
        date_id: DateId,
        processing_date: NaiveDate,
    ) -> Result<SummaryResult, StoreError> {
        let aggregate = tx.aggregate_loan_balances(date_id).await?;
        if aggregate.is_empty() {
            return Ok(SummaryResult::empty(date_id));
        }
        stamp_total_repaid_with_day_debt(tx, date_id, &aggregate).await?;
        let total = aggregate.total.unwrap_or(Decimal::ZERO);
        let created = tx
            .upsert_loan_summary(&DailyLoanSummary {
                date_id,
                total_debt_byn: total,
                loan_count: aggregate.entity_count,
                processing_date,
            })
            .await?;
        tracing::info!(%date_id, %total, count = aggregate.entity_count, "loan summary recomputed");
        Ok(SummaryResult {
            date_id,
            total,
            count: aggregate.entity_count,
            created,
            written: true,
        })
    }
}

/// Sets `total_repaid_byn` of every loan fact of the day to the sum of that
/// day's `current_debt_byn` across all loans.
///
/// This is not a repayment figure. Downstream reports read the column with
/// exactly this meaning, so it is kept as is until product clarifies it.
pub async fn stamp_total_repaid_with_day_debt(
    tx: &mut dyn WarehouseTx,
    date_id: DateId,
    aggregate: &FactAggregate,
) -> Result<u64, StoreError> {
    let total = aggregate.total.unwrap_or(Decimal::ZERO);
    tx.stamp_total_repaid(date_id, total).await
}

impl SummaryResult {
    pub fn empty(date_id: DateId) -> Self {
        Self {
            date_id,
            total: Decimal::ZERO,
            count: 0,
            created: false,
            written: false,
        }
    }
}
