//! Transactional persistence primitives used by the ETL engine.
//!
//! [WarehouseStore] hands out one [WarehouseTx] per batch. Dropping a
//! transaction without committing rolls it back.
pub mod error;
mod memory;
mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    account::Account,
    date_dim::DateDimension,
    fact::{DailyAccountBalance, DailyLoanBalance},
    loan::{Loan, LoanValues},
    primitives::{AccountId, DateId, LoanId, LoanSourceId},
    summary::{DailyAccountSummary, DailyLoanSummary, FactAggregate},
};

pub use error::StoreError;
pub use memory::*;
pub use pg::*;

/// Write a [MemoryWarehouse] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailPoint {
    DateWrite,
    EntityWrite,
    FactWrite,
    SummaryWrite,
    Commit,
}

#[async_trait]
pub trait WarehouseStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError>;
}

#[async_trait]
pub trait WarehouseTx: Send {
    async fn find_date(&mut self, date_id: DateId) -> Result<Option<DateDimension>, StoreError>;
    /// Returns the number of rows actually inserted.
    async fn insert_dates_if_absent(&mut self, rows: &[DateDimension]) -> Result<u64, StoreError>;

    async fn find_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError>;
    async fn insert_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError>;
    async fn update_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError>;

    async fn find_account_balances(
        &mut self,
        date_id: DateId,
        ids: &[AccountId],
    ) -> Result<Vec<DailyAccountBalance>, StoreError>;
    async fn insert_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError>;
    async fn update_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError>;
    async fn aggregate_account_balances(
        &mut self,
        date_id: DateId,
    ) -> Result<FactAggregate, StoreError>;
    /// Returns true when the row was inserted rather than replaced.
    async fn upsert_account_summary(
        &mut self,
        row: &DailyAccountSummary,
    ) -> Result<bool, StoreError>;

    async fn find_loans(&mut self, ids: &[LoanSourceId]) -> Result<Vec<Loan>, StoreError>;
    async fn insert_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<Vec<(LoanSourceId, LoanId)>, StoreError>;
    async fn update_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn find_loan_balances(
        &mut self,
        date_id: DateId,
        ids: &[LoanId],
    ) -> Result<Vec<DailyLoanBalance>, StoreError>;
    async fn insert_loan_balances(&mut self, rows: &[DailyLoanBalance])
        -> Result<u64, StoreError>;
    /// Updates the current debt columns only.
    async fn update_loan_balances(&mut self, rows: &[DailyLoanBalance])
        -> Result<u64, StoreError>;
    async fn aggregate_loan_balances(&mut self, date_id: DateId)
        -> Result<FactAggregate, StoreError>;
    /// Sets `total_repaid_byn` on every loan fact row of the day.
    async fn stamp_total_repaid(
        &mut self,
        date_id: DateId,
        total: Decimal,
    ) -> Result<u64, StoreError>;
    async fn upsert_loan_summary(&mut self, row: &DailyLoanSummary) -> Result<bool, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
    async fn rollback(&mut self) -> Result<(), StoreError>;
}
