use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{error::StoreError, FailPoint, WarehouseStore, WarehouseTx};
use crate::{
    account::Account,
    date_dim::DateDimension,
    fact::{DailyAccountBalance, DailyLoanBalance},
    loan::{Loan, LoanValues},
    primitives::{AccountId, DateId, LoanId, LoanSourceId},
    summary::{DailyAccountSummary, DailyLoanSummary, FactAggregate},
};

/// Rows written per table, counted for committed transactions only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub dates_inserted: u64,
    pub accounts_inserted: u64,
    pub accounts_updated: u64,
    pub loans_inserted: u64,
    pub loans_updated: u64,
    pub account_facts_inserted: u64,
    pub account_facts_updated: u64,
    pub loan_facts_inserted: u64,
    pub loan_facts_updated: u64,
    pub summaries_written: u64,
    /// Non-empty `insert_accounts`/`insert_loans` calls, one per flush that
    /// created entities.
    pub entity_insert_calls: u64,
    pub fact_insert_calls: u64,
}

impl WriteCounts {
    pub fn entity_writes(&self) -> u64 {
        self.accounts_inserted + self.accounts_updated + self.loans_inserted + self.loans_updated
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub dates: BTreeMap<DateId, DateDimension>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub loans: BTreeMap<LoanSourceId, Loan>,
    pub account_balances: BTreeMap<(AccountId, DateId), DailyAccountBalance>,
    pub loan_balances: BTreeMap<(LoanId, DateId), DailyLoanBalance>,
    pub account_summaries: BTreeMap<DateId, DailyAccountSummary>,
    pub loan_summaries: BTreeMap<DateId, DailyLoanSummary>,
    pub writes: WriteCounts,
    next_loan_id: i64,
}

#[derive(Debug, Clone, Copy)]
struct FailRule {
    point: FailPoint,
    remaining_hits: usize,
}

/// In-process warehouse. Transactions are serialised and roll back by
/// restoring the snapshot taken at `begin`.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    tables: Arc<Mutex<MemoryTables>>,
    fail_rule: Arc<Mutex<Option<FailRule>>>,
    concurrent_dates: Arc<Mutex<Vec<DateDimension>>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `nth` (1-based) write at `point` fail with
    /// [StoreError::Injected]. The rule is consumed when it fires.
    pub async fn fail_at(&self, point: FailPoint, nth: usize) {
        *self.fail_rule.lock().await = Some(FailRule {
            point,
            remaining_hits: nth.max(1),
        });
    }

    /// Lands `row` as if another transaction committed it between this
    /// transaction's date lookup and its next date insert.
    pub async fn insert_date_before_next_date_write(&self, row: DateDimension) {
        self.concurrent_dates.lock().await.push(row);
    }

    pub async fn tables(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.tables.lock().await.writes
    }
}

#[async_trait]
impl WarehouseStore for MemoryWarehouse {
    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryWarehouseTx {
            guard: Some(guard),
            snapshot: Some(snapshot),
            fail_rule: self.fail_rule.clone(),
            concurrent_dates: self.concurrent_dates.clone(),
        }))
    }
}

pub struct MemoryWarehouseTx {
    guard: Option<OwnedMutexGuard<MemoryTables>>,
    snapshot: Option<MemoryTables>,
    fail_rule: Arc<Mutex<Option<FailRule>>>,
    concurrent_dates: Arc<Mutex<Vec<DateDimension>>>,
}

impl MemoryWarehouseTx {
    fn tables(&mut self) -> Result<&mut MemoryTables, StoreError> {
        self.guard
            .as_deref_mut()
            .ok_or(StoreError::TransactionClosed)
    }

    async fn check(&mut self, point: FailPoint) -> Result<(), StoreError> {
        let mut rule = self.fail_rule.lock().await;
        let fires = match rule.as_mut() {
            Some(current) if current.point == point => {
                current.remaining_hits -= 1;
                current.remaining_hits == 0
            }
            _ => false,
        };
        if fires {
            *rule = None;
            return Err(StoreError::Injected(point));
        }
        Ok(())
    }

    fn restore(&mut self) {
        if let (Some(guard), Some(snapshot)) = (self.guard.as_deref_mut(), self.snapshot.take()) {
            *guard = snapshot;
        }
    }
}

impl Drop for MemoryWarehouseTx {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait]
impl WarehouseTx for MemoryWarehouseTx {
    async fn find_date(&mut self, date_id: DateId) -> Result<Option<DateDimension>, StoreError> {
        Ok(self.tables()?.dates.get(&date_id).cloned())
    }

    async fn insert_dates_if_absent(&mut self, rows: &[DateDimension]) -> Result<u64, StoreError> {
        self.check(FailPoint::DateWrite).await?;
        let concurrent: Vec<_> = self.concurrent_dates.lock().await.drain(..).collect();
        let tables = self.tables()?;
        for row in concurrent {
            tables.dates.insert(row.date_id, row);
        }
        let mut inserted = 0;
        for row in rows {
            if !tables.dates.contains_key(&row.date_id) {
                tables.dates.insert(row.date_id, row.clone());
                inserted += 1;
            }
        }
        tables.writes.dates_inserted += inserted;
        Ok(inserted)
    }

    async fn find_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.accounts.get(id).cloned())
            .collect())
    }

    async fn insert_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError> {
        self.check(FailPoint::EntityWrite).await?;
        let tables = self.tables()?;
        for row in rows {
            tables.accounts.insert(row.account_id, row.clone());
        }
        tables.writes.accounts_inserted += rows.len() as u64;
        if !rows.is_empty() {
            tables.writes.entity_insert_calls += 1;
        }
        Ok(rows.len() as u64)
    }

    async fn update_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError> {
        self.check(FailPoint::EntityWrite).await?;
        let tables = self.tables()?;
        let mut updated = 0;
        for row in rows {
            if let Some(existing) = tables.accounts.get_mut(&row.account_id) {
                *existing = row.clone();
                updated += 1;
            }
        }
        tables.writes.accounts_updated += updated;
        Ok(updated)
    }

    async fn find_account_balances(
        &mut self,
        date_id: DateId,
        ids: &[AccountId],
    ) -> Result<Vec<DailyAccountBalance>, StoreError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.account_balances.get(&(*id, date_id)).cloned())
            .collect())
    }

    async fn insert_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::FactWrite).await?;
        let tables = self.tables()?;
        for row in rows {
            if !tables.accounts.contains_key(&row.account_id) {
                return Err(StoreError::ConstraintViolation(
                    "daily_account_balances_account_id_fkey".to_string(),
                ));
            }
            if !tables.dates.contains_key(&row.date_id) {
                return Err(StoreError::ConstraintViolation(
                    "daily_account_balances_date_id_fkey".to_string(),
                ));
            }
            tables
                .account_balances
                .insert((row.account_id, row.date_id), row.clone());
        }
        tables.writes.account_facts_inserted += rows.len() as u64;
        if !rows.is_empty() {
            tables.writes.fact_insert_calls += 1;
        }
        Ok(rows.len() as u64)
    }

    async fn update_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::FactWrite).await?;
        let tables = self.tables()?;
        let mut updated = 0;
        for row in rows {
            if let Some(existing) = tables
                .account_balances
                .get_mut(&(row.account_id, row.date_id))
            {
                *existing = row.clone();
                updated += 1;
            }
        }
        tables.writes.account_facts_updated += updated;
        Ok(updated)
    }

    async fn aggregate_account_balances(
        &mut self,
        date_id: DateId,
    ) -> Result<FactAggregate, StoreError> {
        let tables = self.tables()?;
        let rows: Vec<_> = tables
            .account_balances
            .values()
            .filter(|row| row.date_id == date_id)
            .collect();
        Ok(FactAggregate {
            total: checked_total(date_id, rows.iter().map(|row| row.balance_byn))?,
            entity_count: rows.len() as i64,
        })
    }

    async fn upsert_account_summary(
        &mut self,
        row: &DailyAccountSummary,
    ) -> Result<bool, StoreError> {
        self.check(FailPoint::SummaryWrite).await?;
        let tables = self.tables()?;
        let created = tables
            .account_summaries
            .insert(row.date_id, row.clone())
            .is_none();
        tables.writes.summaries_written += 1;
        Ok(created)
    }

    async fn find_loans(&mut self, ids: &[LoanSourceId]) -> Result<Vec<Loan>, StoreError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.loans.get(id).cloned())
            .collect())
    }

    async fn insert_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<Vec<(LoanSourceId, LoanId)>, StoreError> {
        self.check(FailPoint::EntityWrite).await?;
        let tables = self.tables()?;
        let mut ids = Vec::with_capacity(rows.len());
        for values in rows {
            let id = match tables.loans.get(&values.source_loan_id) {
                Some(existing) => existing.id,
                None => {
                    tables.next_loan_id += 1;
                    LoanId::from(tables.next_loan_id)
                }
            };
            tables.loans.insert(
                values.source_loan_id.clone(),
                Loan {
                    id,
                    values: values.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
            ids.push((values.source_loan_id.clone(), id));
        }
        tables.writes.loans_inserted += rows.len() as u64;
        if !rows.is_empty() {
            tables.writes.entity_insert_calls += 1;
        }
        Ok(ids)
    }

    async fn update_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::EntityWrite).await?;
        let tables = self.tables()?;
        let mut updated = 0;
        for values in rows {
            if let Some(existing) = tables.loans.get_mut(&values.source_loan_id) {
                existing.values = values.clone();
                existing.updated_at = now;
                updated += 1;
            }
        }
        tables.writes.loans_updated += updated;
        Ok(updated)
    }

    async fn find_loan_balances(
        &mut self,
        date_id: DateId,
        ids: &[LoanId],
    ) -> Result<Vec<DailyLoanBalance>, StoreError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.loan_balances.get(&(*id, date_id)).cloned())
            .collect())
    }

    async fn insert_loan_balances(
        &mut self,
        rows: &[DailyLoanBalance],
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::FactWrite).await?;
        let tables = self.tables()?;
        for row in rows {
            if !tables.loans.values().any(|loan| loan.id == row.loan_id) {
                return Err(StoreError::ConstraintViolation(
                    "daily_loan_balances_loan_id_fkey".to_string(),
                ));
            }
            if !tables.dates.contains_key(&row.date_id) {
                return Err(StoreError::ConstraintViolation(
                    "daily_loan_balances_date_id_fkey".to_string(),
                ));
            }
            tables
                .loan_balances
                .insert((row.loan_id, row.date_id), row.clone());
        }
        tables.writes.loan_facts_inserted += rows.len() as u64;
        if !rows.is_empty() {
            tables.writes.fact_insert_calls += 1;
        }
        Ok(rows.len() as u64)
    }

    async fn update_loan_balances(
        &mut self,
        rows: &[DailyLoanBalance],
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::FactWrite).await?;
        let tables = self.tables()?;
        let mut updated = 0;
        for row in rows {
            if let Some(existing) = tables.loan_balances.get_mut(&(row.loan_id, row.date_id)) {
                existing.current_debt = row.current_debt;
                existing.current_debt_byn = row.current_debt_byn;
                updated += 1;
            }
        }
        tables.writes.loan_facts_updated += updated;
        Ok(updated)
    }

    async fn aggregate_loan_balances(
        &mut self,
        date_id: DateId,
    ) -> Result<FactAggregate, StoreError> {
        let tables = self.tables()?;
        let rows: Vec<_> = tables
            .loan_balances
            .values()
            .filter(|row| row.date_id == date_id)
            .collect();
        Ok(FactAggregate {
            total: checked_total(date_id, rows.iter().map(|row| row.current_debt_byn))?,
            entity_count: rows.len() as i64,
        })
    }

    async fn stamp_total_repaid(
        &mut self,
        date_id: DateId,
        total: Decimal,
    ) -> Result<u64, StoreError> {
        self.check(FailPoint::FactWrite).await?;
        let tables = self.tables()?;
        let mut stamped = 0;
        for row in tables
            .loan_balances
            .values_mut()
            .filter(|row| row.date_id == date_id)
        {
            row.total_repaid_byn = total;
            stamped += 1;
        }
        Ok(stamped)
    }

    async fn upsert_loan_summary(&mut self, row: &DailyLoanSummary) -> Result<bool, StoreError> {
        self.check(FailPoint::SummaryWrite).await?;
        let tables = self.tables()?;
        let created = tables
            .loan_summaries
            .insert(row.date_id, row.clone())
            .is_none();
        tables.writes.summaries_written += 1;
        Ok(created)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.check(FailPoint::Commit).await?;
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        self.snapshot = None;
        self.guard = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        self.restore();
        self.guard = None;
        Ok(())
    }
}

/// `None` for an empty day, the exact sum otherwise.
fn checked_total(
    date_id: DateId,
    amounts: impl Iterator<Item = Decimal>,
) -> Result<Option<Decimal>, StoreError> {
    let mut total = None;
    for amount in amounts {
        let sum = total.unwrap_or(Decimal::ZERO).checked_add(amount);
        total = Some(sum.ok_or(StoreError::AggregateOverflow(date_id))?);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn totals_are_checked() {
        let date_id = DateId::from_date(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(checked_total(date_id, std::iter::empty()).unwrap(), None);
        assert_eq!(
            checked_total(date_id, [dec!(1.5), dec!(2)].into_iter()).unwrap(),
            Some(dec!(3.5))
        );
        assert!(matches!(
            checked_total(date_id, [Decimal::MAX, dec!(1)].into_iter()),
            Err(StoreError::AggregateOverflow(_))
        ));
    }
}

