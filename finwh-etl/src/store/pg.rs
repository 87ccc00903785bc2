use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::instrument;

use super::{error::StoreError, WarehouseStore, WarehouseTx};
use crate::{
    account::Account,
    date_dim::DateDimension,
    fact::{DailyAccountBalance, DailyLoanBalance},
    loan::{Loan, LoanValues},
    primitives::{AccountId, DateId, LoanId, LoanSourceId},
    summary::{DailyAccountSummary, DailyLoanSummary, FactAggregate},
};

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[async_trait]
impl WarehouseStore for PgWarehouse {
    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgWarehouseTx { tx: Some(tx) }))
    }
}

/// Open Postgres transaction. sqlx rolls it back when dropped uncommitted.
pub struct PgWarehouseTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgWarehouseTx {
    fn db(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::TransactionClosed)
    }
}

const LOAN_COLUMNS: &str = r#"source_loan_id, contract_number, contract_date, initial_amount,
    loan_currency, current_debt, current_debt_byn, interest_rate, start_date, end_date, status"#;

#[async_trait]
impl WarehouseTx for PgWarehouseTx {
    #[instrument(level = "trace", name = "finwh.store.find_date", skip(self), err)]
    async fn find_date(&mut self, date_id: DateId) -> Result<Option<DateDimension>, StoreError> {
        let db = self.db()?;
        let row = sqlx::query_as::<_, DateDimension>(
            r#"SELECT date_id, date, day, month, year, day_name, month_name,
                      is_weekend, is_holiday, quarter
               FROM dim_date WHERE date_id = $1"#,
        )
        .bind(date_id)
        .fetch_optional(&mut **db)
        .await?;
        Ok(row)
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.insert_dates_if_absent",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn insert_dates_if_absent(&mut self, rows: &[DateDimension]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO dim_date
               (date_id, date, day, month, year, day_name, month_name, is_weekend, is_holiday, quarter)"#,
        );
        query_builder.push_values(rows, |mut builder, row| {
            builder.push_bind(row.date_id);
            builder.push_bind(row.date);
            builder.push_bind(row.day);
            builder.push_bind(row.month);
            builder.push_bind(row.year);
            builder.push_bind(&row.day_name);
            builder.push_bind(&row.month_name);
            builder.push_bind(row.is_weekend);
            builder.push_bind(row.is_holiday);
            builder.push_bind(row.quarter);
        });
        query_builder.push(" ON CONFLICT (date_id) DO NOTHING");
        let result = query_builder.build().execute(&mut **db).await?;
        Ok(result.rows_affected())
    }

    #[instrument(level = "trace", name = "finwh.store.find_accounts", skip_all, err)]
    async fn find_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let db = self.db()?;
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query_as::<_, Account>(
            r#"SELECT account_id, account_name, currency, status, owner_id, creation_date, updated_at
               FROM accounts WHERE account_id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&mut **db)
        .await?;
        Ok(rows)
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.insert_accounts",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn insert_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO accounts
               (account_id, account_name, currency, status, owner_id, creation_date, updated_at)"#,
        );
        query_builder.push_values(rows, |mut builder, row| {
            builder.push_bind(row.account_id);
            builder.push_bind(&row.account_name);
            builder.push_bind(&row.currency);
            builder.push_bind(&row.status);
            builder.push_bind(&row.owner_id);
            builder.push_bind(row.creation_date);
            builder.push_bind(row.updated_at);
        });
        query_builder.push(
            r#" ON CONFLICT (account_id) DO UPDATE SET
                account_name = EXCLUDED.account_name,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                owner_id = EXCLUDED.owner_id,
                updated_at = EXCLUDED.updated_at"#,
        );
        let result = query_builder.build().execute(&mut **db).await?;
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.update_accounts",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn update_accounts(&mut self, rows: &[Account]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut names = Vec::with_capacity(rows.len());
        let mut currencies = Vec::with_capacity(rows.len());
        let mut statuses = Vec::with_capacity(rows.len());
        let mut owners = Vec::with_capacity(rows.len());
        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.account_id.as_i64());
            names.push(row.account_name.clone());
            currencies.push(row.currency.clone());
            statuses.push(row.status.clone());
            owners.push(row.owner_id.clone());
            updated.push(row.updated_at);
        }
        let result = sqlx::query(
            r#"UPDATE accounts AS a SET
                 account_name = v.account_name,
                 currency = v.currency,
                 status = v.status,
                 owner_id = v.owner_id,
                 updated_at = v.updated_at
               FROM UNNEST($1::bigint[], $2::text[], $3::text[], $4::text[], $5::text[], $6::timestamptz[])
                 AS v(account_id, account_name, currency, status, owner_id, updated_at)
               WHERE a.account_id = v.account_id"#,
        )
        .bind(ids)
        .bind(names)
        .bind(currencies)
        .bind(statuses)
        .bind(owners)
        .bind(updated)
        .execute(&mut **db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(level = "trace", name = "finwh.store.find_account_balances", skip(self, ids), err)]
    async fn find_account_balances(
        &mut self,
        date_id: DateId,
        ids: &[AccountId],
    ) -> Result<Vec<DailyAccountBalance>, StoreError> {
        let db = self.db()?;
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query_as::<_, DailyAccountBalance>(
            r#"SELECT account_id, date_id, balance, balance_byn, processing_date
               FROM daily_account_balances
               WHERE date_id = $1 AND account_id = ANY($2)"#,
        )
        .bind(date_id)
        .bind(ids)
        .fetch_all(&mut **db)
        .await?;
        Ok(rows)
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.insert_account_balances",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn insert_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO daily_account_balances
               (account_id, date_id, balance, balance_byn, processing_date)"#,
        );
        query_builder.push_values(rows, |mut builder, row| {
            builder.push_bind(row.account_id);
            builder.push_bind(row.date_id);
            builder.push_bind(row.balance);
            builder.push_bind(row.balance_byn);
            builder.push_bind(row.processing_date);
        });
        query_builder.push(
            r#" ON CONFLICT (account_id, date_id) DO UPDATE SET
                balance = EXCLUDED.balance,
                balance_byn = EXCLUDED.balance_byn,
                processing_date = EXCLUDED.processing_date"#,
        );
        let result = query_builder.build().execute(&mut **db).await?;
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.update_account_balances",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn update_account_balances(
        &mut self,
        rows: &[DailyAccountBalance],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut date_ids = Vec::with_capacity(rows.len());
        let mut balances = Vec::with_capacity(rows.len());
        let mut balances_byn = Vec::with_capacity(rows.len());
        let mut processing_dates: Vec<NaiveDate> = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.account_id.as_i64());
            date_ids.push(row.date_id.as_i32());
            balances.push(row.balance);
            balances_byn.push(row.balance_byn);
            processing_dates.push(row.processing_date);
        }
        let result = sqlx::query(
            r#"UPDATE daily_account_balances AS b SET
                 balance = v.balance,
                 balance_byn = v.balance_byn,
                 processing_date = v.processing_date
               FROM UNNEST($1::bigint[], $2::integer[], $3::numeric[], $4::numeric[], $5::date[])
                 AS v(account_id, date_id, balance, balance_byn, processing_date)
               WHERE b.account_id = v.account_id AND b.date_id = v.date_id"#,
        )
        .bind(ids)
        .bind(date_ids)
        .bind(balances)
        .bind(balances_byn)
        .bind(processing_dates)
        .execute(&mut **db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.aggregate_account_balances",
        skip(self),
        err
    )]
    async fn aggregate_account_balances(
        &mut self,
        date_id: DateId,
    ) -> Result<FactAggregate, StoreError> {
        let db = self.db()?;
        let aggregate = sqlx::query_as::<_, FactAggregate>(
            r#"SELECT SUM(balance_byn) AS total, COUNT(DISTINCT account_id) AS entity_count
               FROM daily_account_balances WHERE date_id = $1"#,
        )
        .bind(date_id)
        .fetch_one(&mut **db)
        .await?;
        Ok(aggregate)
    }

    #[instrument(level = "trace", name = "finwh.store.upsert_account_summary", skip(self), err)]
    async fn upsert_account_summary(
        &mut self,
        row: &DailyAccountSummary,
    ) -> Result<bool, StoreError> {
        let db = self.db()?;
        let created = sqlx::query_scalar::<_, bool>(
            r#"INSERT INTO daily_account_summary
                 (date_id, total_balance_byn, account_count, processing_date)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (date_id) DO UPDATE SET
                 total_balance_byn = EXCLUDED.total_balance_byn,
                 account_count = EXCLUDED.account_count,
                 processing_date = EXCLUDED.processing_date
               RETURNING (xmax = 0) AS created"#,
        )
        .bind(row.date_id)
        .bind(row.total_balance_byn)
        .bind(row.account_count)
        .bind(row.processing_date)
        .fetch_one(&mut **db)
        .await?;
        Ok(created)
    }

    #[instrument(level = "trace", name = "finwh.store.find_loans", skip_all, err)]
    async fn find_loans(&mut self, ids: &[LoanSourceId]) -> Result<Vec<Loan>, StoreError> {
        let db = self.db()?;
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, Loan>(&format!(
            "SELECT id, {LOAN_COLUMNS}, created_at, updated_at FROM loans WHERE source_loan_id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&mut **db)
        .await?;
        Ok(rows)
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.insert_loans",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn insert_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<Vec<(LoanSourceId, LoanId)>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db()?;
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO loans ({LOAN_COLUMNS}, created_at, updated_at)"));
        query_builder.push_values(rows, |mut builder, row| {
            builder.push_bind(&row.source_loan_id);
            builder.push_bind(&row.contract_number);
            builder.push_bind(row.contract_date);
            builder.push_bind(row.initial_amount);
            builder.push_bind(&row.loan_currency);
            builder.push_bind(row.current_debt);
            builder.push_bind(row.current_debt_byn);
            builder.push_bind(row.interest_rate);
            builder.push_bind(row.start_date);
            builder.push_bind(row.end_date);
            builder.push_bind(&row.status);
            builder.push_bind(now);
            builder.push_bind(now);
        });
        query_builder.push(
            r#" ON CONFLICT (source_loan_id) DO UPDATE SET
                contract_number = EXCLUDED.contract_number,
                contract_date = EXCLUDED.contract_date,
                initial_amount = EXCLUDED.initial_amount,
                loan_currency = EXCLUDED.loan_currency,
                current_debt = EXCLUDED.current_debt,
                current_debt_byn = EXCLUDED.current_debt_byn,
                interest_rate = EXCLUDED.interest_rate,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
              RETURNING source_loan_id, id"#,
        );
        let ids = query_builder
            .build_query_as::<(String, i64)>()
            .fetch_all(&mut **db)
            .await?;
        Ok(ids
            .into_iter()
            .map(|(source, id)| (LoanSourceId::from(source), LoanId::from(id)))
            .collect())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.update_loans",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn update_loans(
        &mut self,
        rows: &[LoanValues],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut contract_numbers = Vec::with_capacity(rows.len());
        let mut contract_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
        let mut initial_amounts: Vec<Decimal> = Vec::with_capacity(rows.len());
        let mut currencies = Vec::with_capacity(rows.len());
        let mut debts: Vec<Decimal> = Vec::with_capacity(rows.len());
        let mut debts_byn: Vec<Decimal> = Vec::with_capacity(rows.len());
        let mut rates: Vec<Decimal> = Vec::with_capacity(rows.len());
        let mut start_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
        let mut end_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.source_loan_id.as_str().to_string());
            contract_numbers.push(row.contract_number.clone());
            contract_dates.push(row.contract_date);
            initial_amounts.push(row.initial_amount);
            currencies.push(row.loan_currency.clone());
            debts.push(row.current_debt);
            debts_byn.push(row.current_debt_byn);
            rates.push(row.interest_rate);
            start_dates.push(row.start_date);
            end_dates.push(row.end_date);
            statuses.push(row.status.clone());
        }
        let result = sqlx::query(
            r#"UPDATE loans AS l SET
                 contract_number = v.contract_number,
                 contract_date = v.contract_date,
                 initial_amount = v.initial_amount,
                 loan_currency = v.loan_currency,
                 current_debt = v.current_debt,
                 current_debt_byn = v.current_debt_byn,
                 interest_rate = v.interest_rate,
                 start_date = v.start_date,
                 end_date = v.end_date,
                 status = v.status,
                 updated_at = $12
               FROM UNNEST($1::text[], $2::text[], $3::date[], $4::numeric[], $5::text[],
                           $6::numeric[], $7::numeric[], $8::numeric[], $9::date[], $10::date[],
                           $11::text[])
                 AS v(source_loan_id, contract_number, contract_date, initial_amount, loan_currency,
                      current_debt, current_debt_byn, interest_rate, start_date, end_date, status)
               WHERE l.source_loan_id = v.source_loan_id"#,
        )
        .bind(ids)
        .bind(contract_numbers)
        .bind(contract_dates)
        .bind(initial_amounts)
        .bind(currencies)
        .bind(debts)
        .bind(debts_byn)
        .bind(rates)
        .bind(start_dates)
        .bind(end_dates)
        .bind(statuses)
        .bind(now)
        .execute(&mut **db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(level = "trace", name = "finwh.store.find_loan_balances", skip(self, ids), err)]
    async fn find_loan_balances(
        &mut self,
        date_id: DateId,
        ids: &[LoanId],
    ) -> Result<Vec<DailyLoanBalance>, StoreError> {
        let db = self.db()?;
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query_as::<_, DailyLoanBalance>(
            r#"SELECT loan_id, date_id, current_debt, current_debt_byn, total_repaid_byn
               FROM daily_loan_balances
               WHERE date_id = $1 AND loan_id = ANY($2)"#,
        )
        .bind(date_id)
        .bind(ids)
        .fetch_all(&mut **db)
        .await?;
        Ok(rows)
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.insert_loan_balances",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn insert_loan_balances(
        &mut self,
        rows: &[DailyLoanBalance],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO daily_loan_balances
               (loan_id, date_id, current_debt, current_debt_byn, total_repaid_byn)"#,
        );
        query_builder.push_values(rows, |mut builder, row| {
            builder.push_bind(row.loan_id);
            builder.push_bind(row.date_id);
            builder.push_bind(row.current_debt);
            builder.push_bind(row.current_debt_byn);
            builder.push_bind(row.total_repaid_byn);
        });
        query_builder.push(
            r#" ON CONFLICT (loan_id, date_id) DO UPDATE SET
                current_debt = EXCLUDED.current_debt,
                current_debt_byn = EXCLUDED.current_debt_byn"#,
        );
        let result = query_builder.build().execute(&mut **db).await?;
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.update_loan_balances",
        skip_all,
        fields(n_rows = rows.len()),
        err
    )]
    async fn update_loan_balances(
        &mut self,
        rows: &[DailyLoanBalance],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db()?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut date_ids = Vec::with_capacity(rows.len());
        let mut debts = Vec::with_capacity(rows.len());
        let mut debts_byn = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.loan_id.as_i64());
            date_ids.push(row.date_id.as_i32());
            debts.push(row.current_debt);
            debts_byn.push(row.current_debt_byn);
        }
        let result = sqlx::query(
            r#"UPDATE daily_loan_balances AS b SET
                 current_debt = v.current_debt,
                 current_debt_byn = v.current_debt_byn
               FROM UNNEST($1::bigint[], $2::integer[], $3::numeric[], $4::numeric[])
                 AS v(loan_id, date_id, current_debt, current_debt_byn)
               WHERE b.loan_id = v.loan_id AND b.date_id = v.date_id"#,
        )
        .bind(ids)
        .bind(date_ids)
        .bind(debts)
        .bind(debts_byn)
        .execute(&mut **db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(
        level = "trace",
        name = "finwh.store.aggregate_loan_balances",
        skip(self),
        err
    )]
    async fn aggregate_loan_balances(
        &mut self,
        date_id: DateId,
    ) -> Result<FactAggregate, StoreError> {
        let db = self.db()?;
        let aggregate = sqlx::query_as::<_, FactAggregate>(
            r#"SELECT SUM(current_debt_byn) AS total, COUNT(DISTINCT loan_id) AS entity_count
               FROM daily_loan_balances WHERE date_id = $1"#,
        )
        .bind(date_id)
        .fetch_one(&mut **db)
        .await?;
        Ok(aggregate)
    }

    #[instrument(level = "trace", name = "finwh.store.stamp_total_repaid", skip(self), err)]
    async fn stamp_total_repaid(
        &mut self,
        date_id: DateId,
        total: Decimal,
    ) -> Result<u64, StoreError> {
        let db = self.db()?;
        let result = sqlx::query(
            "UPDATE daily_loan_balances SET total_repaid_byn = $2 WHERE date_id = $1",
        )
        .bind(date_id)
        .bind(total)
        .execute(&mut **db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(level = "trace", name = "finwh.store.upsert_loan_summary", skip(self), err)]
    async fn upsert_loan_summary(&mut self, row: &DailyLoanSummary) -> Result<bool, StoreError> {
        let db = self.db()?;
        let created = sqlx::query_scalar::<_, bool>(
            r#"INSERT INTO daily_loan_summary
                 (date_id, total_debt_byn, loan_count, processing_date)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (date_id) DO UPDATE SET
                 total_debt_byn = EXCLUDED.total_debt_byn,
                 loan_count = EXCLUDED.loan_count,
                 processing_date = EXCLUDED.processing_date
               RETURNING (xmax = 0) AS created"#,
        )
        .bind(row.date_id)
        .bind(row.total_debt_byn)
        .bind(row.loan_count)
        .bind(row.processing_date)
        .fetch_one(&mut **db)
        .await?;
        Ok(created)
    }

    #[instrument(level = "trace", name = "finwh.store.commit", skip(self), err)]
    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "trace", name = "finwh.store.rollback", skip(self), err)]
    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
