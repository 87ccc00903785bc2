use serde_json::json;
use std::collections::BTreeSet;

use super::{error::RecordError, report::BatchProgress, BatchContext};
use crate::{
    account::{AccountReconciler, AccountRecord},
    currency::{fit_amount, CurrencyConverter, ACCOUNT_AMOUNT_INTEGER_DIGITS, ACCOUNT_AMOUNT_SCALE},
    fact::{DailyAccountBalance, FactAmounts, FactWriter},
    field::{Field, Record},
    primitives::AccountId,
    store::WarehouseTx,
    warehouse::error::EtlError,
};

/// Reconciles accounts and writes their daily balances, flushing every
/// `flush_stride` records and once at the end.
pub(super) async fn process_accounts(
    tx: &mut dyn WarehouseTx,
    ctx: &BatchContext<'_>,
    records: &[Record],
    progress: &mut BatchProgress,
) -> Result<(), EtlError> {
    let extracted: Vec<_> = records
        .iter()
        .map(|record| AccountRecord::extract(record, ctx.aliases))
        .collect();
    let ids: Vec<AccountId> = extracted
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|r| r.account_id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut accounts = AccountReconciler::prefetch(
        tx,
        &ids,
        ctx.converter.reporting_currency(),
        ctx.processing_date,
    )
    .await?;
    let existing = tx.find_account_balances(ctx.date_id, &ids).await?;
    let mut facts = FactWriter::new(existing.iter().map(|f| (f.account_id, f.amounts())));

    for (idx, extracted) in extracted.into_iter().enumerate() {
        let converted = extracted.and_then(|record| {
            let currency = accounts.effective_currency(record.account_id, &record.attributes);
            let amounts = account_amounts(ctx.converter, &currency, &record)?;
            Ok((record, amounts))
        });
        match converted {
            Ok((record, amounts)) => {
                let (account, change) =
                    accounts.reconcile(record.account_id, &record.attributes, ctx.now);
                progress.stats.count_entity(change);

                let change = facts.upsert_fact(account.account_id, amounts);
                progress.stats.count_fact(change);
                progress.transformed(json!({
                    "account_id": account.account_id,
                    "account_name": account.account_name,
                    "currency": account.currency,
                    "balance": amounts.amount,
                    "balance_byn": amounts.amount_reporting,
                    "processing_date": ctx.processing_date,
                }));
            }
            Err(error) => progress.skip(idx, error),
        }
        if idx > 0 && idx % ctx.flush_stride == 0 {
            flush(tx, ctx, &mut accounts, &mut facts).await?;
        }
    }
    flush(tx, ctx, &mut accounts, &mut facts).await?;
    Ok(())
}

/// Source and reporting balances, rounded to the fact columns.
fn account_amounts(
    converter: &CurrencyConverter,
    currency: &str,
    record: &AccountRecord,
) -> Result<FactAmounts, RecordError> {
    let fit = |amount| fit_amount(amount, ACCOUNT_AMOUNT_SCALE, ACCOUNT_AMOUNT_INTEGER_DIGITS);
    let balance = fit(record.balance).map_err(RecordError::amount(Field::Balance))?;
    let supplied = record
        .balance_reporting
        .map(|amount| fit(amount).map_err(RecordError::amount(Field::BalanceReporting)))
        .transpose()?;
    let balance_byn = converter
        .to_reporting(currency, balance, supplied)
        .and_then(fit)
        .map_err(RecordError::amount(Field::BalanceReporting))?;
    Ok(FactAmounts {
        amount: balance,
        amount_reporting: balance_byn,
    })
}

async fn flush(
    tx: &mut dyn WarehouseTx,
    ctx: &BatchContext<'_>,
    accounts: &mut AccountReconciler,
    facts: &mut FactWriter<AccountId>,
) -> Result<(), EtlError> {
    let written = accounts.flush(tx).await?;
    let staged = facts.take_staged();
    let to_row = |(account_id, amounts): (AccountId, FactAmounts)| {
        DailyAccountBalance::new(account_id, ctx.date_id, amounts, ctx.processing_date)
    };
    let inserts: Vec<_> = staged.inserts.into_iter().map(to_row).collect();
    let updates: Vec<_> = staged.updates.into_iter().map(to_row).collect();
    tx.insert_account_balances(&inserts).await?;
    tx.update_account_balances(&updates).await?;
    tracing::debug!(
        accounts_inserted = written.inserted,
        accounts_updated = written.updated,
        facts_inserted = inserts.len(),
        facts_updated = updates.len(),
        "account batch flushed"
    );
    Ok(())
}
