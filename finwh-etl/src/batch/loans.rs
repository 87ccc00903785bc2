use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use super::{error::RecordError, report::BatchProgress, BatchContext};
use crate::{
    currency::{
        fit_amount, CurrencyConverter, INTEREST_RATE_INTEGER_DIGITS, INTEREST_RATE_SCALE,
        LOAN_AMOUNT_INTEGER_DIGITS, LOAN_AMOUNT_SCALE,
    },
    fact::{DailyLoanBalance, FactAmounts, FactWriter},
    field::{Field, Record},
    loan::{LoanDebt, LoanReconciler, LoanRecord},
    primitives::{LoanId, LoanSourceId},
    store::WarehouseTx,
    warehouse::error::EtlError,
};

/// Loan counterpart of the account pipeline. Facts are tracked by the source
/// identifier because new loans only get their surrogate id when flushed.
pub(super) async fn process_loans(
    tx: &mut dyn WarehouseTx,
    ctx: &BatchContext<'_>,
    records: &[Record],
    progress: &mut BatchProgress,
) -> Result<(), EtlError> {
    let extracted: Vec<_> = records
        .iter()
        .map(|record| LoanRecord::extract(record, ctx.aliases))
        .collect();
    let ids: Vec<LoanSourceId> = extracted
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|r| r.source_loan_id.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut loans = LoanReconciler::prefetch(tx, &ids, ctx.converter.reporting_currency()).await?;
    let by_loan_id: BTreeMap<LoanId, LoanSourceId> = ids
        .iter()
        .filter_map(|source| loans.loan_id(source).map(|id| (id, source.clone())))
        .collect();
    let existing = tx
        .find_loan_balances(ctx.date_id, &loans.known_ids())
        .await?;
    let mut facts = FactWriter::new(existing.iter().filter_map(|fact| {
        by_loan_id
            .get(&fact.loan_id)
            .map(|source| (source.clone(), fact.amounts()))
    }));

    for (idx, extracted) in extracted.into_iter().enumerate() {
        let converted = extracted.and_then(|mut record| {
            let currency = loans.effective_currency(&record.source_loan_id, &record.attributes);
            let debt = loan_amounts(ctx.converter, &currency, &mut record)?;
            Ok((record, debt))
        });
        match converted {
            Ok((record, debt)) => {
                let LoanDebt {
                    current_debt,
                    current_debt_byn,
                } = debt;
                let (loan, change) = loans.reconcile(&record.source_loan_id, &record.attributes, debt);
                progress.stats.count_entity(change);
                let change = facts.upsert_fact(
                    record.source_loan_id.clone(),
                    FactAmounts {
                        amount: current_debt,
                        amount_reporting: current_debt_byn,
                    },
                );
                progress.stats.count_fact(change);
                progress.transformed(json!({
                    "source_loan_id": loan.source_loan_id,
                    "contract_number": loan.contract_number,
                    "contract_date": loan.contract_date,
                    "initial_amount": loan.initial_amount,
                    "loan_currency": loan.loan_currency,
                    "current_debt": loan.current_debt,
                    "current_debt_byn": loan.current_debt_byn,
                    "interest_rate": loan.interest_rate,
                    "start_date": loan.start_date,
                    "end_date": loan.end_date,
                    "status": loan.status,
                    "processing_date": ctx.processing_date,
                }));
            }
            Err(error) => progress.skip(idx, error),
        }
        if idx > 0 && idx % ctx.flush_stride == 0 {
            flush(tx, ctx, &mut loans, &mut facts).await?;
        }
    }
    flush(tx, ctx, &mut loans, &mut facts).await?;
    Ok(())
}

/// Rounds the record's amounts to their columns and converts the debt.
fn loan_amounts(
    converter: &CurrencyConverter,
    currency: &str,
    record: &mut LoanRecord,
) -> Result<LoanDebt, RecordError> {
    let fit = |amount| fit_amount(amount, LOAN_AMOUNT_SCALE, LOAN_AMOUNT_INTEGER_DIGITS);
    let attributes = &mut record.attributes;
    attributes.initial_amount = attributes
        .initial_amount
        .map(|amount| fit(amount).map_err(RecordError::amount(Field::InitialAmount)))
        .transpose()?;
    attributes.interest_rate = attributes
        .interest_rate
        .map(|rate| {
            fit_amount(rate, INTEREST_RATE_SCALE, INTEREST_RATE_INTEGER_DIGITS)
                .map_err(RecordError::amount(Field::InterestRate))
        })
        .transpose()?;
    let current_debt = fit(record.debt).map_err(RecordError::amount(Field::Debt))?;
    let current_debt_byn = converter
        .to_reporting(currency, current_debt, None)
        .and_then(fit)
        .map_err(RecordError::amount(Field::Debt))?;
    Ok(LoanDebt {
        current_debt,
        current_debt_byn,
    })
}

async fn flush(
    tx: &mut dyn WarehouseTx,
    ctx: &BatchContext<'_>,
    loans: &mut LoanReconciler,
    facts: &mut FactWriter<LoanSourceId>,
) -> Result<(), EtlError> {
    let written = loans.flush(tx, ctx.now).await?;
    let staged = facts.take_staged();
    let to_row = |(source, amounts): (LoanSourceId, FactAmounts)| {
        loans
            .loan_id(&source)
            .map(|loan_id| DailyLoanBalance::new(loan_id, ctx.date_id, amounts))
            .ok_or(EtlError::MissingLoanId(source))
    };
    let inserts = staged
        .inserts
        .into_iter()
        .map(to_row)
        .collect::<Result<Vec<_>, _>>()?;
    let updates = staged
        .updates
        .into_iter()
        .map(to_row)
        .collect::<Result<Vec<_>, _>>()?;
    tx.insert_loan_balances(&inserts).await?;
    tx.update_loan_balances(&updates).await?;
    tracing::debug!(
        loans_inserted = written.inserted,
        loans_updated = written.updated,
        facts_inserted = inserts.len(),
        facts_updated = updates.len(),
        "loan batch flushed"
    );
    Ok(())
}
