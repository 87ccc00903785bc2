//! Loan dimension. Loans are keyed by the source system's identifier and
//! receive a warehouse surrogate id on first insert.
mod entity;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::instrument;

use crate::{
    batch::error::RecordError,
    currency::parse_amount,
    field::{value_as_date, value_as_text, Field, FieldAliases, FieldError, Record},
    primitives::{LoanId, LoanSourceId},
    staging::{Change, EntityFlush, WorkingSet},
    store::{StoreError, WarehouseTx},
};

pub use entity::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    pub source_loan_id: LoanSourceId,
    pub attributes: LoanAttributes,
    pub debt: Decimal,
}

impl LoanRecord {
    pub fn extract(record: &Record, aliases: &FieldAliases) -> Result<Self, RecordError> {
        let source_loan_id = aliases
            .resolve(record, Field::Id)
            .and_then(value_as_text)
            .map(LoanSourceId::from)
            .ok_or(FieldError::Missing(Field::Id))?;

        let debt = match aliases.resolve(record, Field::Debt) {
            Some(value) => parse_amount(value).map_err(RecordError::amount(Field::Debt))?,
            None => {
                tracing::warn!(%source_loan_id, "loan record without debt, using 0");
                Decimal::ZERO
            }
        };
        let amount = |field: Field| {
            aliases
                .resolve(record, field)
                .map(parse_amount)
                .transpose()
                .map_err(RecordError::amount(field))
        };
        let date = |field: Field| -> Option<NaiveDate> {
            let value = aliases.resolve(record, field)?;
            match value_as_date(field, value) {
                Ok(date) => Some(date),
                Err(e) => {
                    tracing::warn!(%source_loan_id, error = %e, "ignoring unparsable loan date");
                    None
                }
            }
        };

        let attributes = LoanAttributes {
            contract_number: aliases.resolve_text(record, Field::ContractNumber),
            contract_date: date(Field::ContractDate),
            initial_amount: amount(Field::InitialAmount)?,
            currency: aliases
                .resolve_text(record, Field::Currency)
                .map(|c| c.to_uppercase()),
            interest_rate: amount(Field::InterestRate)?,
            start_date: date(Field::StartDate),
            end_date: date(Field::EndDate),
            status: aliases.resolve_text(record, Field::Status),
        };
        Ok(Self {
            source_loan_id,
            attributes,
            debt,
        })
    }
}

pub struct LoanReconciler {
    loans: WorkingSet<LoanSourceId, LoanValues>,
    ids: BTreeMap<LoanSourceId, LoanId>,
    default_currency: String,
}

impl LoanReconciler {
    #[instrument(name = "finwh.loans.prefetch", skip(tx, ids), fields(n_ids = ids.len()), err)]
    pub async fn prefetch(
        tx: &mut dyn WarehouseTx,
        ids: &[LoanSourceId],
        default_currency: &str,
    ) -> Result<Self, StoreError> {
        let existing = tx.find_loans(ids).await?;
        let ids = existing
            .iter()
            .map(|loan| (loan.values.source_loan_id.clone(), loan.id))
            .collect();
        Ok(Self {
            loans: WorkingSet::with_known(
                existing
                    .into_iter()
                    .map(|loan| (loan.values.source_loan_id.clone(), loan.values)),
            ),
            ids,
            default_currency: default_currency.to_string(),
        })
    }

    /// Currency the debt is expressed in: the record's, else the stored one,
    /// else the reporting currency.
    pub fn effective_currency(&self, source_loan_id: &LoanSourceId, attributes: &LoanAttributes) -> String {
        attributes
            .currency
            .clone()
            .or_else(|| {
                self.loans
                    .get(source_loan_id)
                    .map(|loan| loan.loan_currency.clone())
            })
            .unwrap_or_else(|| self.default_currency.clone())
    }

    pub fn reconcile(
        &mut self,
        source_loan_id: &LoanSourceId,
        attributes: &LoanAttributes,
        debt: LoanDebt,
    ) -> (LoanValues, Change) {
        match self.loans.get(source_loan_id) {
            None => {
                let loan = LoanValues::new(
                    source_loan_id.clone(),
                    attributes,
                    debt,
                    &self.default_currency,
                );
                self.loans.stage_insert(source_loan_id.clone(), loan.clone());
                (loan, Change::Created)
            }
            Some(current) => {
                let mut loan = current.clone();
                if loan.apply(attributes, debt) {
                    self.loans.stage_update(source_loan_id.clone(), loan.clone());
                    (loan, Change::Updated)
                } else {
                    (loan, Change::Unchanged)
                }
            }
        }
    }

    pub fn loan_id(&self, source_loan_id: &LoanSourceId) -> Option<LoanId> {
        self.ids.get(source_loan_id).copied()
    }

    pub fn known_ids(&self) -> Vec<LoanId> {
        self.ids.values().copied().collect()
    }

    /// Writes buffered loans. Inserted loans get their surrogate id recorded.
    #[instrument(name = "finwh.loans.flush", skip_all, err)]
    pub async fn flush(
        &mut self,
        tx: &mut dyn WarehouseTx,
        now: DateTime<Utc>,
    ) -> Result<EntityFlush, StoreError> {
        let staged = self.loans.take_staged();
        if staged.is_empty() {
            return Ok(EntityFlush::default());
        }
        let inserts: Vec<LoanValues> = staged.inserts.into_iter().map(|(_, l)| l).collect();
        let updates: Vec<LoanValues> = staged.updates.into_iter().map(|(_, l)| l).collect();
        let new_ids = tx.insert_loans(&inserts, now).await?;
        let inserted = new_ids.len() as u64;
        self.ids.extend(new_ids);
        let updated = tx.update_loans(&updates, now).await?;
        Ok(EntityFlush { inserted, updated })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn extracts_loan_record() {
        let rec = record(json!({
            "ID": 1001,
            "Номер договора": "K-1",
            "Дата договора": "01.02.2024",
            "Сумма займа": "10 000,00",
            "Долг": "7 500,5",
            "Валюта займа": "eur",
            "Процентная ставка": 12.5,
            "Дата окончания": "2026-02-01",
            "Дата начала": "not a date",
        }));
        let loan = LoanRecord::extract(&rec, &FieldAliases::loans()).unwrap();
        assert_eq!(loan.source_loan_id, LoanSourceId::from("1001"));
        assert_eq!(loan.debt, dec!(7500.5));
        assert_eq!(loan.attributes.initial_amount, Some(dec!(10000)));
        assert_eq!(loan.attributes.interest_rate, Some(dec!(12.5)));
        assert_eq!(loan.attributes.currency.as_deref(), Some("EUR"));
        assert_eq!(
            loan.attributes.contract_date,
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(loan.attributes.end_date, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(loan.attributes.start_date, None);
    }

    #[test]
    fn loan_without_id_is_rejected() {
        let rec = record(json!({ "Долг": 5 }));
        assert_eq!(
            LoanRecord::extract(&rec, &FieldAliases::loans()),
            Err(RecordError::Field(FieldError::Missing(Field::Id)))
        );
    }
}
