//! Account dimension: record extraction and reconciliation against the
//! stored current state.
mod entity;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::{
    batch::error::RecordError,
    currency::parse_amount,
    field::{value_as_i64, Field, FieldAliases, FieldError, Record},
    primitives::AccountId,
    staging::{Change, EntityFlush, WorkingSet},
    store::{StoreError, WarehouseTx},
};

pub use entity::*;

/// The canonical view of one bank account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub attributes: AccountAttributes,
    pub balance: Decimal,
    pub balance_reporting: Option<Decimal>,
}

impl AccountRecord {
    pub fn extract(record: &Record, aliases: &FieldAliases) -> Result<Self, RecordError> {
        let account_id = aliases
            .resolve(record, Field::Id)
            .ok_or(FieldError::Missing(Field::Id))
            .and_then(|value| value_as_i64(Field::Id, value))
            .map(AccountId::from)?;

        let balance = match aliases.resolve(record, Field::Balance) {
            Some(value) => parse_amount(value).map_err(RecordError::amount(Field::Balance))?,
            None => {
                tracing::warn!(%account_id, "account record without balance, using 0");
                Decimal::ZERO
            }
        };
        let balance_reporting = aliases
            .resolve(record, Field::BalanceReporting)
            .map(parse_amount)
            .transpose()
            .map_err(RecordError::amount(Field::BalanceReporting))?;

        Ok(Self {
            account_id,
            attributes: AccountAttributes {
                account_name: aliases.resolve_text(record, Field::AccountName),
                currency: aliases
                    .resolve_text(record, Field::Currency)
                    .map(|c| c.to_uppercase()),
                status: aliases.resolve_text(record, Field::Status),
                owner_id: aliases.resolve_text(record, Field::Owner),
            },
            balance,
            balance_reporting,
        })
    }
}

/// Current state of the batch's accounts, with buffered inserts and updates.
pub struct AccountReconciler {
    accounts: WorkingSet<AccountId, Account>,
    default_currency: String,
    processing_date: NaiveDate,
}

impl AccountReconciler {
    #[instrument(name = "finwh.accounts.prefetch", skip(tx, ids), fields(n_ids = ids.len()), err)]
    pub async fn prefetch(
        tx: &mut dyn WarehouseTx,
        ids: &[AccountId],
        default_currency: &str,
        processing_date: NaiveDate,
    ) -> Result<Self, StoreError> {
        let existing = tx.find_accounts(ids).await?;
        Ok(Self {
            accounts: WorkingSet::with_known(existing.into_iter().map(|a| (a.account_id, a))),
            default_currency: default_currency.to_string(),
            processing_date,
        })
    }

    /// Currency the account will carry once `attributes` are applied.
    pub fn effective_currency(&self, account_id: AccountId, attributes: &AccountAttributes) -> String {
        attributes
            .currency
            .clone()
            .or_else(|| self.accounts.get(&account_id).map(|a| a.currency.clone()))
            .unwrap_or_else(|| self.default_currency.clone())
    }

    pub fn reconcile(
        &mut self,
        account_id: AccountId,
        attributes: &AccountAttributes,
        now: DateTime<Utc>,
    ) -> (Account, Change) {
        match self.accounts.get(&account_id) {
            None => {
                let account = Account::new(
                    account_id,
                    attributes,
                    &self.default_currency,
                    self.processing_date,
                    now,
                );
                self.accounts.stage_insert(account_id, account.clone());
                (account, Change::Created)
            }
            Some(current) => {
                let mut account = current.clone();
                if account.apply(attributes, now) {
                    self.accounts.stage_update(account_id, account.clone());
                    (account, Change::Updated)
                } else {
                    (account, Change::Unchanged)
                }
            }
        }
    }

    #[instrument(name = "finwh.accounts.flush", skip_all, err)]
    pub async fn flush(&mut self, tx: &mut dyn WarehouseTx) -> Result<EntityFlush, StoreError> {
        let staged = self.accounts.take_staged();
        if staged.is_empty() {
            return Ok(EntityFlush::default());
        }
        let inserts: Vec<Account> = staged.inserts.into_iter().map(|(_, a)| a).collect();
        let updates: Vec<Account> = staged.updates.into_iter().map(|(_, a)| a).collect();
        let inserted = tx.insert_accounts(&inserts).await?;
        let updated = tx.update_accounts(&updates).await?;
        Ok(EntityFlush { inserted, updated })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::currency::AmountError;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn extracts_multilingual_record() {
        let rec = record(json!({
            "ид": "42",
            "Название счета": "Основной",
            "Остаток": "1 234,56",
            "Остаток BLR": "3 790,10",
            "Валюта": "usd",
        }));
        let extracted = AccountRecord::extract(&rec, &FieldAliases::bank_accounts()).unwrap();
        assert_eq!(extracted.account_id, AccountId::from(42));
        assert_eq!(extracted.balance, dec!(1234.56));
        assert_eq!(extracted.balance_reporting, Some(dec!(3790.10)));
        assert_eq!(extracted.attributes.currency.as_deref(), Some("USD"));
        assert_eq!(extracted.attributes.account_name.as_deref(), Some("Основной"));
        assert_eq!(extracted.attributes.owner_id, None);
    }

    #[test]
    fn missing_or_bad_key_is_a_record_error() {
        let aliases = FieldAliases::bank_accounts();
        assert_eq!(
            AccountRecord::extract(&record(json!({ "balance": 1 })), &aliases),
            Err(RecordError::Field(FieldError::Missing(Field::Id)))
        );
        assert!(matches!(
            AccountRecord::extract(&record(json!({ "id": "abc" })), &aliases),
            Err(RecordError::Field(FieldError::InvalidInteger { .. }))
        ));
        assert!(matches!(
            AccountRecord::extract(&record(json!({ "id": 1, "balance": "n/a" })), &aliases),
            Err(RecordError::Amount {
                field: Field::Balance,
                source: AmountError::Unparsable(_)
            })
        ));
    }

    #[test]
    fn missing_balance_defaults_to_zero() {
        let rec = record(json!({ "id": 3 }));
        let extracted = AccountRecord::extract(&rec, &FieldAliases::bank_accounts()).unwrap();
        assert_eq!(extracted.balance, Decimal::ZERO);
        assert_eq!(extracted.balance_reporting, None);
    }
}
