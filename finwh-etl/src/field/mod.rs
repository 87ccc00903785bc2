//! Canonical field lookup over loosely keyed source records.
//!
//! Upstream producers spell the same concept several ways ("balance",
//! "баланс", "Остаток"). Each canonical [Field] owns an ordered alias list and
//! the first alias carrying a non-null value wins.
pub mod error;
mod value;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::primitives::EntityKind;

pub use error::FieldError;
pub use value::*;

pub type Record = serde_json::Map<String, Value>;

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
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Id,
    AccountName,
    Balance,
    BalanceReporting,
    Currency,
    Owner,
    Status,
    ContractNumber,
    ContractDate,
    InitialAmount,
    Debt,
    InterestRate,
    StartDate,
    EndDate,
}

pub type FieldAliasOverrides = BTreeMap<EntityKind, BTreeMap<Field, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAliases {
    aliases: BTreeMap<Field, Vec<String>>,
}

impl FieldAliases {
    pub fn new(aliases: BTreeMap<Field, Vec<String>>) -> Self {
        Self { aliases }
    }

    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::BankAccounts => Self::bank_accounts(),
            EntityKind::Loans => Self::loans(),
        }
    }

    pub fn bank_accounts() -> Self {
        Self::from_table(&[
            (
                Field::Id,
                &["ID", "id", "ид", "идентификатор", "account_id", "accountId"],
            ),
            (
                Field::AccountName,
                &[
                    "account_name",
                    "accountName",
                    "название_счета",
                    "названиеСчета",
                    "Название счета",
                ],
            ),
            (Field::Balance, &["balance", "баланс", "Остаток"]),
            (
                Field::BalanceReporting,
                &["balance_byn", "balanceBYN", "баланс_бел", "Остаток BLR"],
            ),
            (Field::Currency, &["currency", "валюта", "Валюта"]),
            (Field::Owner, &["owner_id", "ownerId", "владелец", "Владелец"]),
            (Field::Status, &["status", "статус", "Статус"]),
        ])
    }

    pub fn loans() -> Self {
        Self::from_table(&[
            (
                Field::Id,
                &["ID", "id", "ид", "идентификатор", "loan_id", "loanId"],
            ),
            (
                Field::ContractNumber,
                &["contract_number", "contractNumber", "Номер договора"],
            ),
            (
                Field::ContractDate,
                &["contract_date", "contractDate", "Дата договора", "дата_договора"],
            ),
            (
                Field::InitialAmount,
                &[
                    "initial_amount",
                    "initialAmount",
                    "начальная_сумма",
                    "Начальная сумма",
                    "Сумма займа",
                ],
            ),
            (Field::Debt, &["Долг", "debt", "current_debt"]),
            (
                Field::Currency,
                &["currency", "валюта", "Валюта", "Валюта займа"],
            ),
            (
                Field::InterestRate,
                &[
                    "interest_rate",
                    "interestRate",
                    "процентная_ставка",
                    "Процентная ставка",
                ],
            ),
            (
                Field::StartDate,
                &["start_date", "startDate", "дата_начала", "Дата начала"],
            ),
            (
                Field::EndDate,
                &["end_date", "endDate", "дата_окончания", "Дата окончания"],
            ),
            (Field::Status, &["status", "статус", "Статус"]),
        ])
    }

    /// Replaces the alias list of every field named in `overrides`.
    pub fn with_overrides(mut self, overrides: &BTreeMap<Field, Vec<String>>) -> Self {
        for (field, aliases) in overrides {
            self.aliases.insert(*field, aliases.clone());
        }
        self
    }

    pub fn aliases(&self, field: Field) -> Option<&[String]> {
        self.aliases.get(&field).map(|a| a.as_slice())
    }

    /// First non-null value among the aliases of `field`.
    ///
    /// A field without registered aliases is probed under its canonical name.
    pub fn resolve<'a>(&self, record: &'a Record, field: Field) -> Option<&'a Value> {
        match self.aliases.get(&field) {
            Some(aliases) => aliases
                .iter()
                .filter_map(|alias| record.get(alias))
                .find(|value| !value.is_null()),
            None => record.get(field.as_ref()).filter(|value| !value.is_null()),
        }
    }

    pub fn resolve_or<'a>(&self, record: &'a Record, field: Field, default: &'a Value) -> &'a Value {
        self.resolve(record, field).unwrap_or(default)
    }

    pub fn resolve_text(&self, record: &Record, field: Field) -> Option<String> {
        self.resolve(record, field).and_then(value_as_text)
    }

    fn from_table(table: &[(Field, &[&str])]) -> Self {
        Self {
            aliases: table
                .iter()
                .map(|(field, aliases)| (*field, aliases.iter().map(|a| a.to_string()).collect()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AliasRegistry {
    bank_accounts: FieldAliases,
    loans: FieldAliases,
}

impl AliasRegistry {
    pub fn new(overrides: &FieldAliasOverrides) -> Self {
        let for_kind = |kind: EntityKind| match overrides.get(&kind) {
            Some(fields) => FieldAliases::for_kind(kind).with_overrides(fields),
            None => FieldAliases::for_kind(kind),
        };
        Self {
            bank_accounts: for_kind(EntityKind::BankAccounts),
            loans: for_kind(EntityKind::Loans),
        }
    }

    pub fn get(&self, kind: EntityKind) -> &FieldAliases {
        match kind {
            EntityKind::BankAccounts => &self.bank_accounts,
            EntityKind::Loans => &self.loans,
        }
    }
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new(&FieldAliasOverrides::default())
    }
}
