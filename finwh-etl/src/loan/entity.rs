use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::primitives::{LoanId, LoanSourceId};

pub const DEFAULT_STATUS: &str = "active";

/// Stored loan row: surrogate id plus the reconciled values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: LoanId,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub values: LoanValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The tracked columns of a loan, keyed by the source system's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanValues {
    pub source_loan_id: LoanSourceId,
    pub contract_number: String,
    pub contract_date: Option<NaiveDate>,
    pub initial_amount: Decimal,
    pub loan_currency: String,
    pub current_debt: Decimal,
    pub current_debt_byn: Decimal,
    pub interest_rate: Decimal,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanAttributes {
    pub contract_number: Option<String>,
    pub contract_date: Option<NaiveDate>,
    pub initial_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub interest_rate: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
}

/// Debt snapshot carried by every loan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanDebt {
    pub current_debt: Decimal,
    pub current_debt_byn: Decimal,
}

impl LoanValues {
    pub fn new(
        source_loan_id: LoanSourceId,
        attributes: &LoanAttributes,
        debt: LoanDebt,
        default_currency: &str,
    ) -> Self {
        Self {
            contract_number: attributes
                .contract_number
                .clone()
                .unwrap_or_else(|| format!("LOAN-{source_loan_id}")),
            source_loan_id,
            contract_date: attributes.contract_date,
            initial_amount: attributes.initial_amount.unwrap_or(Decimal::ZERO),
            loan_currency: attributes
                .currency
                .clone()
                .unwrap_or_else(|| default_currency.to_string()),
            current_debt: debt.current_debt,
            current_debt_byn: debt.current_debt_byn,
            interest_rate: attributes.interest_rate.unwrap_or(Decimal::ZERO),
            start_date: attributes.start_date,
            end_date: attributes.end_date,
            status: attributes
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        }
    }

    /// Dirty-check: returns whether any tracked column changed.
    pub fn apply(&mut self, attributes: &LoanAttributes, debt: LoanDebt) -> bool {
        let mut changed = false;
        changed |= set_if_differs(&mut self.contract_number, attributes.contract_number.clone());
        changed |= set_opt_if_differs(&mut self.contract_date, attributes.contract_date);
        changed |= set_if_differs(&mut self.initial_amount, attributes.initial_amount);
        changed |= set_if_differs(&mut self.loan_currency, attributes.currency.clone());
        changed |= set_if_differs(&mut self.interest_rate, attributes.interest_rate);
        changed |= set_opt_if_differs(&mut self.start_date, attributes.start_date);
        changed |= set_opt_if_differs(&mut self.end_date, attributes.end_date);
        changed |= set_if_differs(&mut self.status, attributes.status.clone());
        changed |= set_if_differs(&mut self.current_debt, Some(debt.current_debt));
        changed |= set_if_differs(&mut self.current_debt_byn, Some(debt.current_debt_byn));
        changed
    }
}

fn set_if_differs<T: PartialEq>(current: &mut T, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) if &value != current => {
            *current = value;
            true
        }
        _ => false,
    }
}

fn set_opt_if_differs<T: PartialEq>(current: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) if current.as_ref() != Some(&value) => {
            *current = Some(value);
            true
        }
        _ => false,
    }
}
