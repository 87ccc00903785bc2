use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FactAmounts;
use crate::primitives::{AccountId, DateId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyAccountBalance {
    pub account_id: AccountId,
    pub date_id: DateId,
    pub balance: Decimal,
    pub balance_byn: Decimal,
    pub processing_date: NaiveDate,
}

impl DailyAccountBalance {
    pub fn new(
        account_id: AccountId,
        date_id: DateId,
        amounts: FactAmounts,
        processing_date: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            date_id,
            balance: amounts.amount,
            balance_byn: amounts.amount_reporting,
            processing_date,
        }
    }

    pub fn amounts(&self) -> FactAmounts {
        FactAmounts {
            amount: self.balance,
            amount_reporting: self.balance_byn,
        }
    }
}
