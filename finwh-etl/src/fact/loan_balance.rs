use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FactAmounts;
use crate::primitives::{DateId, LoanId};

/// Daily debt snapshot of one loan.
///
/// `total_repaid_byn` is not per loan: every row of a day carries the sum of
/// that day's `current_debt_byn` over all loans. See
/// [crate::summary::stamp_total_repaid_with_day_debt].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyLoanBalance {
    pub loan_id: LoanId,
    pub date_id: DateId,
    pub current_debt: Decimal,
    pub current_debt_byn: Decimal,
    pub total_repaid_byn: Decimal,
}

impl DailyLoanBalance {
    pub fn new(loan_id: LoanId, date_id: DateId, amounts: FactAmounts) -> Self {
        Self {
            loan_id,
            date_id,
            current_debt: amounts.amount,
            current_debt_byn: amounts.amount_reporting,
            total_repaid_byn: Decimal::ZERO,
        }
    }

    pub fn amounts(&self) -> FactAmounts {
        FactAmounts {
            amount: self.current_debt,
            amount_reporting: self.current_debt_byn,
        }
    }
}
