use thiserror::Error;

use super::FailPoint;
use crate::primitives::DateId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("StoreError - Sqlx: {0}")]
    Sqlx(sqlx::Error),
    #[error("StoreError - ConstraintViolation: {0}")]
    ConstraintViolation(String),
    #[error("StoreError - Injected: failure at {0}")]
    Injected(FailPoint),
    #[error("StoreError - AggregateOverflow: totals of {0} do not fit a decimal")]
    AggregateOverflow(DateId),
    #[error("StoreError - TransactionClosed")]
    TransactionClosed,
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(constraint) = error
            .as_database_error()
            .and_then(|e| e.constraint())
            .map(|c| c.to_string())
        {
            return Self::ConstraintViolation(constraint);
        }
        Self::Sqlx(error)
    }
}
