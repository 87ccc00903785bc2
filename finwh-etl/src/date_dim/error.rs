use thiserror::Error;

use crate::store::error::StoreError;

#[derive(Error, Debug)]
pub enum DateDimensionError {
    #[error("DateDimensionError - Store: {0}")]
    Store(#[from] StoreError),
    #[error("DateDimensionError - NotResolved: {0}")]
    NotResolved(chrono::NaiveDate),
    #[error("DateDimensionError - InvalidRange: {start} > {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}
