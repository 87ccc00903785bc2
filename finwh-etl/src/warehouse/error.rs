use thiserror::Error;

use crate::{
    batch::{error::EnvelopeError, state::BatchState},
    date_dim::error::DateDimensionError,
    primitives::LoanSourceId,
    sink::error::SinkError,
    store::error::StoreError,
};

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("EtlError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("EtlError - Migrate: {0}")]
    SqlxMigrate(#[from] sqlx::migrate::MigrateError),
    #[error("EtlError - Config: {0}")]
    ConfigError(String),
    #[error("EtlError - Store: {0}")]
    Store(#[from] StoreError),
    #[error("EtlError - DateDimension: {0}")]
    DateDimension(#[from] DateDimensionError),
    #[error("EtlError - Envelope: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("EtlError - Sink: {0}")]
    Sink(#[from] SinkError),
    #[error("EtlError - InvalidTransition: {from} -> {to}")]
    InvalidTransition { from: BatchState, to: BatchState },
    #[error("EtlError - MissingLoanId: loan '{0}' has no warehouse id after flush")]
    MissingLoanId(LoanSourceId),
}
