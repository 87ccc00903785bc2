use thiserror::Error;

use finwh_etl::{error::EtlError, FinWarehouseConfigBuilderError};

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("ApplicationError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("ApplicationError - Etl: {0}")]
    Etl(#[from] EtlError),
    #[error("ApplicationError - Config: {0}")]
    Config(#[from] FinWarehouseConfigBuilderError),
}
