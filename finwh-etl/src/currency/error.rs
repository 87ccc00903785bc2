use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("AmountError - Unparsable: '{0}'")]
    Unparsable(String),
    #[error("AmountError - NotScalar: {0}")]
    NotScalar(String),
    #[error("AmountError - Overflow: {amount} * {rate}")]
    Overflow { amount: String, rate: String },
    #[error("AmountError - OutOfRange: {value} needs more than {integer_digits} integer digits")]
    OutOfRange { value: String, integer_digits: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateConfigError {
    #[error("RateConfigError - Malformed: {var}='{value}'")]
    Malformed { var: String, value: String },
    #[error("RateConfigError - NonPositive: {var}='{value}'")]
    NonPositive { var: String, value: String },
}
