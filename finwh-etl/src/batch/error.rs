use thiserror::Error;

use crate::{currency::AmountError, field::{Field, FieldError}};

/// Why a single record was skipped. Never aborts the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("RecordError - Field: {0}")]
    Field(#[from] FieldError),
    #[error("RecordError - Amount: '{field}': {source}")]
    Amount { field: Field, source: AmountError },
}

impl RecordError {
    pub fn amount(field: Field) -> impl FnOnce(AmountError) -> Self {
        move |source| Self::Amount { field, source }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("EnvelopeError - NotAnObject: the payload must be a JSON object")]
    NotAnObject,
    #[error("EnvelopeError - KeyCount: expected exactly one top-level key, found {0}")]
    KeyCount(usize),
    #[error("EnvelopeError - UnsupportedKind: '{0}'")]
    UnsupportedKind(String),
    #[error("EnvelopeError - NotAList: the value of '{0}' must be a list")]
    NotAList(String),
    #[error("EnvelopeError - RecordNotAnObject: record {index} of '{kind}' is not an object")]
    RecordNotAnObject { kind: String, index: usize },
}
