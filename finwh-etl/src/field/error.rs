use thiserror::Error;

use super::Field;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("FieldError - Missing: no value for '{0}'")]
    Missing(Field),
    #[error("FieldError - InvalidInteger: '{value}' in '{field}'")]
    InvalidInteger { field: Field, value: String },
    #[error("FieldError - InvalidDate: '{value}' in '{field}'")]
    InvalidDate { field: Field, value: String },
}
