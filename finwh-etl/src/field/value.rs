use chrono::NaiveDate;
use serde_json::Value;

use super::{error::FieldError, Field};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

/// Textual form of a scalar value. Blank strings, arrays and objects have none.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn value_as_i64(field: Field, value: &Value) -> Result<i64, FieldError> {
    let invalid = || FieldError::InvalidInteger {
        field,
        value: value_as_text(value).unwrap_or_else(|| value.to_string()),
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Parses `YYYY-MM-DD` or `DD.MM.YYYY`. A trailing time component after the
/// ISO date is ignored.
pub fn value_as_date(field: Field, value: &Value) -> Result<NaiveDate, FieldError> {
    let text = value_as_text(value).ok_or_else(|| FieldError::InvalidDate {
        field,
        value: value.to_string(),
    })?;
    parse_date(&text).ok_or(FieldError::InvalidDate { field, value: text })
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let candidate = match text.split_once(['T', ' ']) {
        Some((date, _)) if date.contains('-') => date,
        _ => text,
    };
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
}
