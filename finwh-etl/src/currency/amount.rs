use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

use super::error::AmountError;

pub const ACCOUNT_AMOUNT_SCALE: u32 = 2;
pub const LOAN_AMOUNT_SCALE: u32 = 4;
pub const INTEREST_RATE_SCALE: u32 = 2;

/// Integer digits left by the `NUMERIC(p, s)` column an amount is stored in.
pub const ACCOUNT_AMOUNT_INTEGER_DIGITS: u32 = 16;
pub const LOAN_AMOUNT_INTEGER_DIGITS: u32 = 15;
pub const INTEREST_RATE_INTEGER_DIGITS: u32 = 3;

/// Normalises a locale formatted amount ("1 234,56", "1.234,56", " 12,5 ",
/// "1,234.56") into the plain `1234.56` layout accepted by [Decimal].
///
/// When both separators appear the last one is the decimal separator and the
/// other one groups thousands. Text where that reading is ambiguous is
/// rejected.
pub fn normalize_amount_text(raw: &str) -> Result<String, AmountError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let unparsable = || AmountError::Unparsable(raw.to_string());
    let decimal_sep = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ',',
        (Some(_), Some(_)) => '.',
        (Some(_), None) => ',',
        (None, _) => return Ok(compact),
    };
    let group_sep = if decimal_sep == ',' { '.' } else { ',' };
    if compact.matches(decimal_sep).count() > 1 {
        return Err(unparsable());
    }
    let (int_part, frac_part) = compact.split_once(decimal_sep).ok_or_else(unparsable)?;
    if frac_part.contains(group_sep) {
        return Err(unparsable());
    }
    let int_part: String = int_part.chars().filter(|c| *c != group_sep).collect();
    Ok(format!("{int_part}.{frac_part}"))
}

pub fn parse_amount_text(raw: &str) -> Result<Decimal, AmountError> {
    let normalized = normalize_amount_text(raw)?;
    if normalized.is_empty() {
        return Err(AmountError::Unparsable(raw.to_string()));
    }
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| AmountError::Unparsable(raw.to_string()))
}

/// Exact decimal from a JSON scalar. Numbers go through their textual form so
/// that `0.1` stays `0.1`.
pub fn parse_amount(value: &Value) -> Result<Decimal, AmountError> {
    match value {
        Value::Number(n) => parse_amount_text(&n.to_string()),
        Value::String(s) => parse_amount_text(s),
        other => Err(AmountError::NotScalar(other.to_string())),
    }
}

pub fn round_amount(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to `scale` and rejects values the storage column cannot hold.
pub fn fit_amount(amount: Decimal, scale: u32, integer_digits: u32) -> Result<Decimal, AmountError> {
    let rounded = round_amount(amount, scale);
    if rounded.abs() >= Decimal::from(10u64.pow(integer_digits)) {
        return Err(AmountError::OutOfRange {
            value: rounded.to_string(),
            integer_digits,
        });
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn locale_formats_normalize_to_same_value() {
        assert_eq!(parse_amount_text("1 234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount_text("1234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount_text("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount_text("1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount_text("1.234.567,8").unwrap(), dec!(1234567.8));
        assert_eq!(parse_amount_text("12,5").unwrap(), dec!(12.5));
        assert_eq!(parse_amount_text("\u{a0}1\u{202f}234,56 ").unwrap(), dec!(1234.56));
    }

    #[test]
    fn ambiguous_separators_are_rejected() {
        for raw in ["1,234,56", "1.234,56.7", "1,23.4,5"] {
            assert_eq!(
                parse_amount_text(raw),
                Err(AmountError::Unparsable(raw.to_string()))
            );
        }
    }

    #[test]
    fn numbers_keep_their_exact_value() {
        assert_eq!(parse_amount(&json!(0.1)).unwrap(), dec!(0.1));
        assert_eq!(parse_amount(&json!(100)).unwrap(), dec!(100));
        assert_eq!(parse_amount(&json!("1e3")).unwrap(), dec!(1000));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_amount(&json!("twelve")),
            Err(AmountError::Unparsable(_))
        ));
        assert!(parse_amount(&json!("  ")).is_err());
        assert!(matches!(
            parse_amount(&json!({"a": 1})),
            Err(AmountError::NotScalar(_))
        ));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_amount(dec!(1.005), 2), dec!(1.01));
        assert_eq!(round_amount(dec!(-1.005), 2), dec!(-1.01));
        assert_eq!(round_amount(dec!(2.00004), 4), dec!(2.0000));
    }

    #[test]
    fn amounts_must_fit_their_column() {
        assert_eq!(fit_amount(dec!(9999999999999999.994), 2, 16).unwrap(), dec!(9999999999999999.99));
        assert!(matches!(
            fit_amount(dec!(9999999999999999.995), 2, 16),
            Err(AmountError::OutOfRange { integer_digits: 16, .. })
        ));
        assert!(fit_amount(dec!(-1000000000000000), 4, 15).is_err());
    }
}
