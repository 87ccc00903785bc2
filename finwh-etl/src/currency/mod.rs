mod amount;
mod config;
pub mod error;

use rust_decimal::Decimal;

pub use amount::*;
pub use config::*;
pub use error::*;

/// Normalises source currency amounts into the reporting currency using a
/// rate table fixed at construction.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    reporting: String,
    reporting_aliases: Vec<String>,
    rates: ExchangeRates,
}

impl CurrencyConverter {
    pub fn new(
        reporting: impl Into<String>,
        reporting_aliases: impl IntoIterator<Item = String>,
        rates: ExchangeRates,
    ) -> Self {
        Self {
            reporting: reporting.into().trim().to_uppercase(),
            reporting_aliases: reporting_aliases
                .into_iter()
                .map(|a| a.trim().to_uppercase())
                .collect(),
            rates,
        }
    }

    pub fn reporting_currency(&self) -> &str {
        &self.reporting
    }

    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    pub fn is_reporting(&self, code: &str) -> bool {
        let code = code.trim().to_uppercase();
        code == self.reporting || self.reporting_aliases.contains(&code)
    }

    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code)
    }

    /// `amount * rate(code)`. Unknown codes pass the amount through unchanged.
    pub fn convert(&self, code: &str, amount: Decimal) -> Result<Decimal, AmountError> {
        match self.rate(code) {
            Some(rate) => amount.checked_mul(rate).ok_or_else(|| AmountError::Overflow {
                amount: amount.to_string(),
                rate: rate.to_string(),
            }),
            None => {
                tracing::warn!(
                    currency = code,
                    %amount,
                    "no exchange rate for currency, amount left unconverted"
                );
                Ok(amount)
            }
        }
    }

    /// Reporting currency value of `amount`, honouring an amount the producer
    /// already converted. A supplied value equal to the source amount of a
    /// foreign currency is treated as "not converted".
    pub fn to_reporting(
        &self,
        code: &str,
        amount: Decimal,
        supplied: Option<Decimal>,
    ) -> Result<Decimal, AmountError> {
        if self.is_reporting(code) {
            return Ok(supplied.unwrap_or(amount));
        }
        match supplied {
            Some(supplied) if supplied != amount => Ok(supplied),
            _ => self.convert(code, amount),
        }
    }
}
