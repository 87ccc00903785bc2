use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::error::RateConfigError;

pub const DEFAULT_REPORTING_CURRENCY: &str = "BYN";
pub const ENV_RATE_CODES: [&str; 5] = ["USD", "EUR", "RUR", "KZT", "UZS"];

const FALLBACK_RATES: [(&str, Decimal); 5] = [
    ("USD", Decimal::from_parts(307, 0, 0, false, 2)),
    ("EUR", Decimal::from_parts(35, 0, 0, false, 1)),
    ("RUR", Decimal::from_parts(37, 0, 0, false, 3)),
    ("KZT", Decimal::from_parts(59, 0, 0, false, 4)),
    ("UZS", Decimal::from_parts(2, 0, 0, false, 4)),
];

/// Per-process table of `1 <code> = rate <reporting currency>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRates(BTreeMap<String, Decimal>);

impl ExchangeRates {
    pub fn new(rates: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        Self(
            rates
                .into_iter()
                .map(|(code, rate)| (code.trim().to_uppercase(), rate))
                .collect(),
        )
    }

    pub fn fallback() -> Self {
        Self::new(
            FALLBACK_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate)),
        )
    }

    pub fn env_var(code: &str, reporting: &str) -> String {
        format!("EXCHANGE_RATE_{}_TO_{}", code, reporting)
    }

    /// Fallback table, overlaid by configured rates, overlaid by the
    /// `EXCHANGE_RATE_<CODE>_TO_<REPORTING>` variables. A malformed variable
    /// discards everything in favour of the fallback table.
    pub fn load(
        configured: &ExchangeRates,
        reporting: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        match Self::overlay(configured, reporting, lookup) {
            Ok(rates) => rates,
            Err(e) => {
                tracing::error!(error = %e, "invalid exchange rate configuration, using fallback rates");
                Self::fallback()
            }
        }
    }

    pub fn from_env(configured: &ExchangeRates, reporting: &str) -> Self {
        Self::load(configured, reporting, |var| std::env::var(var).ok())
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.0.get(&code.trim().to_uppercase()).copied()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|c| c.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn overlay(
        configured: &ExchangeRates,
        reporting: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RateConfigError> {
        let mut rates = Self::fallback();
        for (code, rate) in configured.0.iter() {
            if *rate <= Decimal::ZERO {
                return Err(RateConfigError::NonPositive {
                    var: code.clone(),
                    value: rate.to_string(),
                });
            }
            rates.0.insert(code.clone(), *rate);
        }
        for code in ENV_RATE_CODES {
            let var = Self::env_var(code, reporting);
            let Some(raw) = lookup(&var) else {
                continue;
            };
            let rate = Decimal::from_str(raw.trim()).map_err(|_| RateConfigError::Malformed {
                var: var.clone(),
                value: raw.clone(),
            })?;
            if rate <= Decimal::ZERO {
                return Err(RateConfigError::NonPositive { var, value: raw });
            }
            rates.0.insert(code.to_string(), rate);
        }
        Ok(rates)
    }
}
