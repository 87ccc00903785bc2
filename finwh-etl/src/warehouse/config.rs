use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    currency::{CurrencyConverter, ExchangeRates, DEFAULT_REPORTING_CURRENCY},
    field::{AliasRegistry, FieldAliasOverrides},
    sink::BatchSink,
    store::WarehouseStore,
};

pub const DEFAULT_FLUSH_STRIDE: usize = 50;

/// Engine settings, usually embedded in the server's YAML config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default = "default_reporting_currency")]
    pub reporting_currency: String,
    #[serde(default = "default_reporting_currency_aliases")]
    pub reporting_currency_aliases: Vec<String>,
    #[serde(default)]
    pub exchange_rates: ExchangeRates,
    #[serde(default = "default_flush_stride")]
    pub flush_stride: usize,
    #[serde(default)]
    pub field_aliases: FieldAliasOverrides,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            reporting_currency: default_reporting_currency(),
            reporting_currency_aliases: default_reporting_currency_aliases(),
            exchange_rates: ExchangeRates::default(),
            flush_stride: default_flush_stride(),
            field_aliases: FieldAliasOverrides::default(),
        }
    }
}

impl EtlConfig {
    /// Reads the `EXCHANGE_RATE_*` environment once.
    pub fn converter_from_env(&self) -> CurrencyConverter {
        let rates = ExchangeRates::from_env(&self.exchange_rates, &self.reporting_currency);
        self.converter_with_rates(rates)
    }

    pub fn converter_with_rates(&self, rates: ExchangeRates) -> CurrencyConverter {
        CurrencyConverter::new(
            self.reporting_currency.clone(),
            self.reporting_currency_aliases.clone(),
            rates,
        )
    }

    pub fn alias_registry(&self) -> AliasRegistry {
        AliasRegistry::new(&self.field_aliases)
    }
}

fn default_reporting_currency() -> String {
    DEFAULT_REPORTING_CURRENCY.to_string()
}

fn default_reporting_currency_aliases() -> Vec<String> {
    vec!["BLR".to_string()]
}

fn default_flush_stride() -> usize {
    DEFAULT_FLUSH_STRIDE
}

#[derive(Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct FinWarehouseConfig {
    #[builder(setter(into, strip_option), default)]
    pub(super) pg_con: Option<String>,
    #[builder(setter(into, strip_option), default)]
    pub(super) max_connections: Option<u32>,
    #[builder(default)]
    pub(super) exec_migrations: bool,
    #[builder(setter(into, strip_option), default)]
    pub(super) pool: Option<sqlx::PgPool>,
    #[builder(setter(strip_option), default)]
    pub(super) store: Option<Arc<dyn WarehouseStore>>,
    #[builder(setter(strip_option), default)]
    pub(super) sink: Option<Arc<dyn BatchSink>>,
    #[builder(default)]
    pub(super) etl: EtlConfig,
    /// Rates to use instead of reading the environment.
    #[builder(setter(strip_option), default)]
    pub(super) exchange_rates: Option<ExchangeRates>,
}

impl FinWarehouseConfig {
    pub fn builder() -> FinWarehouseConfigBuilder {
        FinWarehouseConfigBuilder::default()
    }
}

impl FinWarehouseConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let is_set = |field: Option<bool>| field.unwrap_or(false);
        let sources = [
            is_set(self.pg_con.as_ref().map(|c| c.is_some())),
            is_set(self.pool.as_ref().map(|p| p.is_some())),
            is_set(self.store.as_ref().map(|s| s.is_some())),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        match sources {
            0 => Err("One of pg_con, pool or store must be set".to_string()),
            1 => Ok(()),
            _ => Err("Only one of pg_con, pool or store must be set".to_string()),
        }?;
        if let Some(etl) = self.etl.as_ref() {
            if etl.flush_stride == 0 {
                return Err("etl.flush_stride must be positive".to_string());
            }
        }
        Ok(())
    }
}
