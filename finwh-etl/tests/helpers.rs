#![allow(dead_code)]
use chrono::NaiveDate;
use std::sync::Arc;

use finwh_etl::{currency::ExchangeRates, store::MemoryWarehouse, *};

pub fn processing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

pub fn date_id() -> DateId {
    DateId::from_date(processing_date())
}

pub fn options() -> IngestOptions {
    IngestOptions {
        processing_date: Some(processing_date()),
        ..Default::default()
    }
}

pub async fn init_warehouse() -> anyhow::Result<(FinWarehouse, MemoryWarehouse)> {
    init_warehouse_with(EtlConfig::default()).await
}

pub async fn init_warehouse_with(
    etl: EtlConfig,
) -> anyhow::Result<(FinWarehouse, MemoryWarehouse)> {
    let store = MemoryWarehouse::new();
    let config = FinWarehouseConfig::builder()
        .store(Arc::new(store.clone()))
        .etl(etl)
        .exchange_rates(ExchangeRates::fallback())
        .build()?;
    let warehouse = FinWarehouse::init(config).await?;
    Ok((warehouse, store))
}

pub fn bank_accounts(records: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "BankAccounts": records })
}

pub fn loans(records: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "Zaimy": records })
}
