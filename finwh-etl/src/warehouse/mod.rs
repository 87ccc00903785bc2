pub mod config;
pub mod error;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

pub use config::*;
use error::*;

use crate::{
    batch::{BatchProcessor, BatchReport},
    currency::CurrencyConverter,
    date_dim::{default_seed_range, DateDimensions},
    primitives::EntityKind,
    sink::{sink_filename, BatchSink, NoopSink, DEFAULT_FILE_PREFIX},
    store::{PgWarehouse, WarehouseStore},
};

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub description: Option<String>,
    /// Defaults to today's local date.
    pub processing_date: Option<NaiveDate>,
    /// Size of the request body as received. Defaults to the serialised payload size.
    pub data_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkStatus {
    Scheduled { filename: String },
    NotConfigured,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(flatten)]
    pub report: BatchReport,
    pub data_size: usize,
    pub description: Option<String>,
    pub sink: SinkStatus,
}

#[derive(Clone)]
pub struct FinWarehouse {
    pool: Option<PgPool>,
    store: Arc<dyn WarehouseStore>,
    processor: BatchProcessor,
    sink: Arc<dyn BatchSink>,
    dates: DateDimensions,
}

impl FinWarehouse {
    pub async fn init(config: FinWarehouseConfig) -> Result<Self, EtlError> {
        let (store, pool): (Arc<dyn WarehouseStore>, Option<PgPool>) =
            match (config.store, config.pool, config.pg_con) {
                (Some(store), None, None) => (store, None),
                (None, Some(pool), None) => (Arc::new(PgWarehouse::new(&pool)), Some(pool)),
                (None, None, Some(pg_con)) => {
                    let mut pool_opts = sqlx::postgres::PgPoolOptions::new();
                    if let Some(max_connections) = config.max_connections {
                        pool_opts = pool_opts.max_connections(max_connections);
                    }
                    let pool = pool_opts.connect(&pg_con).await?;
                    (Arc::new(PgWarehouse::new(&pool)), Some(pool))
                }
                _ => {
                    return Err(EtlError::ConfigError(
                        "One of pg_con, pool or store must be set".to_string(),
                    ))
                }
            };
        if config.exec_migrations {
            if let Some(pool) = pool.as_ref() {
                sqlx::migrate!().run(pool).await?;
            }
        }

        let converter = match config.exchange_rates {
            Some(rates) => config.etl.converter_with_rates(rates),
            None => config.etl.converter_from_env(),
        };
        tracing::info!(
            reporting_currency = converter.reporting_currency(),
            rates = ?converter.rates(),
            "currency converter ready"
        );
        let processor = BatchProcessor::new(
            store.clone(),
            Arc::new(converter),
            Arc::new(config.etl.alias_registry()),
            config.etl.flush_stride,
        );
        Ok(Self {
            pool,
            store,
            processor,
            sink: config.sink.unwrap_or_else(|| Arc::new(NoopSink)),
            dates: DateDimensions::new(),
        })
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn converter(&self) -> &CurrencyConverter {
        self.processor.converter()
    }

    pub fn supported_kinds(&self) -> Vec<EntityKind> {
        EntityKind::supported()
    }

    /// Processes one batch envelope. The raw payload is handed to the sink
    /// only once the batch committed.
    #[instrument(name = "finwh.ingest", skip(self, payload))]
    pub async fn ingest(&self, payload: Value, options: IngestOptions) -> IngestResponse {
        let processing_date = options
            .processing_date
            .unwrap_or_else(|| Local::now().date_naive());
        let data_size = options
            .data_size
            .unwrap_or_else(|| payload.to_string().len());
        let report = self.processor.process(&payload, processing_date).await;
        let sink = if report.is_committed() {
            self.schedule_sink(payload)
        } else {
            SinkStatus::Skipped
        };
        IngestResponse {
            report,
            data_size,
            description: options.description,
            sink,
        }
    }

    #[instrument(name = "finwh.seed_dates", skip(self), err)]
    pub async fn seed_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<u64, EtlError> {
        let mut tx = self.store.begin().await?;
        let created = self.dates.seed_range(tx.as_mut(), start, end).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Seeds Jan 1 of the current year through Dec 31 of the next one.
    pub async fn seed_default_dates(&self) -> Result<u64, EtlError> {
        let today = Local::now().date_naive();
        let (start, end) = default_seed_range(today).ok_or_else(|| {
            EtlError::ConfigError(format!("no default date range for {today}"))
        })?;
        self.seed_dates(start, end).await
    }

    fn schedule_sink(&self, payload: Value) -> SinkStatus {
        if !self.sink.is_configured() {
            return SinkStatus::NotConfigured;
        }
        let filename = sink_filename(DEFAULT_FILE_PREFIX, Utc::now());
        let sink = self.sink.clone();
        let target = filename.clone();
        tokio::spawn(async move {
            match sink.deliver(&payload, &target).await {
                Ok(receipt) => tracing::info!(?receipt, "raw payload archived"),
                Err(e) => tracing::error!(error = %e, filename = %target, "raw payload archive failed"),
            }
        });
        SinkStatus::Scheduled { filename }
    }
}
