//! One batch end to end: envelope validation, date resolution, per-kind
//! reconciliation, summary recomputation, commit or rollback.
mod accounts;
pub mod envelope;
pub mod error;
mod loans;
pub mod report;
pub mod state;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::{sync::Arc, time::Instant};
use tracing::instrument;

use crate::{
    currency::CurrencyConverter,
    date_dim::DateDimensions,
    field::{AliasRegistry, FieldAliases},
    primitives::{DateId, EntityKind},
    store::{WarehouseStore, WarehouseTx},
    summary::{Summaries, SummaryResult},
    warehouse::error::EtlError,
};

pub use envelope::*;
pub use error::*;
pub use report::*;
pub use state::*;

pub(crate) struct BatchContext<'a> {
    pub processing_date: NaiveDate,
    pub date_id: DateId,
    pub now: DateTime<Utc>,
    pub flush_stride: usize,
    pub converter: &'a CurrencyConverter,
    pub aliases: &'a FieldAliases,
}

#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<dyn WarehouseStore>,
    converter: Arc<CurrencyConverter>,
    aliases: Arc<AliasRegistry>,
    dates: DateDimensions,
    summaries: Summaries,
    flush_stride: usize,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        converter: Arc<CurrencyConverter>,
        aliases: Arc<AliasRegistry>,
        flush_stride: usize,
    ) -> Self {
        Self {
            store,
            converter,
            aliases,
            dates: DateDimensions::new(),
            summaries: Summaries::new(),
            flush_stride: flush_stride.max(1),
        }
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    /// Never fails: validation problems, skipped records and rolled back
    /// batches are all described by the returned report.
    #[instrument(
        name = "finwh.batch.process",
        skip(self, payload),
        fields(kind, n_records, status)
    )]
    pub async fn process(&self, payload: &Value, processing_date: NaiveDate) -> BatchReport {
        let started = Instant::now();
        let mut lifecycle = BatchLifecycle::validating();

        let envelope = match Envelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                lifecycle.reject();
                tracing::warn!(error = %e, "batch rejected");
                tracing::Span::current().record("status", BatchStatus::Error.as_ref());
                return BatchReport::invalid(e.to_string(), processing_date, elapsed_ms(started));
            }
        };
        let span = tracing::Span::current();
        span.record("kind", envelope.kind.as_ref());
        span.record("n_records", envelope.records.len());

        let mut progress = BatchProgress::new(envelope.records.len());
        let report = match self
            .run(&envelope, processing_date, &mut lifecycle, &mut progress)
            .await
        {
            Ok((date_id, summary)) => BatchReport::committed(
                envelope.kind,
                processing_date,
                date_id,
                summary,
                progress,
                elapsed_ms(started),
            ),
            Err(e) => {
                lifecycle.roll_back();
                tracing::error!(error = %e, kind = %envelope.kind, "batch rolled back");
                BatchReport::rolled_back(
                    envelope.kind,
                    lifecycle.state(),
                    processing_date,
                    e.to_string(),
                    progress,
                    elapsed_ms(started),
                )
            }
        };
        span.record("status", report.status.as_ref());
        report
    }

    async fn run(
        &self,
        envelope: &Envelope,
        processing_date: NaiveDate,
        lifecycle: &mut BatchLifecycle,
        progress: &mut BatchProgress,
    ) -> Result<(DateId, SummaryResult), EtlError> {
        let mut tx = self.store.begin().await?;
        match self
            .run_in_tx(tx.as_mut(), envelope, processing_date, lifecycle, progress)
            .await
        {
            Ok(outcome) => {
                tx.commit().await?;
                lifecycle.advance(BatchState::Committed)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(error = %rollback_error, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run_in_tx(
        &self,
        tx: &mut dyn WarehouseTx,
        envelope: &Envelope,
        processing_date: NaiveDate,
        lifecycle: &mut BatchLifecycle,
        progress: &mut BatchProgress,
    ) -> Result<(DateId, SummaryResult), EtlError> {
        let date = self.dates.get_or_create(tx, processing_date).await?;
        lifecycle.advance(BatchState::DateResolved)?;

        let ctx = BatchContext {
            processing_date,
            date_id: date.date_id,
            now: Utc::now(),
            flush_stride: self.flush_stride,
            converter: &self.converter,
            aliases: self.aliases.get(envelope.kind),
        };
        lifecycle.advance(BatchState::ReconcilingEntities)?;
        match envelope.kind {
            EntityKind::BankAccounts => {
                accounts::process_accounts(tx, &ctx, &envelope.records, progress).await?
            }
            EntityKind::Loans => loans::process_loans(tx, &ctx, &envelope.records, progress).await?,
        }
        lifecycle.advance(BatchState::FactsWritten)?;

        let summary = match envelope.kind {
            EntityKind::BankAccounts => {
                self.summaries
                    .recompute_account_summary(tx, date.date_id, processing_date)
                    .await?
            }
            EntityKind::Loans => {
                self.summaries
                    .recompute_loan_summary(tx, date.date_id, processing_date)
                    .await?
            }
        };
        lifecycle.advance(BatchState::SummaryRecomputed)?;
        Ok((date.date_id, summary))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
