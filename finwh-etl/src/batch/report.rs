use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{envelope::EXPECTED_FORMAT, error::RecordError, state::BatchState};
use crate::{
    primitives::{DateId, EntityKind},
    staging::Change,
    summary::SummaryResult,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub received: u64,
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub errored: u64,
    pub facts_created: u64,
    pub facts_updated: u64,
    pub facts_unchanged: u64,
}

impl BatchStats {
    pub fn count_entity(&mut self, change: Change) {
        match change {
            Change::Created => self.created += 1,
            Change::Updated => self.updated += 1,
            Change::Unchanged => self.unchanged += 1,
        }
    }

    pub fn count_fact(&mut self, change: Change) {
        match change {
            Change::Created => self.facts_created += 1,
            Change::Updated => self.facts_updated += 1,
            Change::Unchanged => self.facts_unchanged += 1,
        }
    }
}

/// A record that was skipped, by its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIssue {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_kinds: Vec<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_format: Option<String>,
}

/// Everything accumulated while a batch runs. Survives a rollback so the
/// caller still sees what had been transformed.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    pub stats: BatchStats,
    pub records: Vec<Value>,
    pub issues: Vec<RecordIssue>,
}

impl BatchProgress {
    pub fn new(received: usize) -> Self {
        Self {
            stats: BatchStats {
                received: received as u64,
                ..Default::default()
            },
            records: Vec::with_capacity(received),
            issues: Vec::new(),
        }
    }

    pub fn skip(&mut self, index: usize, error: RecordError) {
        tracing::warn!(index, error = %error, "skipping record");
        self.stats.skipped += 1;
        self.stats.errored += 1;
        self.issues.push(RecordIssue {
            index,
            error: error.to_string(),
        });
    }

    pub fn transformed(&mut self, record: Value) {
        self.stats.processed += 1;
        self.records.push(record);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub message: String,
    pub kind: Option<EntityKind>,
    pub state: BatchState,
    pub processing_date: NaiveDate,
    pub date_id: Option<DateId>,
    pub stats: BatchStats,
    pub summary: Option<SummaryResult>,
    pub records: Vec<Value>,
    pub issues: Vec<RecordIssue>,
    pub error: Option<ErrorDetail>,
    pub processing_time_ms: u64,
    pub processed_at: DateTime<Utc>,
}

impl BatchReport {
    pub(super) fn invalid(
        message: String,
        processing_date: NaiveDate,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            status: BatchStatus::Error,
            message: format!("Invalid batch envelope: {message}"),
            kind: None,
            state: BatchState::Invalid,
            processing_date,
            date_id: None,
            stats: BatchStats::default(),
            summary: None,
            records: Vec::new(),
            issues: Vec::new(),
            error: Some(ErrorDetail {
                kind: ErrorKind::Validation,
                message,
                supported_kinds: EntityKind::supported(),
                expected_format: Some(EXPECTED_FORMAT.to_string()),
            }),
            processing_time_ms,
            processed_at: Utc::now(),
        }
    }

    pub(super) fn committed(
        kind: EntityKind,
        processing_date: NaiveDate,
        date_id: DateId,
        summary: SummaryResult,
        progress: BatchProgress,
        processing_time_ms: u64,
    ) -> Self {
        let stats = progress.stats;
        let (status, message) = if stats.skipped == 0 {
            (
                BatchStatus::Success,
                format!("Processed {} {kind} records", stats.processed),
            )
        } else {
            (
                BatchStatus::PartialSuccess,
                format!(
                    "Processed {} of {} {kind} records, {} skipped",
                    stats.processed, stats.received, stats.skipped
                ),
            )
        };
        Self {
            status,
            message,
            kind: Some(kind),
            state: BatchState::Committed,
            processing_date,
            date_id: Some(date_id),
            stats,
            summary: Some(summary),
            records: progress.records,
            issues: progress.issues,
            error: None,
            processing_time_ms,
            processed_at: Utc::now(),
        }
    }

    pub(super) fn rolled_back(
        kind: EntityKind,
        state: BatchState,
        processing_date: NaiveDate,
        error: String,
        progress: BatchProgress,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            status: BatchStatus::Error,
            message: format!("Batch of {kind} rolled back: {error}"),
            kind: Some(kind),
            state,
            processing_date,
            date_id: None,
            stats: progress.stats,
            summary: None,
            records: progress.records,
            issues: progress.issues,
            error: Some(ErrorDetail {
                kind: ErrorKind::Storage,
                message: error,
                supported_kinds: Vec::new(),
                expected_format: None,
            }),
            processing_time_ms,
            processed_at: Utc::now(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == BatchState::Committed
    }
}
