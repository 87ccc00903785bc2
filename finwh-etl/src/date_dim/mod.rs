mod entity;
pub mod error;

use chrono::{Datelike, NaiveDate};
use tracing::instrument;

use crate::{primitives::DateId, store::WarehouseTx};

pub use entity::*;
use error::*;

const SEED_CHUNK_SIZE: usize = 1000;

/// Get-or-create access to the `dim_date` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateDimensions {}

impl DateDimensions {
    pub fn new() -> Self {
        Self {}
    }

    /// Idempotent. Safe against a concurrent batch inserting the same day:
    /// the insert ignores conflicts and the row is re-read.
    #[instrument(name = "finwh.date_dim.get_or_create", skip(self, tx), err)]
    pub async fn get_or_create(
        &self,
        tx: &mut dyn WarehouseTx,
        date: NaiveDate,
    ) -> Result<DateDimension, DateDimensionError> {
        let date_id = DateId::from_date(date);
        if let Some(row) = tx.find_date(date_id).await? {
            return Ok(row);
        }
        let row = DateDimension::for_date(date);
        let inserted = tx.insert_dates_if_absent(std::slice::from_ref(&row)).await?;
        if inserted == 1 {
            tracing::info!(%date_id, "date dimension row created");
            return Ok(row);
        }
        tx.find_date(date_id)
            .await?
            .ok_or(DateDimensionError::NotResolved(date))
    }

    /// Inserts every missing day of `start..=end`. Returns the number of rows
    /// created.
    #[instrument(name = "finwh.date_dim.seed_range", skip(self, tx), err)]
    pub async fn seed_range(
        &self,
        tx: &mut dyn WarehouseTx,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, DateDimensionError> {
        if start > end {
            return Err(DateDimensionError::InvalidRange { start, end });
        }
        let mut created = 0;
        let mut chunk = Vec::with_capacity(SEED_CHUNK_SIZE);
        for date in start.iter_days().take_while(|d| *d <= end) {
            chunk.push(DateDimension::for_date(date));
            if chunk.len() == SEED_CHUNK_SIZE {
                created += tx.insert_dates_if_absent(&chunk).await?;
                chunk.clear();
            }
        }
        created += tx.insert_dates_if_absent(&chunk).await?;
        tracing::info!(%start, %end, created, "date dimension seeded");
        Ok(created)
    }
}

/// Jan 1 of `today`'s year through Dec 31 of the following year.
pub fn default_seed_range(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
    let end = NaiveDate::from_ymd_opt(today.year() + 1, 12, 31)?;
    Some((start, end))
}
