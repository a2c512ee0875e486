//! Monthly update and multi-month backfill.
//!
//! Both drive the period processor and the record store the same way:
//! load once, upsert periods in ascending order, save once. A failed run
//! leaves the store file exactly as it was.

use chrono::{Datelike, NaiveDate};
use sectorlab_core::data::PriceSource;
use sectorlab_core::{PeriodKey, SectorTable};
use thiserror::Error;

use crate::period::{process_period, FetchOptions, PeriodOutcome, RunError};
use crate::progress::BackfillProgress;
use crate::store::{RecordStore, StoreError, UpsertOutcome};

/// Default first backfill month.
pub const DEFAULT_START: (i32, u32) = (2017, 1);

/// Earliest year accepted as a backfill bound.
pub const EARLIEST_YEAR: i32 = 1990;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("invalid month {0}: must be 1-12")]
    InvalidMonth(u32),

    #[error("invalid year {year}: must be between 1990 and {max}")]
    InvalidYear { year: i32, max: i32 },

    #[error("start {start} is after end {end}")]
    StartAfterEnd { start: PeriodKey, end: PeriodKey },

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve and validate a backfill range.
///
/// A missing start defaults to 2017-01, a missing end to the month before
/// `today`. Years must lie in 1990..=today's year.
pub fn resolve_range(
    start: Option<(i32, u32)>,
    end: Option<(i32, u32)>,
    today: NaiveDate,
) -> Result<(PeriodKey, PeriodKey), BackfillError> {
    let check = |(year, month): (i32, u32)| -> Result<PeriodKey, BackfillError> {
        if !(1..=12).contains(&month) {
            return Err(BackfillError::InvalidMonth(month));
        }
        if !(EARLIEST_YEAR..=today.year()).contains(&year) {
            return Err(BackfillError::InvalidYear {
                year,
                max: today.year(),
            });
        }
        PeriodKey::new(year, month).map_err(|_| BackfillError::InvalidMonth(month))
    };

    let start = check(start.unwrap_or(DEFAULT_START))?;
    let end = match end {
        Some(end) => check(end)?,
        None => PeriodKey::previous_to(today),
    };
    if start > end {
        return Err(BackfillError::StartAfterEnd { start, end });
    }
    Ok((start, end))
}

/// Counts and per-period results of a backfill.
#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub months_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub outcomes: Vec<PeriodOutcome>,
}

impl BackfillSummary {
    /// Periods where at least one sector ended up missing.
    pub fn incomplete_periods(&self) -> Vec<PeriodKey> {
        self.outcomes
            .iter()
            .filter(|o| !o.missing_sectors().is_empty())
            .map(|o| o.record.period)
            .collect()
    }
}

/// Process every month in `start..=end` and upsert it into `store`.
///
/// The store is saved once, after the last month. Any processing error
/// aborts before the save.
pub fn run_backfill(
    start: PeriodKey,
    end: PeriodKey,
    sectors: &SectorTable,
    source: &dyn PriceSource,
    store: &mut RecordStore,
    opts: &FetchOptions,
    progress: &dyn BackfillProgress,
) -> Result<BackfillSummary, BackfillError> {
    if start > end {
        return Err(BackfillError::StartAfterEnd { start, end });
    }
    let periods = PeriodKey::range_inclusive(start, end);
    let total = periods.len();
    log::info!("backfilling {total} months from {start} to {end}");

    let mut summary = BackfillSummary::default();
    for (index, period) in periods.into_iter().enumerate() {
        progress.on_period_start(period, index, total);
        let outcome = process_period(period, sectors, source, opts)?;
        match store.upsert(outcome.record.clone())? {
            UpsertOutcome::Inserted => summary.inserted += 1,
            UpsertOutcome::Updated => summary.updated += 1,
        }
        progress.on_period_complete(&outcome, index, total);
        summary.months_processed += 1;
        summary.outcomes.push(outcome);
    }

    progress.on_batch_complete(summary.months_processed, summary.inserted, summary.updated);
    store.save()?;
    Ok(summary)
}

/// Compute the month before `today` and upsert it into `store`, then save.
pub fn run_monthly_update(
    today: NaiveDate,
    sectors: &SectorTable,
    source: &dyn PriceSource,
    store: &mut RecordStore,
    opts: &FetchOptions,
) -> Result<(PeriodOutcome, UpsertOutcome), BackfillError> {
    let target = PeriodKey::previous_to(today);
    let outcome = process_period(target, sectors, source, opts)?;
    let upserted = store.upsert(outcome.record.clone())?;
    store.save()?;
    log::info!("{target}: {upserted:?} in {}", store.path().display());
    Ok((outcome, upserted))
}
