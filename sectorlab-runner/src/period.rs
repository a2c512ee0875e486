//! Period processor for one target month across every sector.
//!
//! For a target month the processor:
//! 1. fetches every distinct ticker once over [first day of prior month, last day of target]
//! 2. takes the last close inside the prior month and inside the target month
//! 3. computes per-ticker returns, aggregates them per sector
//! 4. ranks sectors and averages the ones with data
//!
//! Fetch failures never abort the run: the ticker degrades to missing data and
//! is reported in the outcome's degradation list. The processor does not touch
//! the record store.

use chrono::NaiveDate;
use sectorlab_core::data::PriceSource;
use sectorlab_core::{
    aggregate, compute_return, coverage, MissingReason, PeriodKey, ReturnOutcome, SectorTable, Ticker,
};
use std::collections::HashMap;
use thiserror::Error;

use crate::fetch::fetch_all;
use crate::ranking;
use crate::record::{PeriodRecord, SectorCell};

/// Hard failures of a processing run (fetch failures are not among them).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start fetch pool: {0}")]
    ThreadPool(String),
}

/// Caller policy for the fetch phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on concurrent ticker fetches; 1 fetches sequentially.
    pub max_parallel: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

/// What happened to one ticker in one period.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerReport {
    pub ticker: Ticker,
    pub prior_close: Option<(NaiveDate, f64)>,
    pub current_close: Option<(NaiveDate, f64)>,
    pub outcome: ReturnOutcome,
}

/// A ticker that contributed nothing, with the sectors it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub ticker: Ticker,
    pub sectors: Vec<String>,
    pub reason: MissingReason,
}

impl Degradation {
    /// True when the ticker could not be fetched at all.
    pub fn is_fetch_failure(&self) -> bool {
        self.reason.is_fetch_failure()
    }
}

/// Result of processing one period: the record plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodOutcome {
    pub record: PeriodRecord,
    pub tickers: Vec<TickerReport>,
    pub degradations: Vec<Degradation>,
}

impl PeriodOutcome {
    /// Degradations caused by a failing price source.
    pub fn fetch_failures(&self) -> impl Iterator<Item = &Degradation> {
        self.degradations.iter().filter(|d| d.is_fetch_failure())
    }

    /// Degradations where the source answered but had no usable prices.
    pub fn data_gaps(&self) -> impl Iterator<Item = &Degradation> {
        self.degradations.iter().filter(|d| !d.is_fetch_failure())
    }

    /// Sectors that ended up with no value.
    pub fn missing_sectors(&self) -> Vec<&str> {
        self.record
            .returns
            .iter()
            .filter(|c| c.value.is_none())
            .map(|c| c.sector.as_str())
            .collect()
    }
}

/// Process one target month.
pub fn process_period(
    target: PeriodKey,
    sectors: &SectorTable,
    source: &dyn PriceSource,
    opts: &FetchOptions,
) -> Result<PeriodOutcome, RunError> {
    let prior = target.prev();
    let window_start = prior.first_day();
    let window_end = target.last_day();
    let tickers = sectors.all_tickers();

    log::info!(
        "{target}: fetching {} tickers from {} ({window_start} to {window_end})",
        tickers.len(),
        source.name()
    );

    let fetched = fetch_all(source, &tickers, window_start, window_end, opts.max_parallel)?;

    let mut per_ticker: HashMap<Ticker, ReturnOutcome> = HashMap::with_capacity(fetched.len());
    let mut reports = Vec::with_capacity(fetched.len());
    let mut degradations = Vec::new();

    for (ticker, result) in fetched {
        let report = match result {
            Ok(series) => {
                let prior_close = series.last_close_between(prior.first_day(), prior.last_day());
                let current_close =
                    series.last_close_between(target.first_day(), target.last_day());
                let outcome = compute_return(
                    prior_close.map(|(_, c)| c),
                    current_close.map(|(_, c)| c),
                );
                TickerReport {
                    ticker,
                    prior_close,
                    current_close,
                    outcome,
                }
            }
            Err(e) => {
                log::warn!("{target}: fetch failed for {ticker}: {e}");
                TickerReport {
                    ticker,
                    prior_close: None,
                    current_close: None,
                    outcome: ReturnOutcome::Missing(MissingReason::FetchFailed(e.to_string())),
                }
            }
        };

        if let Some(reason) = report.outcome.missing_reason() {
            if !reason.is_fetch_failure() {
                log::warn!("{target}: no return for {}: {reason}", report.ticker);
            }
            degradations.push(Degradation {
                ticker: report.ticker.clone(),
                sectors: sectors
                    .sectors_holding(&report.ticker)
                    .into_iter()
                    .map(String::from)
                    .collect(),
                reason: reason.clone(),
            });
        }

        per_ticker.insert(report.ticker.clone(), report.outcome.clone());
        reports.push(report);
    }

    let returns: Vec<SectorCell> = sectors
        .sectors
        .iter()
        .map(|sector| {
            let value = aggregate(sector, &per_ticker).value();
            let covered = coverage(sector, &per_ticker);
            if value.is_some() && covered < 1.0 {
                log::info!(
                    "{target}: {} renormalized over {:.0}% of its weight",
                    sector.name,
                    covered * 100.0
                );
            }
            SectorCell {
                sector: sector.name.clone(),
                value,
            }
        })
        .collect();

    let (top1, top2) = ranking::top_two(&returns);
    let average = ranking::average(&returns);

    let record = PeriodRecord {
        period: target,
        note: String::new(),
        returns,
        top1,
        top2,
        average,
    };

    Ok(PeriodOutcome {
        record,
        tickers: reports,
        degradations,
    })
}
