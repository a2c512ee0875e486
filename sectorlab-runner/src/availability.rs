//! History availability check for every configured ticker.
//!
//! Used to pick a backfill start: the recommended start is the latest
//! first-available date across tickers, so every ticker has data from there on.

use chrono::{Datelike, NaiveDate};
use sectorlab_core::data::PriceSource;
use sectorlab_core::Ticker;

use crate::fetch::fetch_all;
use crate::period::RunError;

/// Earliest date checked.
pub const HISTORY_START: (i32, u32, u32) = (1990, 1, 1);

/// Tickers whose history starts after this year are flagged as late starters.
pub const LATE_START_YEAR: i32 = 2010;

#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available {
        first: NaiveDate,
        last: NaiveDate,
        days: usize,
    },
    NoData,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerAvailability {
    pub ticker: Ticker,
    pub status: Availability,
}

impl TickerAvailability {
    /// First trading day, when the ticker has history.
    pub fn first_date(&self) -> Option<NaiveDate> {
        match self.status {
            Availability::Available { first, .. } => Some(first),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityReport {
    pub entries: Vec<TickerAvailability>,
}

impl AvailabilityReport {
    /// Latest first-available date across tickers with data.
    pub fn recommended_start(&self) -> Option<NaiveDate> {
        self.entries.iter().filter_map(|e| e.first_date()).max()
    }

    /// Tickers whose history begins after `year`, with their first date.
    pub fn late_starters(&self, year: i32) -> Vec<(&Ticker, NaiveDate)> {
        self.entries
            .iter()
            .filter_map(|e| e.first_date().map(|d| (&e.ticker, d)))
            .filter(|(_, d)| d.year() > year)
            .collect()
    }

    /// Printable report, one line per ticker followed by the summary.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.entries.len() + 8);
        for e in &self.entries {
            let ticker = e.ticker.as_str();
            lines.push(match &e.status {
                Availability::Available { first, last, days } => {
                    format!("{ticker:<10} | Start: {first} | End: {last} | Days: {days:>5}")
                }
                Availability::NoData => format!("{ticker:<10} | NO DATA AVAILABLE"),
                Availability::Error(msg) => format!("{ticker:<10} | ERROR: {msg}"),
            });
        }

        lines.push(String::new());
        match self.recommended_start() {
            Some(d) => lines.push(format!("Recommended safe start date (latest first date): {d}")),
            None => lines.push("Recommended safe start date (latest first date): N/A".into()),
        }

        let late = self.late_starters(LATE_START_YEAR);
        if !late.is_empty() {
            lines.push(String::new());
            lines.push(format!("Tickers with limited history (started after {LATE_START_YEAR}):"));
            for (ticker, first) in late {
                lines.push(format!("  {:<10} | Starts: {first}", ticker.as_str()));
            }
        }
        lines
    }
}

/// Fetch full history for every ticker between `start` and `end`.
pub fn check_availability(
    tickers: &[Ticker],
    source: &dyn PriceSource,
    start: NaiveDate,
    end: NaiveDate,
    max_parallel: usize,
) -> Result<AvailabilityReport, RunError> {
    log::info!("probing history for {} tickers from {}", tickers.len(), source.name());
    let entries = fetch_all(source, tickers, start, end, max_parallel)?
        .into_iter()
        .map(|(ticker, result)| {
            let status = match result {
                Ok(series) => match (series.first_date(), series.last_date()) {
                    (Some(first), Some(last)) => Availability::Available {
                        first,
                        last,
                        days: series.len(),
                    },
                    _ => Availability::NoData,
                },
                Err(e) => {
                    log::warn!("availability check failed for {ticker}: {e}");
                    Availability::Error(e.to_string())
                }
            };
            TickerAvailability { ticker, status }
        })
        .collect();
    Ok(AvailabilityReport { entries })
}
