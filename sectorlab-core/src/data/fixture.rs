//! In-memory price source for tests, benches, and dry runs.

use super::provider::{FetchError, PriceSource};
use crate::domain::{PriceSeries, Ticker};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves fixed series per ticker; tickers registered as failing return
/// `FetchError::NetworkUnreachable`, unknown tickers `SymbolNotFound`.
#[derive(Debug, Default)]
pub struct FixturePriceSource {
    series: HashMap<Ticker, PriceSeries>,
    failures: HashMap<Ticker, String>,
    fetch_count: AtomicUsize,
}

impl FixturePriceSource {
    /// An empty source; unknown tickers fetch as `SymbolNotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register closes for a ticker.
    pub fn with_closes(mut self, ticker: &str, closes: &[(NaiveDate, f64)]) -> Self {
        let ticker = Ticker::from(ticker);
        let series = PriceSeries::from_points(ticker.clone(), closes.iter().copied());
        self.series.insert(ticker, series);
        self
    }

    /// Make every fetch for `ticker` fail.
    pub fn with_failure(mut self, ticker: &str, message: &str) -> Self {
        self.failures.insert(Ticker::from(ticker), message.to_string());
        self
    }

    /// Number of `fetch_daily_closes` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl PriceSource for FixturePriceSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch_daily_closes(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.get(ticker) {
            return Err(FetchError::NetworkUnreachable(message.clone()));
        }
        self.series
            .get(ticker)
            .map(|s| s.window(start, end))
            .ok_or_else(|| FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
    }
}
