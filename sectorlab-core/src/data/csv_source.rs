//! Offline price source backed by a directory of CSV files.
//!
//! Layout: `{dir}/{TICKER}.csv` with a header and columns `date,close` and an
//! optional `adj_close`. The adjusted close wins when present.

use super::provider::{FetchError, PriceSource};
use crate::domain::{PriceSeries, Ticker};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    close: Option<f64>,
    #[serde(default)]
    adj_close: Option<f64>,
}

pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    /// Read `{TICKER}.csv` files from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the per-ticker files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{TICKER}.csv`; `/` in pair symbols becomes `-`.
    fn ticker_path(&self, ticker: &Ticker) -> PathBuf {
        self.dir
            .join(format!("{}.csv", ticker.as_str().replace('/', "-")))
    }
}

impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily_closes(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        let path = self.ticker_path(ticker);
        if !path.exists() {
            return Err(FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| FetchError::Io(format!("{}: {e}", path.display())))?;

        let mut series = PriceSeries::new(ticker.clone());
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| {
                FetchError::ResponseFormatChanged(format!("{}: {e}", path.display()))
            })?;
            if row.date < start || row.date > end {
                continue;
            }
            if let Some(close) = row.adj_close.or(row.close) {
                series.insert(row.date, close);
            }
        }
        Ok(series)
    }
}
