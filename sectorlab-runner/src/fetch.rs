//! Ticker fetch fan-out.
//!
//! Fetches are independent, so they run on a bounded rayon pool and join
//! before aggregation. Results keep the input ticker order.

use crate::period::RunError;
use chrono::NaiveDate;
use rayon::prelude::*;
use sectorlab_core::data::{FetchError, PriceSource};
use sectorlab_core::{PriceSeries, Ticker};

pub(crate) type FetchResult = (Ticker, Result<PriceSeries, FetchError>);

pub(crate) fn fetch_all(
    source: &dyn PriceSource,
    tickers: &[Ticker],
    start: NaiveDate,
    end: NaiveDate,
    max_parallel: usize,
) -> Result<Vec<FetchResult>, RunError> {
    let fetch_one = |ticker: &Ticker| -> FetchResult {
        if !source.is_available() {
            return (ticker.clone(), Err(FetchError::CircuitBreakerTripped));
        }
        (
            ticker.clone(),
            source.fetch_daily_closes(ticker, start, end),
        )
    };

    if max_parallel <= 1 || tickers.len() <= 1 {
        return Ok(tickers.iter().map(fetch_one).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_parallel.min(tickers.len()))
        .build()
        .map_err(|e| RunError::ThreadPool(e.to_string()))?;

    Ok(pool.install(|| tickers.par_iter().map(fetch_one).collect()))
}
