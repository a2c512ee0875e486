//! Price source trait and structured fetch errors.
//!
//! The `PriceSource` trait abstracts over market-data providers (Yahoo Finance,
//! Twelve Data, a CSV directory) so the period processor can be driven by a
//! fake source in tests.

use crate::domain::{PriceSeries, Ticker};
use chrono::NaiveDate;
use thiserror::Error;

/// Why a fetch for one ticker failed.
///
/// Every variant is recovered by the period processor as missing data for
/// that ticker; none of them aborts a run.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("read price file: {0}")]
    Io(String),

    #[error("fetch error: {0}")]
    Other(String),
}

/// Source of daily closing prices.
///
/// Implementations should prefer a dividend/split-adjusted close when the
/// provider distinguishes it from the raw close.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily closes for `ticker` with `start <= date <= end`.
    ///
    /// An empty series means the provider answered but had no trading days in
    /// the window; an error means the provider could not answer.
    fn fetch_daily_closes(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError>;

    /// Check if the source is currently usable (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
