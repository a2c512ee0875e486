//! Yahoo Finance price source.
//!
//! Fetches daily closes from Yahoo's v8 chart API. Prefers the adjusted close
//! and falls back to the raw close bar by bar. Retries transient failures with
//! exponential backoff behind a shared circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{FetchError, PriceSource};
use super::retry::{with_retry, Attempt, RetryPolicy};
use crate::domain::{PriceSeries, Ticker};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl YahooProvider {
    /// Build a client with the policy timeout, sharing `circuit_breaker` across threads.
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            policy,
        })
    }

    /// Chart API URL covering `start 00:00:00` through `end 23:59:59` UTC.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::default()).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::default()).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Parse a chart API body into a price series.
    ///
    /// A result without timestamps is a window with no trading days and
    /// yields an empty series.
    fn parse_body(ticker: &Ticker, body: &str) -> Result<PriceSeries, FetchError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => {
                FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => FetchError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

        let mut series = PriceSeries::new(ticker.clone());
        let Some(timestamps) = data.timestamp else {
            return Ok(series);
        };

        let closes = data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let adj = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .filter(|v| v.is_finite());
            let raw = closes.get(i).copied().flatten();

            // Holidays and halted sessions come back as all-null rows.
            if let Some(close) = adj.or(raw) {
                series.insert(date, close);
            }
        }

        Ok(series)
    }

    fn attempt(&self, ticker: &Ticker, url: &str) -> Attempt<PriceSeries> {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Attempt::Retry(FetchError::NetworkUnreachable(e.to_string()))
            }
            Err(e) => return Attempt::Fail(FetchError::NetworkUnreachable(e.to_string())),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Attempt::Fail(FetchError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Attempt::Retry(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Attempt::Fail(FetchError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Attempt::Fail(FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        if !status.is_success() {
            return Attempt::Retry(FetchError::Other(format!("HTTP {status} for {ticker}")));
        }

        let body = match resp.text() {
            Ok(body) => body,
            Err(e) => return Attempt::Retry(FetchError::NetworkUnreachable(e.to_string())),
        };
        match Self::parse_body(ticker, &body) {
            Ok(series) => Attempt::Done(series),
            Err(e) => Attempt::Fail(e),
        }
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily_closes(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        let url = Self::chart_url(ticker.as_str(), start, end);
        let series = with_retry(&self.policy, &self.circuit_breaker, ticker.as_str(), || {
            self.attempt(ticker, &url)
        })?;
        Ok(series.window(start, end))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
