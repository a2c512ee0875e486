//! Twelve Data price source.
//!
//! Uses the `time_series` endpoint with a 1-day interval. Twelve Data reports
//! raw closes only. Crypto tickers written Yahoo-style (`BTC-USD`) are mapped to
//! Twelve Data pairs (`BTC/USD`).
//!
//! A single response holds at most `outputsize` bars, so long ranges are fetched
//! in consecutive date windows and merged.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{FetchError, PriceSource};
use super::retry::{with_retry, Attempt, RetryPolicy};
use crate::domain::{PriceSeries, Ticker};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

const BASE_URL: &str = "https://api.twelvedata.com/time_series";

/// Upper bound on bars per response.
const OUTPUT_SIZE: &str = "5000";

/// Calendar days per request window. Crypto trades every day, so this stays
/// under `OUTPUT_SIZE` bars for any symbol.
const WINDOW_DAYS: i64 = 4000;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "TWELVEDATA_API_KEY";

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Option<Vec<TimeSeriesValue>>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    close: String,
}

pub struct TwelveDataProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    circuit_breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl TwelveDataProvider {
    /// Build a client for `api_key`. An empty key is rejected up front.
    pub fn new(
        api_key: String,
        circuit_breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::AuthenticationRequired(format!(
                "Twelve Data API key not set (use --api-key or {API_KEY_ENV})"
            )));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            circuit_breaker,
            policy,
        })
    }

    /// Map a configured ticker to the symbol Twelve Data expects.
    pub fn provider_symbol(ticker: &Ticker) -> String {
        match ticker.as_str().split_once('-') {
            Some((base, quote))
                if quote.len() == 3 && quote.chars().all(|c| c.is_ascii_uppercase()) =>
            {
                format!("{base}/{quote}")
            }
            _ => ticker.to_string(),
        }
    }

    fn parse_body(ticker: &Ticker, body: &str) -> Result<PriceSeries, FetchError> {
        let resp: TimeSeriesResponse = serde_json::from_str(body).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        if resp.status.as_deref() == Some("error") {
            let message = resp.message.unwrap_or_default();
            return match resp.code {
                // "No data is available on the specified dates": valid symbol, empty window.
                Some(400) if message.to_ascii_lowercase().contains("no data") => {
                    Ok(PriceSeries::new(ticker.clone()))
                }
                Some(401) | Some(403) => Err(FetchError::AuthenticationRequired(message)),
                Some(404) => Err(FetchError::SymbolNotFound {
                    symbol: ticker.to_string(),
                }),
                Some(429) => Err(FetchError::RateLimited {
                    retry_after_secs: 60,
                }),
                Some(code) => Err(FetchError::Other(format!("{code}: {message}"))),
                None => Err(FetchError::Other(message)),
            };
        }

        let values = resp
            .values
            .ok_or_else(|| FetchError::ResponseFormatChanged("no values array".into()))?;

        let mut series = PriceSeries::new(ticker.clone());
        for v in values {
            let date_part = v.datetime.get(..10).unwrap_or(&v.datetime);
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
                FetchError::ResponseFormatChanged(format!("invalid datetime '{}': {e}", v.datetime))
            })?;
            let close: f64 = v.close.parse().map_err(|e| {
                FetchError::ResponseFormatChanged(format!("invalid close '{}': {e}", v.close))
            })?;
            series.insert(date, close);
        }
        Ok(series)
    }

    fn attempt(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> Attempt<PriceSeries> {
        let symbol = Self::provider_symbol(ticker);
        let start_date = start.format("%Y-%m-%d").to_string();
        // end_date is exclusive on this endpoint
        let end_date = (end + Duration::days(1)).format("%Y-%m-%d").to_string();

        let request = self.client.get(BASE_URL).query(&[
            ("symbol", symbol.as_str()),
            ("interval", "1day"),
            ("start_date", start_date.as_str()),
            ("end_date", end_date.as_str()),
            ("outputsize", OUTPUT_SIZE),
            ("apikey", self.api_key.as_str()),
        ]);

        let resp = match request.send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Attempt::Retry(FetchError::NetworkUnreachable(e.to_string()))
            }
            Err(e) => return Attempt::Fail(FetchError::NetworkUnreachable(e.to_string())),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Retry(FetchError::Other(format!("HTTP {status} for {ticker}")));
        }
        if !status.is_success() {
            return Attempt::Fail(FetchError::Other(format!("HTTP {status} for {ticker}")));
        }

        let body = match resp.text() {
            Ok(body) => body,
            Err(e) => return Attempt::Retry(FetchError::NetworkUnreachable(e.to_string())),
        };
        match Self::parse_body(ticker, &body) {
            Ok(series) => Attempt::Done(series),
            Err(e @ FetchError::RateLimited { .. }) => Attempt::Retry(e),
            Err(e) => Attempt::Fail(e),
        }
    }
}

/// Split `start..=end` into consecutive inclusive windows of at most `days` days.
fn date_windows(start: NaiveDate, end: NaiveDate, days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from <= end {
        let to = (from + Duration::days(days - 1)).min(end);
        windows.push((from, to));
        from = to + Duration::days(1);
    }
    windows
}

impl PriceSource for TwelveDataProvider {
    fn name(&self) -> &str {
        "twelve_data"
    }

    fn fetch_daily_closes(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        let windows = date_windows(start, end, WINDOW_DAYS);
        if windows.len() > 1 {
            log::debug!("{ticker}: fetching {start}..{end} in {} windows", windows.len());
        }

        let mut series = PriceSeries::new(ticker.clone());
        for (from, to) in windows {
            let chunk = with_retry(&self.policy, &self.circuit_breaker, ticker.as_str(), || {
                self.attempt(ticker, from, to)
            })?;
            for (date, close) in chunk.iter() {
                series.insert(date, close);
            }
        }
        Ok(series.window(start, end))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_pairs_are_mapped() {
        assert_eq!(TwelveDataProvider::provider_symbol(&Ticker::from("BTC-USD")), "BTC/USD");
        assert_eq!(TwelveDataProvider::provider_symbol(&Ticker::from("ETH-USD")), "ETH/USD");
        assert_eq!(TwelveDataProvider::provider_symbol(&Ticker::from("XLK")), "XLK");
        assert_eq!(TwelveDataProvider::provider_symbol(&Ticker::from("BRK-B")), "BRK-B");
    }

    #[test]
    fn parses_values_newest_first() {
        let body = r#"{
            "meta": {"symbol": "XLK", "interval": "1day"},
            "values": [
                {"datetime": "2023-05-31", "open": "150", "high": "151", "low": "149", "close": "150.25", "volume": "1"},
                {"datetime": "2023-05-30", "open": "149", "high": "150", "low": "148", "close": "149.50", "volume": "1"}
            ],
            "status": "ok"
        }"#;
        let s = TwelveDataProvider::parse_body(&Ticker::from("XLK"), body).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(
            s.last_date(),
            Some(NaiveDate::from_ymd_opt(2023, 5, 31).unwrap())
        );
        assert_eq!(s.iter().last().unwrap().1, 150.25);
    }

    #[test]
    fn no_data_error_is_empty_window() {
        let body = r#"{"code":400,"message":"No data is available on the specified dates. Try setting different start/end dates.","status":"error"}"#;
        let s = TwelveDataProvider::parse_body(&Ticker::from("ETH-USD"), body).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn error_payloads_map_to_fetch_errors() {
        let t = Ticker::from("XLK");
        let auth = r#"{"code":401,"message":"**apikey** parameter is incorrect","status":"error"}"#;
        assert!(matches!(
            TwelveDataProvider::parse_body(&t, auth),
            Err(FetchError::AuthenticationRequired(_))
        ));
        let missing = r#"{"code":404,"message":"symbol not found","status":"error"}"#;
        assert!(matches!(
            TwelveDataProvider::parse_body(&t, missing),
            Err(FetchError::SymbolNotFound { .. })
        ));
        let limited = r#"{"code":429,"message":"run out of API credits","status":"error"}"#;
        assert!(matches!(
            TwelveDataProvider::parse_body(&t, limited),
            Err(FetchError::RateLimited { .. })
        ));
    }

    #[test]
    fn long_ranges_are_split_into_windows() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();

        let short = date_windows(d(2023, 1, 1), d(2023, 12, 31), WINDOW_DAYS);
        assert_eq!(short, vec![(d(2023, 1, 1), d(2023, 12, 31))]);

        let start = d(1990, 1, 1);
        let end = d(2026, 10, 16);
        let windows = date_windows(start, end, WINDOW_DAYS);
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].0, start);
        assert_eq!(windows.last().unwrap().1, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1 + Duration::days(1), pair[1].0);
        }
        for (from, to) in &windows {
            assert!((*to - *from).num_days() < WINDOW_DAYS);
        }

        assert!(date_windows(end, start, WINDOW_DAYS).is_empty());
        assert_eq!(date_windows(end, end, WINDOW_DAYS), vec![(end, end)]);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let result = TwelveDataProvider::new("  ".into(), breaker, RetryPolicy::default());
        assert!(matches!(result, Err(FetchError::AuthenticationRequired(_))));
    }
}
