//! Bounded retry with exponential backoff, shared by the HTTP providers.

use super::circuit_breaker::CircuitBreaker;
use super::provider::FetchError;
use std::time::Duration;

/// Per-ticker retry policy. Each ticker retries independently of the others.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Longest provider-hinted wait honored between attempts.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(120);

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay before retry `attempt` given the error that ended the previous one.
    ///
    /// A `RateLimited` hint wins over the backoff when it is longer, capped at
    /// [`MAX_RATE_LIMIT_WAIT`].
    pub fn delay_after(&self, attempt: u32, error: &FetchError) -> Duration {
        let backoff = self.delay_for(attempt);
        match error {
            FetchError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs).min(MAX_RATE_LIMIT_WAIT))
            }
            _ => backoff,
        }
    }
}

/// Outcome of one request attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Transient failure; try again if attempts remain.
    Retry(FetchError),
    /// Permanent failure; stop now.
    Fail(FetchError),
}

/// Run `op` until it succeeds, fails permanently, or the retry budget runs out.
///
/// The breaker sees one failure per ticker that exhausts its budget, not one per
/// attempt, so a single flaky ticker cannot open it for the others. An already
/// open breaker refuses the ticker up front; one that opens mid-retry ends the
/// loop with the last real error.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    ticker: &str,
    mut op: impl FnMut() -> Attempt<T>,
) -> Result<T, FetchError> {
    if !breaker.is_allowed() {
        return Err(FetchError::CircuitBreakerTripped);
    }

    let mut last_error: Option<FetchError> = None;

    for attempt in 0..=policy.max_retries {
        if let Some(prev) = &last_error {
            let delay = policy.delay_after(attempt, prev);
            log::debug!("{ticker}: retry {attempt}/{} after {delay:?} ({prev})", policy.max_retries);
            std::thread::sleep(delay);
            if !breaker.is_allowed() {
                break;
            }
        }

        match op() {
            Attempt::Done(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Attempt::Retry(e) => last_error = Some(e),
            Attempt::Fail(e) => return Err(e),
        }
    }

    breaker.record_failure();
    Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::ZERO);
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn retries_then_succeeds() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 10);
        let calls = Cell::new(0);
        let result = with_retry(&fast_policy(3), &breaker, "XLK", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Attempt::Retry(FetchError::NetworkUnreachable("timeout".into()))
            } else {
                Attempt::Done(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 10);
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(2), &breaker, "XLK", || {
            calls.set(calls.get() + 1);
            Attempt::Retry(FetchError::Other("HTTP 500".into()))
        });
        assert!(matches!(result, Err(FetchError::Other(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_failure_stops_immediately() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 10);
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), &breaker, "NOPE", || {
            calls.set(calls.get() + 1);
            Attempt::Fail(FetchError::SymbolNotFound {
                symbol: "NOPE".into(),
            })
        });
        assert!(matches!(result, Err(FetchError::SymbolNotFound { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn open_breaker_refuses() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 1);
        breaker.trip();
        let result: Result<(), _> =
            with_retry(&fast_policy(3), &breaker, "XLK", || Attempt::Done(()));
        assert!(matches!(result, Err(FetchError::CircuitBreakerTripped)));
    }

    #[test]
    fn rate_limit_hint_stretches_delay() {
        let p = RetryPolicy::default();
        let limited = FetchError::RateLimited { retry_after_secs: 7 };
        assert_eq!(p.delay_after(1, &limited), Duration::from_secs(7));
        let huge = FetchError::RateLimited { retry_after_secs: 3600 };
        assert_eq!(p.delay_after(1, &huge), MAX_RATE_LIMIT_WAIT);
        // A hint shorter than the backoff does not shorten it.
        let short = FetchError::RateLimited { retry_after_secs: 0 };
        assert_eq!(p.delay_after(3, &short), Duration::from_millis(2000));
        let other = FetchError::Other("HTTP 502".into());
        assert_eq!(p.delay_after(2, &other), Duration::from_millis(1000));
    }

    #[test]
    fn failing_ticker_does_not_shut_out_healthy_one() {
        let breaker = CircuitBreaker::default_provider();
        let policy = fast_policy(3);
        let calls = Cell::new(0);

        let failed: Result<(), _> = with_retry(&policy, &breaker, "XLK", || {
            calls.set(calls.get() + 1);
            Attempt::Retry(FetchError::Other("HTTP 502".into()))
        });
        match failed {
            Err(FetchError::Other(msg)) => assert_eq!(msg, "HTTP 502"),
            other => panic!("expected the last HTTP error, got {other:?}"),
        }
        assert_eq!(calls.get(), 4);
        assert!(breaker.is_allowed());

        let healthy = with_retry(&policy, &breaker, "SOXX", || Attempt::Done(1));
        assert_eq!(healthy.unwrap(), 1);
    }

    #[test]
    fn breaker_counts_exhausted_tickers() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 2);
        let policy = fast_policy(3);
        let flaky = || Attempt::<()>::Retry(FetchError::NetworkUnreachable("timeout".into()));

        assert!(with_retry(&policy, &breaker, "A", flaky).is_err());
        assert!(breaker.is_allowed());
        assert!(with_retry(&policy, &breaker, "B", flaky).is_err());
        assert!(!breaker.is_allowed());

        let refused: Result<(), _> = with_retry(&policy, &breaker, "C", || Attempt::Done(()));
        assert!(matches!(refused, Err(FetchError::CircuitBreakerTripped)));
    }

    #[test]
    fn breaker_opened_mid_retry_keeps_real_error() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 5);
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), &breaker, "XLK", || {
            calls.set(calls.get() + 1);
            // Another fetch thread hits a 403 while this ticker is retrying.
            breaker.trip();
            Attempt::Retry(FetchError::Other("HTTP 503".into()))
        });
        assert!(matches!(result, Err(FetchError::Other(_))));
        assert_eq!(calls.get(), 1);
    }
}
