//! Return outcomes: a computed value or explicit missing data.
//!
//! `Missing` is not an error. It is the valid "no return computable" outcome
//! for a ticker or a sector and surfaces as a blank cell in the record store.

use std::fmt;

/// Why no return could be computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// The price source failed for this ticker (network or provider fault).
    FetchFailed(String),
    /// No trading day inside the prior month.
    NoPriorClose,
    /// No trading day inside the target month.
    NoCurrentClose,
    /// The prior close was zero, negative, or not finite.
    InvalidPriorClose,
    /// The current close was negative or not finite.
    InvalidCurrentClose,
    /// Every constituent of a sector was missing.
    NoConstituentData,
}

impl MissingReason {
    /// True when the absence comes from a fetch fault rather than from the data itself.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, MissingReason::FetchFailed(_))
    }
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::FetchFailed(e) => write!(f, "fetch failed: {e}"),
            MissingReason::NoPriorClose => write!(f, "no close in prior month"),
            MissingReason::NoCurrentClose => write!(f, "no close in target month"),
            MissingReason::InvalidPriorClose => write!(f, "prior close is not positive"),
            MissingReason::InvalidCurrentClose => write!(f, "current close is invalid"),
            MissingReason::NoConstituentData => write!(f, "no constituent has data"),
        }
    }
}

/// A fraction-valued return (0.05 = +5%) or explicit missing data.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOutcome {
    Value(f64),
    Missing(MissingReason),
}

impl ReturnOutcome {
    /// The return as a fraction, or `None` when missing.
    pub fn value(&self) -> Option<f64> {
        match self {
            ReturnOutcome::Value(v) => Some(*v),
            ReturnOutcome::Missing(_) => None,
        }
    }

    /// The return as a percentage (5.0 = +5%). Only for display boundaries.
    pub fn percent(&self) -> Option<f64> {
        self.value().map(|v| v * 100.0)
    }

    /// True when no return could be computed.
    pub fn is_missing(&self) -> bool {
        matches!(self, ReturnOutcome::Missing(_))
    }

    /// Why the return is missing, if it is.
    pub fn missing_reason(&self) -> Option<&MissingReason> {
        match self {
            ReturnOutcome::Value(_) => None,
            ReturnOutcome::Missing(reason) => Some(reason),
        }
    }
}
