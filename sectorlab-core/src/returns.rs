//! Simple period return between two closes.

use crate::domain::{MissingReason, ReturnOutcome};

/// Compute `current / prior - 1` as a fraction.
///
/// Either close being absent yields `Missing`, never zero. A prior close that
/// is not strictly positive is classified as missing rather than dividing.
pub fn compute_return(prior_close: Option<f64>, current_close: Option<f64>) -> ReturnOutcome {
    let Some(prior) = prior_close else {
        return ReturnOutcome::Missing(MissingReason::NoPriorClose);
    };
    let Some(current) = current_close else {
        return ReturnOutcome::Missing(MissingReason::NoCurrentClose);
    };
    if !prior.is_finite() || prior <= 0.0 {
        return ReturnOutcome::Missing(MissingReason::InvalidPriorClose);
    }
    if !current.is_finite() || current < 0.0 {
        return ReturnOutcome::Missing(MissingReason::InvalidCurrentClose);
    }
    ReturnOutcome::Value(current / prior - 1.0)
}
