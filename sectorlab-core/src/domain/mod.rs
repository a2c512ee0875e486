//! Domain types for sector return tracking

pub mod outcome;
pub mod period;
pub mod series;
pub mod ticker;

pub use outcome::{MissingReason, ReturnOutcome};
pub use period::{PeriodError, PeriodKey};
pub use series::PriceSeries;
pub use ticker::Ticker;
