//! SectorLab Core: domain types, return calculator, sector aggregator, price sources.
//!
//! This crate contains the arithmetic of sector tracking:
//! - Domain types (tickers, period keys, price series, return outcomes)
//! - Sector configuration with load-time weight validation
//! - Simple period return between two closes
//! - Weighted sector aggregation with renormalization over available tickers
//! - The `PriceSource` trait and its Yahoo / Twelve Data / CSV / fixture providers

pub mod aggregate;
pub mod data;
pub mod domain;
pub mod returns;
pub mod sectors;

pub use aggregate::{aggregate, coverage};
pub use domain::{MissingReason, PeriodError, PeriodKey, PriceSeries, ReturnOutcome, Ticker};
pub use returns::compute_return;
pub use sectors::{SectorConfigError, SectorDefinition, SectorTable, WeightedTicker};
