//! SectorLab Runner: period processing, record store, backfill orchestration.
//!
//! This crate builds on `sectorlab-core` to provide:
//! - The period processor (fetch fan-out, boundary closes, sector rows)
//! - Ranking of sectors and the cross-sector average
//! - The CSV record store with idempotent upsert and atomic save
//! - Monthly update and multi-month backfill with progress callbacks
//! - The history availability check
//! - Application configuration (`sectorlab.toml`)

pub mod availability;
pub mod backfill;
pub mod config;
mod fetch;
pub mod period;
pub mod progress;
pub mod ranking;
pub mod record;
pub mod store;

pub use availability::{check_availability, Availability, AvailabilityReport, TickerAvailability};
pub use backfill::{resolve_range, run_backfill, run_monthly_update, BackfillError, BackfillSummary};
pub use config::{AppConfig, ConfigError, FetchConfig, ProviderKind};
pub use period::{process_period, Degradation, FetchOptions, PeriodOutcome, RunError, TickerReport};
pub use progress::{BackfillProgress, NoProgress, StdoutProgress};
pub use record::{PeriodRecord, SectorCell};
pub use store::{RecordStore, StoreError, UpsertOutcome};
