//! Price sources: the `PriceSource` trait and its providers.

pub mod circuit_breaker;
pub mod csv_source;
pub mod fixture;
pub mod provider;
pub mod retry;
pub mod twelve_data;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_source::CsvPriceSource;
pub use fixture::FixturePriceSource;
pub use provider::{FetchError, PriceSource};
pub use retry::RetryPolicy;
pub use twelve_data::TwelveDataProvider;
pub use yahoo::YahooProvider;
