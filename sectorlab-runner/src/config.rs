//! Application configuration (`sectorlab.toml`).
//!
//! Every field has a default, so an absent file or an empty one yields a
//! working setup: Yahoo prices, the built-in sector table, and the store in
//! the current directory.

use serde::{Deserialize, Serialize};
use sectorlab_core::data::{
    twelve_data::API_KEY_ENV, CircuitBreaker, CsvPriceSource, FetchError, PriceSource,
    RetryPolicy, TwelveDataProvider, YahooProvider,
};
use sectorlab_core::{SectorConfigError, SectorDefinition, SectorTable};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::period::FetchOptions;

pub const DEFAULT_STORE_PATH: &str = "Field_Elevate_Sector_Monthly_Returns.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("unknown provider '{0}' (expected yahoo, twelve_data or csv)")]
    UnknownProvider(String),

    #[error("the csv provider needs a price directory (csv_dir / --csv-dir)")]
    MissingCsvDir,

    #[error("max_parallel must be at least 1")]
    InvalidParallelism,

    #[error(transparent)]
    Sectors(#[from] SectorConfigError),

    #[error("price source setup failed: {0}")]
    Provider(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    TwelveData,
    Csv,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "twelve_data" | "twelvedata" => Ok(Self::TwelveData),
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yahoo => "yahoo",
            Self::TwelveData => "twelve_data",
            Self::Csv => "csv",
        })
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub provider: ProviderKind,
    pub max_parallel: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub csv_dir: Option<PathBuf>,
    pub api_key: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Yahoo,
            max_parallel: 4,
            max_retries: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
            csv_dir: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub fetch: FetchConfig,
    /// Custom sector table; the built-in table when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Vec<SectorDefinition>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            fetch: FetchConfig::default(),
            sectors: None,
        }
    }
}

impl AppConfig {
    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config and validate its sector table, if any.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.sector_table()?;
        Ok(config)
    }

    /// The validated sector table.
    pub fn sector_table(&self) -> Result<SectorTable, ConfigError> {
        match &self.sectors {
            Some(sectors) => Ok(SectorTable::new(sectors.clone())?),
            None => Ok(SectorTable::default_table()),
        }
    }

    /// Retry policy for the HTTP providers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch.max_retries,
            base_delay: Duration::from_millis(self.fetch.base_delay_ms),
            timeout: Duration::from_secs(self.fetch.timeout_secs),
        }
    }

    /// Fetch fan-out options. Zero parallelism is rejected.
    pub fn fetch_options(&self) -> Result<FetchOptions, ConfigError> {
        if self.fetch.max_parallel == 0 {
            return Err(ConfigError::InvalidParallelism);
        }
        Ok(FetchOptions {
            max_parallel: self.fetch.max_parallel,
        })
    }

    /// Build the configured price source.
    ///
    /// The Twelve Data key comes from the config, then from
    /// `TWELVEDATA_API_KEY`.
    pub fn build_price_source(&self) -> Result<Box<dyn PriceSource>, ConfigError> {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let source: Box<dyn PriceSource> = match self.fetch.provider {
            ProviderKind::Yahoo => Box::new(YahooProvider::new(breaker, self.retry_policy())?),
            ProviderKind::TwelveData => {
                let key = self
                    .fetch
                    .api_key
                    .clone()
                    .or_else(|| std::env::var(API_KEY_ENV).ok())
                    .unwrap_or_default();
                Box::new(TwelveDataProvider::new(key, breaker, self.retry_policy())?)
            }
            ProviderKind::Csv => {
                let dir = self.fetch.csv_dir.clone().ok_or(ConfigError::MissingCsvDir)?;
                Box::new(CsvPriceSource::new(dir))
            }
        };
        log::debug!("price source: {}", source.name());
        Ok(source)
    }
}
