//! Sector configuration: named baskets of weighted tickers.
//!
//! The table is stored as TOML (`[[sectors]]` with `tickers = [{ symbol, weight }]`)
//! or taken from the built-in ten-sector default. Column order in the record
//! store follows the table order.

use crate::domain::Ticker;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Allowed drift of a sector's weight sum away from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum SectorConfigError {
    #[error("read sector file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse sector TOML: {0}")]
    Parse(String),

    #[error("sector table is empty")]
    Empty,

    #[error("duplicate sector name '{0}'")]
    DuplicateSector(String),

    #[error("sector '{0}' has no tickers")]
    EmptySector(String),

    #[error("sector '{sector}' lists ticker {ticker} more than once")]
    DuplicateTicker { sector: String, ticker: Ticker },

    #[error("sector '{sector}': weight {weight} for {ticker} must be finite and non-negative")]
    InvalidWeight {
        sector: String,
        ticker: Ticker,
        weight: f64,
    },

    #[error("sector '{sector}': weights sum to {sum}, expected 1.0")]
    WeightSum { sector: String, sum: f64 },
}

/// One constituent of a sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTicker {
    pub symbol: Ticker,
    pub weight: f64,
}

/// A named basket of tickers with fixed relative weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDefinition {
    pub name: String,
    pub tickers: Vec<WeightedTicker>,
}

impl SectorDefinition {
    /// Sector from `(ticker, weight)` pairs. Not validated until added to a table.
    pub fn new(name: &str, members: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            tickers: members
                .iter()
                .map(|(symbol, weight)| WeightedTicker {
                    symbol: Ticker::from(*symbol),
                    weight: *weight,
                })
                .collect(),
        }
    }

    /// Sum of the configured member weights.
    pub fn weight_sum(&self) -> f64 {
        self.tickers.iter().map(|t| t.weight).sum()
    }

    fn validate(&self) -> Result<(), SectorConfigError> {
        if self.tickers.is_empty() {
            return Err(SectorConfigError::EmptySector(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for member in &self.tickers {
            if !seen.insert(&member.symbol) {
                return Err(SectorConfigError::DuplicateTicker {
                    sector: self.name.clone(),
                    ticker: member.symbol.clone(),
                });
            }
            if !member.weight.is_finite() || member.weight < 0.0 {
                return Err(SectorConfigError::InvalidWeight {
                    sector: self.name.clone(),
                    ticker: member.symbol.clone(),
                    weight: member.weight,
                });
            }
        }
        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SectorConfigError::WeightSum {
                sector: self.name.clone(),
                sum,
            });
        }
        Ok(())
    }
}

/// The ordered, validated list of sectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorTable {
    pub sectors: Vec<SectorDefinition>,
}

impl SectorTable {
    /// Build and validate a table.
    pub fn new(sectors: Vec<SectorDefinition>) -> Result<Self, SectorConfigError> {
        let table = Self { sectors };
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SectorConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| SectorConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a table from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SectorConfigError> {
        let table: Self =
            toml::from_str(content).map_err(|e| SectorConfigError::Parse(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Check for at least one sector, unique names, and valid members in each.
    pub fn validate(&self) -> Result<(), SectorConfigError> {
        if self.sectors.is_empty() {
            return Err(SectorConfigError::Empty);
        }
        let mut names = HashSet::new();
        for sector in &self.sectors {
            if !names.insert(sector.name.as_str()) {
                return Err(SectorConfigError::DuplicateSector(sector.name.clone()));
            }
            sector.validate()?;
        }
        Ok(())
    }

    /// Every distinct ticker across all sectors, in first-appearance order.
    pub fn all_tickers(&self) -> Vec<Ticker> {
        let mut seen = HashSet::new();
        self.sectors
            .iter()
            .flat_map(|s| s.tickers.iter().map(|t| &t.symbol))
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect()
    }

    /// Sector names in column order.
    pub fn names(&self) -> Vec<&str> {
        self.sectors.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a sector by name.
    pub fn get(&self, name: &str) -> Option<&SectorDefinition> {
        self.sectors.iter().find(|s| s.name == name)
    }

    /// Names of the sectors that hold `ticker`.
    pub fn sectors_holding(&self, ticker: &Ticker) -> Vec<&str> {
        self.sectors
            .iter()
            .filter(|s| s.tickers.iter().any(|t| &t.symbol == ticker))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Number of sectors.
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// True when no sectors are configured.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// The built-in ten-sector table.
    pub fn default_table() -> Self {
        Self {
            sectors: vec![
                SectorDefinition::new("Tech & Innovation", &[("XLK", 0.5), ("SOXX", 0.5)]),
                SectorDefinition::new("Energy & Materials", &[("XLE", 0.5), ("XME", 0.5)]),
                SectorDefinition::new("Precious Metals", &[("GLD", 0.6), ("GDX", 0.4)]),
                SectorDefinition::new(
                    "Crypto & Digital Assets",
                    &[("BTC-USD", 0.6), ("ETH-USD", 0.4)],
                ),
                SectorDefinition::new("Fixed Income", &[("AGG", 0.7), ("IEF", 0.3)]),
                SectorDefinition::new("Consumer", &[("XLY", 0.6), ("XLP", 0.4)]),
                SectorDefinition::new("Health & Biotech", &[("XLV", 0.6), ("XBI", 0.4)]),
                SectorDefinition::new("Real Assets", &[("VNQ", 0.6), ("XLU", 0.4)]),
                SectorDefinition::new("Agriculture", &[("DBA", 1.0)]),
                SectorDefinition::new("Cash / Liquidity", &[("BIL", 1.0)]),
            ],
        }
    }

    /// Serialize the table to TOML.
    pub fn to_toml(&self) -> Result<String, SectorConfigError> {
        toml::to_string_pretty(self).map_err(|e| SectorConfigError::Parse(e.to_string()))
    }
}

impl Default for SectorTable {
    fn default() -> Self {
        Self::default_table()
    }
}
