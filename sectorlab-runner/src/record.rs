//! One row of the record store: a period's sector returns and rankings.

use sectorlab_core::PeriodKey;

/// Return of one sector in one period, as a fraction (0.05 = +5%).
/// `None` is missing data and renders as a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorCell {
    pub sector: String,
    pub value: Option<f64>,
}

impl SectorCell {
    /// The cell value as a percentage.
    pub fn percent(&self) -> Option<f64> {
        self.value.map(|v| v * 100.0)
    }
}

/// One period row.
///
/// `note` is free text owned by people; automation never overwrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    pub period: PeriodKey,
    pub note: String,
    /// One cell per configured sector, in column order.
    pub returns: Vec<SectorCell>,
    pub top1: Option<String>,
    pub top2: Option<String>,
    /// Mean of the non-missing sector returns, as a fraction.
    pub average: Option<f64>,
}

impl PeriodRecord {
    /// Return of `sector` as a fraction, `None` when blank or unknown.
    pub fn sector_value(&self, sector: &str) -> Option<f64> {
        self.returns
            .iter()
            .find(|c| c.sector == sector)
            .and_then(|c| c.value)
    }

    /// Return of `sector` as a percentage.
    pub fn sector_percent(&self, sector: &str) -> Option<f64> {
        self.sector_value(sector).map(|v| v * 100.0)
    }

    /// Cross-sector average as a percentage.
    pub fn average_percent(&self) -> Option<f64> {
        self.average.map(|v| v * 100.0)
    }

    /// Sector names in column order.
    pub fn sector_names(&self) -> impl Iterator<Item = &str> {
        self.returns.iter().map(|c| c.sector.as_str())
    }

    /// Number of sectors with data.
    pub fn available_count(&self) -> usize {
        self.returns.iter().filter(|c| c.value.is_some()).count()
    }
}
