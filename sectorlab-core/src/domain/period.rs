//! Calendar-month period key.
//!
//! A `PeriodKey` is the natural key of a record row. It orders by
//! (year, month) and renders as `YYYY-MM`.

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest and largest accepted years. Keeps the `YYYY-MM` rendering at four digits.
pub const MIN_YEAR: i32 = 1000;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("invalid month {0}: must be 1-12")]
    InvalidMonth(u32),

    #[error("invalid year {0}: must be 1000-9999")]
    InvalidYear(i32),

    #[error("invalid period '{0}': expected YYYY-MM")]
    Malformed(String),
}

/// One calendar month, identified by (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Validated key; month must be 1-12 and the year four digits.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(PeriodError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The calendar month before the one containing `today`.
    ///
    /// This is the target of the scheduled monthly update.
    pub fn previous_to(today: NaiveDate) -> Self {
        Self::containing(today).prev()
    }

    /// Calendar year.
    pub fn year(self) -> i32 {
        self.year
    }

    /// Calendar month, 1-12.
    pub fn month(self) -> u32 {
        self.month
    }

    /// The month before this one (December of the prior year for January).
    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month after this one.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First calendar day of the month.
    pub fn first_day(self) -> NaiveDate {
        // Any (year, month) reachable from a validated key is a valid chrono date.
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("period key holds a valid year and month")
    }

    /// Last calendar day of the month.
    pub fn last_day(self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    /// Every month from `start` through `end`, ascending. Empty when `start > end`.
    pub fn range_inclusive(start: Self, end: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| PeriodError::Malformed(s.to_string()))?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(PeriodError::Malformed(s.to_string()));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        Self::new(year, month)
    }
}
