//! Daily closing-price series for one ticker.

use super::ticker::Ticker;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Ordered date → close mapping for one ticker over a query window.
///
/// Only finite closes are kept. Fetched fresh per run, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: Ticker,
    closes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    /// Empty series for `ticker`.
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            closes: BTreeMap::new(),
        }
    }

    /// Series built from `(date, close)` pairs via [`PriceSeries::insert`].
    pub fn from_points(ticker: Ticker, points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let mut series = Self::new(ticker);
        for (date, close) in points {
            series.insert(date, close);
        }
        series
    }

    /// Insert a close. Non-finite values are dropped; a later insert for the
    /// same date replaces the earlier one.
    pub fn insert(&mut self, date: NaiveDate, close: f64) {
        if close.is_finite() {
            self.closes.insert(date, close);
        }
    }

    /// Ticker these closes belong to.
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Number of trading days held.
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// True when no closes are held.
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Earliest trading day, if any.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next().copied()
    }

    /// Latest trading day, if any.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next_back().copied()
    }

    /// Closes in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.closes.iter().map(|(d, c)| (*d, *c))
    }

    /// Last available close with `start <= date <= end`, if any trading day
    /// falls inside that tail window.
    pub fn last_close_between(&self, start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, f64)> {
        if start > end {
            return None;
        }
        self.closes
            .range(start..=end)
            .next_back()
            .map(|(d, c)| (*d, *c))
    }

    /// Copy of the series restricted to `start..=end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            return Self::new(self.ticker.clone());
        }
        Self {
            ticker: self.ticker.clone(),
            closes: self
                .closes
                .range(start..=end)
                .map(|(d, c)| (*d, *c))
                .collect(),
        }
    }
}
