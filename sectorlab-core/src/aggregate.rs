//! Weighted sector return from per-ticker returns.
//!
//! Tickers with missing data are dropped and the remaining weights are
//! renormalized over the available tickers only. A sector whose every
//! constituent is missing is itself missing.

use crate::domain::{MissingReason, ReturnOutcome, Ticker};
use crate::sectors::SectorDefinition;
use std::collections::HashMap;

/// Aggregate per-ticker fraction returns into one sector return.
///
/// A ticker absent from `per_ticker` counts as missing.
pub fn aggregate(
    sector: &SectorDefinition,
    per_ticker: &HashMap<Ticker, ReturnOutcome>,
) -> ReturnOutcome {
    let mut weighted_sum = 0.0;
    let mut available_weight = 0.0;

    for member in &sector.tickers {
        if let Some(r) = per_ticker.get(&member.symbol).and_then(ReturnOutcome::value) {
            weighted_sum += member.weight * r;
            available_weight += member.weight;
        }
    }

    if available_weight <= 0.0 {
        return ReturnOutcome::Missing(MissingReason::NoConstituentData);
    }
    ReturnOutcome::Value(weighted_sum / available_weight)
}

/// Share of the sector's configured weight that had data (0.0 - 1.0).
pub fn coverage(sector: &SectorDefinition, per_ticker: &HashMap<Ticker, ReturnOutcome>) -> f64 {
    let total: f64 = sector.tickers.iter().map(|m| m.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let available: f64 = sector
        .tickers
        .iter()
        .filter(|m| {
            per_ticker
                .get(&m.symbol)
                .is_some_and(|outcome| !outcome.is_missing())
        })
        .map(|m| m.weight)
        .sum();
    available / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sectors::WeightedTicker;

    fn sector(members: &[(&str, f64)]) -> SectorDefinition {
        SectorDefinition {
            name: "Test".into(),
            tickers: members
                .iter()
                .map(|(s, w)| WeightedTicker {
                    symbol: Ticker::from(*s),
                    weight: *w,
                })
                .collect(),
        }
    }

    fn returns(entries: &[(&str, Option<f64>)]) -> HashMap<Ticker, ReturnOutcome> {
        entries
            .iter()
            .map(|(s, r)| {
                let outcome = match r {
                    Some(v) => ReturnOutcome::Value(*v),
                    None => ReturnOutcome::Missing(MissingReason::NoCurrentClose),
                };
                (Ticker::from(*s), outcome)
            })
            .collect()
    }

    #[test]
    fn full_weighted_mean() {
        let s = sector(&[("XLK", 0.5), ("SOXX", 0.5)]);
        let r = aggregate(&s, &returns(&[("XLK", Some(0.05)), ("SOXX", Some(0.04))]));
        assert!((r.value().unwrap() - 0.045).abs() < 1e-12);
    }

    #[test]
    fn missing_ticker_renormalizes_weight() {
        let s = sector(&[("A", 0.6), ("B", 0.4)]);
        let r = aggregate(&s, &returns(&[("A", Some(0.05)), ("B", None)]));
        assert!((r.value().unwrap() - 0.05).abs() < 1e-12);
        assert!((coverage(&s, &returns(&[("A", Some(0.05)), ("B", None)])) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn all_missing_is_missing() {
        let s = sector(&[("A", 0.6), ("B", 0.4)]);
        let r = aggregate(&s, &returns(&[("A", None), ("B", None)]));
        assert_eq!(r, ReturnOutcome::Missing(MissingReason::NoConstituentData));
    }

    #[test]
    fn single_ticker_missing_has_no_partial_credit() {
        let s = sector(&[("DBA", 1.0)]);
        assert!(aggregate(&s, &returns(&[("DBA", None)])).is_missing());
        assert!(aggregate(&s, &HashMap::new()).is_missing());
    }

    #[test]
    fn zero_weight_survivor_is_missing() {
        let s = sector(&[("A", 1.0), ("B", 0.0)]);
        let r = aggregate(&s, &returns(&[("A", None), ("B", Some(0.02))]));
        assert!(r.is_missing());
    }
}
