//! Progress callbacks for multi-period runs.

use crate::period::PeriodOutcome;
use sectorlab_core::PeriodKey;

/// Progress callback for backfills.
pub trait BackfillProgress {
    /// Called before a period is fetched.
    fn on_period_start(&self, period: PeriodKey, index: usize, total: usize);

    /// Called after a period is processed and upserted.
    fn on_period_complete(&self, outcome: &PeriodOutcome, index: usize, total: usize);

    /// Called once every period is in the store, before it is saved.
    fn on_batch_complete(&self, processed: usize, inserted: usize, updated: usize);
}

/// Prints per-period sector returns to stdout.
pub struct StdoutProgress;

impl BackfillProgress for StdoutProgress {
    fn on_period_start(&self, period: PeriodKey, index: usize, total: usize) {
        println!("[{}/{}] Processing {period}...", index + 1, total);
    }

    fn on_period_complete(&self, outcome: &PeriodOutcome, _index: usize, _total: usize) {
        for line in sector_lines(outcome) {
            println!("{line}");
        }
    }

    fn on_batch_complete(&self, processed: usize, inserted: usize, updated: usize) {
        println!("\nBackfill complete: {processed} months ({inserted} new, {updated} updated)");
    }
}

/// Discards all progress events.
pub struct NoProgress;

impl BackfillProgress for NoProgress {
    fn on_period_start(&self, _period: PeriodKey, _index: usize, _total: usize) {}
    fn on_period_complete(&self, _outcome: &PeriodOutcome, _index: usize, _total: usize) {}
    fn on_batch_complete(&self, _processed: usize, _inserted: usize, _updated: usize) {}
}

/// `  <sector>: <pct>%` lines for a period, `N/A` where data is missing.
pub fn sector_lines(outcome: &PeriodOutcome) -> Vec<String> {
    outcome
        .record
        .returns
        .iter()
        .map(|cell| match cell.percent() {
            Some(pct) => format!("  {:<25}: {:>6.2}%", cell.sector, pct),
            None => format!("  {:<25}: {:>7}", cell.sector, "N/A"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PeriodRecord, SectorCell};

    #[test]
    fn lines_mark_missing_sectors() {
        let outcome = PeriodOutcome {
            record: PeriodRecord {
                period: PeriodKey::new(2023, 5).unwrap(),
                note: String::new(),
                returns: vec![
                    SectorCell {
                        sector: "Tech & Innovation".into(),
                        value: Some(0.045),
                    },
                    SectorCell {
                        sector: "Crypto".into(),
                        value: None,
                    },
                ],
                top1: Some("Tech & Innovation".into()),
                top2: None,
                average: Some(0.045),
            },
            tickers: Vec::new(),
            degradations: Vec::new(),
        };
        let lines = sector_lines(&outcome);
        assert_eq!(lines[0], "  Tech & Innovation        :   4.50%");
        assert!(lines[1].starts_with("  Crypto"));
        assert!(lines[1].ends_with("N/A"));
    }
}
