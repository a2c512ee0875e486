//! Backfill over a month range against fixture prices.

use chrono::NaiveDate;
use sectorlab_core::data::{CsvPriceSource, FixturePriceSource};
use sectorlab_core::{PeriodKey, SectorDefinition, SectorTable};
use sectorlab_runner::{
    run_backfill, BackfillError, FetchOptions, NoProgress, RecordStore, StoreError,
};
use std::cell::RefCell;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn key(y: i32, m: u32) -> PeriodKey {
    PeriodKey::new(y, m).unwrap()
}

fn table() -> SectorTable {
    SectorTable::new(vec![
        SectorDefinition::new("Tech", &[("XLK", 1.0)]),
        SectorDefinition::new("Crypto", &[("BTC-USD", 0.5), ("ETH-USD", 0.5)]),
    ])
    .unwrap()
}

fn sector_names() -> Vec<String> {
    table().names().into_iter().map(String::from).collect()
}

/// Month-end closes: XLK rises 1% a month from 2022-12, crypto starts in 2023-02.
fn source() -> FixturePriceSource {
    let mut xlk = Vec::new();
    let mut price = 100.0;
    for period in PeriodKey::range_inclusive(key(2022, 12), key(2023, 6)) {
        xlk.push((period.last_day(), price));
        price *= 1.01;
    }
    FixturePriceSource::new()
        .with_closes("XLK", &xlk)
        .with_closes(
            "BTC-USD",
            &[(d(2023, 2, 28), 20_000.0), (d(2023, 3, 31), 22_000.0), (d(2023, 4, 30), 22_000.0)],
        )
        .with_closes("ETH-USD", &[(d(2023, 2, 28), 1_500.0), (d(2023, 3, 31), 1_800.0)])
}

#[test]
fn backfill_fills_range_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("returns.csv");
    let mut store = RecordStore::load(&path, sector_names()).unwrap();

    let summary = run_backfill(
        key(2023, 1),
        key(2023, 4),
        &table(),
        &source(),
        &mut store,
        &FetchOptions::default(),
        &NoProgress,
    )
    .unwrap();

    assert_eq!(summary.months_processed, 4);
    assert_eq!(summary.inserted, 4);
    assert_eq!(summary.updated, 0);
    // January and February have no crypto prior close; April misses ETH only.
    assert_eq!(summary.incomplete_periods(), vec![key(2023, 1), key(2023, 2)]);

    let reloaded = RecordStore::load(&path, sector_names()).unwrap();
    let periods: Vec<String> = reloaded.records().iter().map(|r| r.period.to_string()).collect();
    assert_eq!(periods, vec!["2023-01", "2023-02", "2023-03", "2023-04"]);

    let march = reloaded.get(key(2023, 3)).unwrap();
    // BTC +10%, ETH +20% -> 15%
    assert!((march.sector_percent("Crypto").unwrap() - 15.0).abs() < 1e-9);
    assert_eq!(march.top1.as_deref(), Some("Crypto"));

    let april = reloaded.get(key(2023, 4)).unwrap();
    assert_eq!(april.sector_percent("Crypto"), Some(0.0));
}

#[test]
fn overlapping_backfill_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("returns.csv");
    let mut store = RecordStore::load(&path, sector_names()).unwrap();
    let opts = FetchOptions { max_parallel: 1 };

    run_backfill(key(2023, 1), key(2023, 3), &table(), &source(), &mut store, &opts, &NoProgress)
        .unwrap();
    store.set_note(key(2023, 2), "kept");
    store.save().unwrap();

    let mut store = RecordStore::load(&path, sector_names()).unwrap();
    let summary =
        run_backfill(key(2023, 2), key(2023, 5), &table(), &source(), &mut store, &opts, &NoProgress)
            .unwrap();
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.inserted, 2);

    let reloaded = RecordStore::load(&path, sector_names()).unwrap();
    assert_eq!(reloaded.len(), 5);
    assert_eq!(reloaded.get(key(2023, 2)).unwrap().note, "kept");
}

#[test]
fn reversed_range_is_rejected() {
    let mut store = RecordStore::new("unused.csv", sector_names());
    let err = run_backfill(
        key(2023, 5),
        key(2023, 1),
        &table(),
        &source(),
        &mut store,
        &FetchOptions::default(),
        &NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, BackfillError::StartAfterEnd { .. }));
}

#[test]
fn store_from_other_table_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("returns.csv");
    let mut store = RecordStore::load(&path, vec!["Energy".to_string()]).unwrap();
    let err = run_backfill(
        key(2023, 1),
        key(2023, 2),
        &table(),
        &source(),
        &mut store,
        &FetchOptions::default(),
        &NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, BackfillError::Store(StoreError::SchemaMismatch { .. })));
    assert!(!path.exists());
}

#[test]
fn progress_sees_every_period() {
    struct Recorder(RefCell<Vec<String>>);
    impl sectorlab_runner::BackfillProgress for Recorder {
        fn on_period_start(&self, period: PeriodKey, index: usize, total: usize) {
            self.0.borrow_mut().push(format!("start {period} {index}/{total}"));
        }
        fn on_period_complete(&self, outcome: &sectorlab_runner::PeriodOutcome, _: usize, _: usize) {
            self.0.borrow_mut().push(format!("done {}", outcome.record.period));
        }
        fn on_batch_complete(&self, processed: usize, inserted: usize, updated: usize) {
            self.0.borrow_mut().push(format!("batch {processed} {inserted} {updated}"));
        }
    }

    let recorder = Recorder(RefCell::new(Vec::new()));
    let dir = tempfile::tempdir().unwrap();
    let mut store = RecordStore::new(dir.path().join("r.csv"), sector_names());
    run_backfill(
        key(2023, 3),
        key(2023, 4),
        &table(),
        &source(),
        &mut store,
        &FetchOptions::default(),
        &recorder,
    )
    .unwrap();

    assert_eq!(
        recorder.0.into_inner(),
        vec![
            "start 2023-03 0/2",
            "done 2023-03",
            "start 2023-04 1/2",
            "done 2023-04",
            "batch 2 2 0",
        ]
    );
}

#[test]
fn csv_directory_source_drives_backfill() {
    let prices = tempfile::tempdir().unwrap();
    std::fs::write(
        prices.path().join("XLK.csv"),
        "date,close,adj_close\n2023-01-31,100.0,99.0\n2023-02-28,101.0,108.9\n",
    )
    .unwrap();
    let table = SectorTable::new(vec![SectorDefinition::new("Tech", &[("XLK", 1.0)])]).unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut store = RecordStore::load(out.path().join("returns.csv"), vec!["Tech".to_string()]).unwrap();

    run_backfill(
        key(2023, 2),
        key(2023, 2),
        &table,
        &CsvPriceSource::new(prices.path()),
        &mut store,
        &FetchOptions::default(),
        &NoProgress,
    )
    .unwrap();

    // Adjusted closes win when present: 108.9 / 99.0 - 1 = 10%
    let feb = store.get(key(2023, 2)).unwrap();
    assert!((feb.sector_percent("Tech").unwrap() - 10.0).abs() < 1e-9);
}
