//! Record store: the persisted table of period rows.
//!
//! Layout: one CSV file with a header row and one row per period:
//! `Year-Month, Notes, <sector 1>, ..., <sector N>, Top #1, Top #2, Average Return %`.
//! Sector and average cells hold percentages with 2 decimals; missing data is
//! an empty cell.
//!
//! Invariants:
//! - rows are sorted ascending by period with at most one row per period
//! - upsert overwrites returns, rankings and average in place and keeps the note
//! - saves are atomic: write `{file}.tmp`, flush, sync, rename into place

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sectorlab_core::PeriodKey;
use thiserror::Error;

use crate::record::{PeriodRecord, SectorCell};

pub const PERIOD_COLUMN: &str = "Year-Month";
pub const NOTES_COLUMN: &str = "Notes";
pub const TOP1_COLUMN: &str = "Top #1";
pub const TOP2_COLUMN: &str = "Top #2";
pub const AVERAGE_COLUMN: &str = "Average Return %";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store {path} is corrupt at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("failed to persist record store {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("failed to read record store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record for {period} does not match store columns: {reason}")]
    SchemaMismatch { period: PeriodKey, reason: String },
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row inserted at its sorted position.
    Inserted,
    /// Existing row for the period overwritten in place.
    Updated,
}

/// The in-memory store, bound to its file location.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    sectors: Vec<String>,
    records: Vec<PeriodRecord>,
    is_new: bool,
}

/// Expected header for a sector column list.
pub fn header_for(sectors: &[String]) -> Vec<String> {
    let mut header = Vec::with_capacity(sectors.len() + 5);
    header.push(PERIOD_COLUMN.to_string());
    header.push(NOTES_COLUMN.to_string());
    header.extend(sectors.iter().cloned());
    header.push(TOP1_COLUMN.to_string());
    header.push(TOP2_COLUMN.to_string());
    header.push(AVERAGE_COLUMN.to_string());
    header
}

/// Render a fraction as a 2-decimal percentage cell ("" when missing).
fn format_percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(v) => {
            let rendered = format!("{:.2}", v * 100.0);
            // -0.001% rounds to "-0.00"
            if rendered == "-0.00" {
                "0.00".to_string()
            } else {
                rendered
            }
        }
        None => String::new(),
    }
}

impl RecordStore {
    /// Empty store for `path` with the given sector columns. Nothing is read.
    pub fn new(path: impl Into<PathBuf>, sectors: Vec<String>) -> Self {
        Self {
            path: path.into(),
            sectors,
            records: Vec::new(),
            is_new: true,
        }
    }

    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store flagged as new; its header is
    /// written on the first save. A file whose header or rows do not match the
    /// sector columns is `StoreError::Corrupt`; no partial load is attempted.
    pub fn load(path: impl Into<PathBuf>, sectors: Vec<String>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            log::info!("record store {} does not exist; a new one will be created", path.display());
            return Ok(Self::new(path, sectors));
        }

        let file = File::open(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let records = parse_records(file, &path, &sectors)?;
        log::info!("loaded {} records from {}", records.len(), path.display());

        Ok(Self {
            path,
            sectors,
            records,
            is_new: false,
        })
    }

    /// File the store loads from and saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sector columns, in order.
    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }

    /// Records sorted ascending by period.
    pub fn records(&self) -> &[PeriodRecord] {
        &self.records
    }

    /// Row for `period`, if present.
    pub fn get(&self, period: PeriodKey) -> Option<&PeriodRecord> {
        self.records
            .binary_search_by_key(&period, |r| r.period)
            .ok()
            .map(|i| &self.records[i])
    }

    /// True until the store has been written to disk once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Set the free-text note of an existing row. Returns false when no row exists.
    pub fn set_note(&mut self, period: PeriodKey, note: &str) -> bool {
        match self.records.binary_search_by_key(&period, |r| r.period) {
            Ok(i) => {
                self.records[i].note = note.to_string();
                true
            }
            Err(_) => false,
        }
    }

    /// Insert or update the row for `record.period`.
    ///
    /// An existing row keeps its position and note; its returns, rankings and
    /// average are replaced. A new row goes to its sorted position.
    pub fn upsert(&mut self, record: PeriodRecord) -> Result<UpsertOutcome, StoreError> {
        self.check_columns(&record)?;

        match self
            .records
            .binary_search_by_key(&record.period, |r| r.period)
        {
            Ok(i) => {
                let existing = &mut self.records[i];
                existing.returns = record.returns;
                existing.top1 = record.top1;
                existing.top2 = record.top2;
                existing.average = record.average;
                Ok(UpsertOutcome::Updated)
            }
            Err(i) => {
                self.records.insert(i, record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn check_columns(&self, record: &PeriodRecord) -> Result<(), StoreError> {
        let names: Vec<&str> = record.sector_names().collect();
        if names.len() != self.sectors.len()
            || names.iter().zip(&self.sectors).any(|(a, b)| *a != b.as_str())
        {
            return Err(StoreError::SchemaMismatch {
                period: record.period,
                reason: format!("record sectors {names:?}, store sectors {:?}", self.sectors),
            });
        }
        for top in [&record.top1, &record.top2].into_iter().flatten() {
            if !self.sectors.contains(top) {
                return Err(StoreError::SchemaMismatch {
                    period: record.period,
                    reason: format!("ranked sector '{top}' is not a store column"),
                });
            }
        }
        Ok(())
    }

    /// Serialize the whole store (header included) to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<W, csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(header_for(&self.sectors))?;

        for r in &self.records {
            let mut row = Vec::with_capacity(self.sectors.len() + 5);
            row.push(r.period.to_string());
            row.push(r.note.clone());
            row.extend(r.returns.iter().map(|c| format_percent(c.value)));
            row.push(r.top1.clone().unwrap_or_default());
            row.push(r.top2.clone().unwrap_or_default());
            row.push(format_percent(r.average));
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
    }

    /// Serialize the store to a CSV string.
    pub fn to_csv_string(&self) -> Result<String, StoreError> {
        let bytes = self.write_to(Vec::new()).map_err(|e| self.persist_error(e))?;
        String::from_utf8(bytes).map_err(|e| self.persist_error(e))
    }

    /// Persist the store to its path atomically.
    ///
    /// Writes `{file}.tmp` next to the target, flushes and syncs it, then
    /// renames it over the target. On any failure the temp file is removed and
    /// the previous file is left untouched.
    pub fn save(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.persist_error(e))?;
        }

        let tmp_path = self.tmp_path();
        let result = self.write_tmp(&tmp_path).and_then(|()| {
            fs::rename(&tmp_path, &self.path)
                .map_err(|e| self.persist_error(format!("atomic rename failed: {e}")))
        });

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        log::info!("saved {} records to {}", self.records.len(), self.path.display());
        self.is_new = false;
        Ok(())
    }

    fn write_tmp(&self, tmp_path: &Path) -> Result<(), StoreError> {
        let file = File::create(tmp_path).map_err(|e| self.persist_error(e))?;
        let buffered = self
            .write_to(BufWriter::new(file))
            .map_err(|e| self.persist_error(e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| self.persist_error(e.into_error()))?;
        file.sync_all().map_err(|e| self.persist_error(e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist_error(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::Persist {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Parse a store body. Rows come back sorted by period.
pub fn parse_records<R: Read>(
    reader: R,
    path: &Path,
    sectors: &[String],
) -> Result<Vec<PeriodRecord>, StoreError> {
    let corrupt = |line: u64, reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let expected = header_for(sectors);
    let found: Vec<String> = rdr
        .headers()
        .map_err(|e| corrupt(1, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if found.iter().all(|h| h.is_empty()) {
        return Err(corrupt(1, "missing header row".into()));
    }
    if found != expected {
        return Err(corrupt(
            1,
            format!("expected columns {expected:?}, found {found:?}"),
        ));
    }

    let n = sectors.len();
    let mut records: Vec<PeriodRecord> = Vec::new();

    for row in rdr.records() {
        let row = row.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            corrupt(line, e.to_string())
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if row.len() != expected.len() {
            return Err(corrupt(
                line,
                format!("expected {} fields, found {}", expected.len(), row.len()),
            ));
        }

        let field = |i: usize| row.get(i).unwrap_or("").trim();

        let period: PeriodKey = field(0)
            .parse()
            .map_err(|e| corrupt(line, format!("{e}")))?;

        let parse_cell = |i: usize| -> Result<Option<f64>, StoreError> {
            let raw = field(i);
            if raw.is_empty() || raw.eq_ignore_ascii_case("n/a") || raw.eq_ignore_ascii_case("na")
            {
                return Ok(None);
            }
            let pct: f64 = raw
                .trim_end_matches('%')
                .parse()
                .map_err(|_| corrupt(line, format!("column '{}': not a number: '{raw}'", expected[i])))?;
            if !pct.is_finite() {
                return Err(corrupt(line, format!("column '{}': not finite", expected[i])));
            }
            Ok(Some(pct / 100.0))
        };

        let mut returns = Vec::with_capacity(n);
        for (i, sector) in sectors.iter().enumerate() {
            returns.push(SectorCell {
                sector: sector.clone(),
                value: parse_cell(2 + i)?,
            });
        }

        let parse_top = |i: usize| -> Result<Option<String>, StoreError> {
            let raw = field(i);
            if raw.is_empty() {
                return Ok(None);
            }
            if !sectors.iter().any(|s| s == raw) {
                return Err(corrupt(line, format!("unknown sector '{raw}' in '{}'", expected[i])));
            }
            Ok(Some(raw.to_string()))
        };

        records.push(PeriodRecord {
            period,
            note: row.get(1).unwrap_or("").to_string(),
            returns,
            top1: parse_top(2 + n)?,
            top2: parse_top(3 + n)?,
            average: parse_cell(4 + n)?,
        });
    }

    if records.windows(2).any(|w| w[0].period > w[1].period) {
        log::warn!("{}: rows out of period order; they will be rewritten sorted", path.display());
        records.sort_by_key(|r| r.period);
    }
    if let Some(pair) = records.windows(2).find(|w| w[0].period == w[1].period) {
        return Err(corrupt(0, format!("duplicate period {}", pair[0].period)));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sectors() -> Vec<String> {
        vec!["Tech".into(), "Energy".into(), "Cash".into()]
    }

    fn record(y: i32, m: u32, values: [Option<f64>; 3]) -> PeriodRecord {
        let cells: Vec<SectorCell> = sectors()
            .into_iter()
            .zip(values)
            .map(|(sector, value)| SectorCell { sector, value })
            .collect();
        let (top1, top2) = crate::ranking::top_two(&cells);
        let average = crate::ranking::average(&cells);
        PeriodRecord {
            period: PeriodKey::new(y, m).unwrap(),
            note: String::new(),
            returns: cells,
            top1,
            top2,
            average,
        }
    }

    #[test]
    fn header_layout() {
        assert_eq!(
            header_for(&sectors()),
            vec!["Year-Month", "Notes", "Tech", "Energy", "Cash", "Top #1", "Top #2", "Average Return %"]
        );
    }

    #[test]
    fn upsert_inserts_sorted() {
        let mut store = RecordStore::new("unused.csv", sectors());
        store.upsert(record(2023, 5, [Some(0.01), None, None])).unwrap();
        store.upsert(record(2023, 1, [Some(0.01), None, None])).unwrap();
        store.upsert(record(2023, 3, [Some(0.01), None, None])).unwrap();
        let periods: Vec<String> = store.records().iter().map(|r| r.period.to_string()).collect();
        assert_eq!(periods, vec!["2023-01", "2023-03", "2023-05"]);
    }

    #[test]
    fn update_keeps_note_and_position() {
        let mut store = RecordStore::new("unused.csv", sectors());
        store.upsert(record(2023, 1, [Some(0.01), None, None])).unwrap();
        store.upsert(record(2023, 2, [Some(0.02), None, None])).unwrap();
        assert!(store.set_note(PeriodKey::new(2023, 1).unwrap(), "Fed hike"));

        let mut updated = record(2023, 1, [Some(0.05), Some(0.03), Some(0.001)]);
        updated.note = "ignored".into();
        assert_eq!(store.upsert(updated).unwrap(), UpsertOutcome::Updated);

        let row = &store.records()[0];
        assert_eq!(row.note, "Fed hike");
        assert_eq!(row.top1.as_deref(), Some("Tech"));
        assert_eq!(row.top2.as_deref(), Some("Energy"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_foreign_columns() {
        let mut store = RecordStore::new("unused.csv", vec!["Other".into()]);
        let err = store.upsert(record(2023, 1, [None, None, None])).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn csv_rendering() {
        let mut store = RecordStore::new("unused.csv", sectors());
        let mut r = record(2023, 5, [Some(0.045), None, Some(-0.00001)]);
        r.average = Some(0.0225);
        store.upsert(r).unwrap();
        let csv = store.to_csv_string().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Year-Month,Notes,Tech,Energy,Cash,Top #1,Top #2,Average Return %");
        assert_eq!(lines[1], "2023-05,,4.50,,0.00,Tech,Cash,2.25");
    }

    #[test]
    fn parse_reads_blank_and_na_cells() {
        let body = "Year-Month,Notes,Tech,Energy,Cash,Top #1,Top #2,Average Return %\n\
                    2023-02,note,1.50,N/A,,Tech,,1.50\n\
                    2023-01,,2.00,-1.00,0.10,Tech,Cash,0.37\n";
        let records = parse_records(body.as_bytes(), Path::new("mem.csv"), &sectors()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].period.to_string(), "2023-01");
        assert_eq!(records[1].note, "note");
        assert_eq!(records[1].sector_value("Energy"), None);
        assert!((records[1].sector_percent("Tech").unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn parse_rejects_wrong_header() {
        let body = "Year-Month,Notes,Tech,Top #1,Top #2,Average Return %\n";
        let err = parse_records(body.as_bytes(), Path::new("mem.csv"), &sectors()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }));
    }

    #[test]
    fn parse_rejects_bad_rows() {
        let header = "Year-Month,Notes,Tech,Energy,Cash,Top #1,Top #2,Average Return %\n";
        for row in [
            "2023-13,,1,2,3,Tech,Energy,2\n",
            "2023-01,,abc,2,3,Tech,Energy,2\n",
            "2023-01,,1,2,3,Gold,Energy,2\n",
            "2023-01,,1,2\n",
        ] {
            let body = format!("{header}{row}");
            let err = parse_records(body.as_bytes(), Path::new("mem.csv"), &sectors()).unwrap_err();
            assert!(matches!(err, StoreError::Corrupt { .. }), "row {row:?} should be corrupt");
        }
    }

    #[test]
    fn parse_rejects_duplicate_periods() {
        let body = "Year-Month,Notes,Tech,Energy,Cash,Top #1,Top #2,Average Return %\n\
                    2023-01,,1,,,Tech,,1\n\
                    2023-01,,2,,,Tech,,2\n";
        let err = parse_records(body.as_bytes(), Path::new("mem.csv"), &sectors()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn empty_file_is_corrupt() {
        let err = parse_records("".as_bytes(), Path::new("mem.csv"), &sectors()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }));
    }
}
