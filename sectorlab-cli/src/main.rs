//! SectorLab CLI: monthly sector returns into a dated record store.
//!
//! Commands:
//! - `update`: compute the previous calendar month and upsert it into the store
//! - `backfill`: process every month in a range, oldest first
//! - `check-availability`: report how far back each configured ticker has prices
//! - `show`: print the store as a table

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use sectorlab_core::data::PriceSource;
use sectorlab_core::{PeriodKey, SectorTable};
use sectorlab_runner::availability::{LATE_START_YEAR, HISTORY_START};
use sectorlab_runner::progress::sector_lines;
use sectorlab_runner::{
    check_availability, resolve_range, run_backfill, run_monthly_update, AppConfig,
    BackfillSummary, FetchOptions, PeriodOutcome, ProviderKind, RecordStore, StdoutProgress,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_CONFIG_FILE: &str = "sectorlab.toml";

#[derive(Parser)]
#[command(
    name = "sectorlab",
    about = "SectorLab: monthly weighted sector returns",
    version
)]
struct Cli {
    /// Config file. Defaults to ./sectorlab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record store file (overrides store_path).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Price provider: yahoo, twelve_data or csv.
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Twelve Data API key (overrides config and TWELVEDATA_API_KEY).
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Directory of {TICKER}.csv price files for the csv provider.
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,

    /// Maximum concurrent ticker fetches (1 = sequential).
    #[arg(long, global = true)]
    max_parallel: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute last month's sector returns and upsert them into the store.
    Update,
    /// Process a range of months. Defaults to 2017-01 through last month.
    Backfill {
        /// First year (with START_MONTH).
        #[arg(requires = "start_month")]
        start_year: Option<i32>,
        /// First month, 1-12.
        start_month: Option<u32>,
        /// Last year (with END_MONTH). Defaults to last month.
        #[arg(requires = "end_month")]
        end_year: Option<i32>,
        /// Last month, 1-12.
        end_month: Option<u32>,
    },
    /// Report the first and last available price date for every ticker.
    CheckAvailability,
    /// Print the record store.
    Show,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n[ERROR] {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let today = utc_today(Utc::now());

    match cli.command {
        Commands::Update => run_update(&config, today),
        Commands::Backfill {
            start_year,
            start_month,
            end_year,
            end_month,
        } => {
            let start = start_year.zip(start_month);
            let end = end_year.zip(end_month);
            run_backfill_cmd(&config, start, end, today)
        }
        Commands::CheckAvailability => run_check_availability(&config, today),
        Commands::Show => run_show(&config),
    }
}

/// Calendar date in UTC, which picks the target month regardless of the host zone.
fn utc_today<Tz: TimeZone>(now: DateTime<Tz>) -> NaiveDate {
    now.with_timezone(&Utc).date_naive()
}

/// Config file (explicit, or ./sectorlab.toml when present, else defaults)
/// with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            AppConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("loading config {DEFAULT_CONFIG_FILE}"))?
        }
        None => AppConfig::default(),
    };

    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    if let Some(provider) = &cli.provider {
        config.fetch.provider = provider.parse::<ProviderKind>()?;
    }
    if let Some(key) = &cli.api_key {
        config.fetch.api_key = Some(key.clone());
    }
    if let Some(dir) = &cli.csv_dir {
        config.fetch.csv_dir = Some(dir.clone());
    }
    if let Some(n) = cli.max_parallel {
        config.fetch.max_parallel = n;
    }
    log::debug!(
        "store {}, provider {}, max_parallel {}",
        config.store_path.display(),
        config.fetch.provider,
        config.fetch.max_parallel
    );
    Ok(config)
}

/// Everything a processing command needs, built from the config.
struct Pipeline {
    sectors: SectorTable,
    source: Box<dyn PriceSource>,
    opts: FetchOptions,
}

impl Pipeline {
    fn from_config(config: &AppConfig) -> Result<Self> {
        let sectors = config.sector_table().context("invalid sector table")?;
        let opts = config.fetch_options()?;
        let source = config
            .build_price_source()
            .with_context(|| format!("setting up {} price source", config.fetch.provider))?;
        Ok(Self {
            sectors,
            source,
            opts,
        })
    }

    fn open_store(&self, config: &AppConfig) -> Result<RecordStore> {
        let columns = self.sectors.names().into_iter().map(String::from).collect();
        RecordStore::load(&config.store_path, columns)
            .with_context(|| format!("opening record store {}", config.store_path.display()))
    }
}

fn run_update(config: &AppConfig, today: NaiveDate) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let mut store = pipeline.open_store(config)?;
    let target = PeriodKey::previous_to(today);
    println!("Updating sector returns for {target}...");

    let (outcome, _) = run_monthly_update(
        today,
        &pipeline.sectors,
        pipeline.source.as_ref(),
        &mut store,
        &pipeline.opts,
    )?;

    println!("[OK] Updated {} for {target}", store.path().display());
    for line in sector_lines(&outcome) {
        println!("{line}");
    }
    print_degradations(std::slice::from_ref(&outcome));
    Ok(())
}

fn run_backfill_cmd(
    config: &AppConfig,
    start: Option<(i32, u32)>,
    end: Option<(i32, u32)>,
    today: NaiveDate,
) -> Result<()> {
    let (start, end) = resolve_range(start, end, today)?;
    let pipeline = Pipeline::from_config(config)?;
    let mut store = pipeline.open_store(config)?;

    println!("Backfilling data from {start} to {end}");
    println!("{}", "=".repeat(80));

    let summary = run_backfill(
        start,
        end,
        &pipeline.sectors,
        pipeline.source.as_ref(),
        &mut store,
        &pipeline.opts,
        &StdoutProgress,
    )?;

    println!("{}", "=".repeat(80));
    print_backfill_summary(&summary, store.path());
    Ok(())
}

fn print_backfill_summary(summary: &BackfillSummary, path: &Path) {
    println!(
        "[OK] Backfilled {} months ({} new, {} updated)",
        summary.months_processed, summary.inserted, summary.updated
    );
    println!("[OK] Saved to {}", path.display());

    let incomplete = summary.incomplete_periods();
    if !incomplete.is_empty() {
        let list: Vec<String> = incomplete.iter().map(|p| p.to_string()).collect();
        println!("\n{} months have sectors without data: {}", list.len(), list.join(", "));
    }
    print_degradations(&summary.outcomes);
}

fn print_degradations(outcomes: &[PeriodOutcome]) {
    let total: usize = outcomes.iter().map(|o| o.degradations.len()).sum();
    if total == 0 {
        return;
    }
    println!("\nDegraded tickers ({total}):");
    for outcome in outcomes {
        for d in &outcome.degradations {
            let kind = if d.is_fetch_failure() { "FETCH" } else { "DATA" };
            println!(
                "  {} {:<8} [{kind}] {} (in {})",
                outcome.record.period,
                d.ticker.as_str(),
                d.reason,
                d.sectors.join(", ")
            );
        }
    }
}

fn run_check_availability(config: &AppConfig, today: NaiveDate) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let tickers = pipeline.sectors.all_tickers();
    let (y, m, d) = HISTORY_START;
    let history_start = NaiveDate::from_ymd_opt(y, m, d).context("invalid history start date")?;

    println!("Checking historical data availability for all tickers...");
    println!("{}", "=".repeat(80));

    let report = check_availability(
        &tickers,
        pipeline.source.as_ref(),
        history_start,
        today,
        pipeline.opts.max_parallel,
    )?;
    for line in report.render() {
        println!("{line}");
    }
    if report.late_starters(LATE_START_YEAR).is_empty() {
        println!("\nEvery ticker has history from {LATE_START_YEAR} or earlier.");
    }
    Ok(())
}

fn run_show(config: &AppConfig) -> Result<()> {
    let sectors = config.sector_table().context("invalid sector table")?;
    let columns: Vec<String> = sectors.names().into_iter().map(String::from).collect();
    let store = RecordStore::load(&config.store_path, columns.clone())
        .with_context(|| format!("opening record store {}", config.store_path.display()))?;

    if store.is_new() {
        println!("No record store at {}", config.store_path.display());
        return Ok(());
    }
    if store.is_empty() {
        println!("{} has no records", config.store_path.display());
        return Ok(());
    }

    let fmt_pct = |v: Option<f64>| match v {
        Some(v) => format!("{:.2}", v * 100.0),
        None => "N/A".to_string(),
    };

    let mut header = vec!["Year-Month".to_string()];
    header.extend(columns.iter().cloned());
    header.extend(["Top #1", "Top #2", "Avg %", "Notes"].map(String::from));

    let rows: Vec<Vec<String>> = store
        .records()
        .iter()
        .map(|r| {
            let mut row = vec![r.period.to_string()];
            row.extend(r.returns.iter().map(|c| fmt_pct(c.value)));
            row.push(r.top1.clone().unwrap_or_else(|| "N/A".into()));
            row.push(r.top2.clone().unwrap_or_else(|| "N/A".into()));
            row.push(fmt_pct(r.average));
            row.push(r.note.clone());
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(&header));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 3 * (widths.len() - 1)));
    for row in &rows {
        println!("{}", render(row));
    }
    println!("\n{} records in {}", store.len(), store.path().display());
    Ok(())
}
