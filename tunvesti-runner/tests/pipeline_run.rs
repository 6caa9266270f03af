//! End-to-end runs of the pipeline against CSV fixtures in temp directories.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use tunvesti_runner::{
    check_inputs, run_correlation_stage, run_pipeline, InputRole, InputStatus, PipelineConfig,
    PipelineError,
};

// ── Fixtures ─────────────────────────────────────────────────────────

const DAYS: i64 = 35;

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + Duration::days(n)
}

fn close_at(seed: i64, n: i64) -> f64 {
    100.0 + seed as f64 * 5.0 + ((n * 7 + seed) % 9) as f64
}

fn bench_close(n: i64) -> f64 {
    8000.0 + (n * 37 % 23) as f64 * 3.5
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn historical_csv() -> String {
    let mut out = String::from("Ticker,Date,Open,High,Low,Close,Volume\n");
    for (ticker, seed) in [("biat", 1), ("SFBT", 2)] {
        for n in 0..DAYS {
            let c = close_at(seed, n);
            writeln!(
                out,
                "{ticker},{},{c},{},{},{c},{}",
                day(n),
                c + 1.0,
                c - 1.0,
                1000 + n
            )
            .unwrap();
        }
    }
    // One unusable row: no close.
    writeln!(out, "BIAT,{},1,1,1,,10", day(40)).unwrap();
    out
}

fn benchmark_csv(days: i64) -> String {
    let mut out = String::from("Date,Price,Open,High,Low,Vol.,Change %\n");
    for n in 0..days {
        let c = bench_close(n);
        writeln!(out, "{},\"{c}\",,,,1.2K,0.10%", day(n).format("%m/%d/%Y")).unwrap();
    }
    out
}

/// Lay out a complete set of inputs under `root` and return a config that
/// points at them.
fn full_fixture(root: &Path) -> PipelineConfig {
    let raw = root.join("raw");
    let daily = raw.join("daily_updates");

    write(&raw.join("historical.csv"), &historical_csv());
    write(&raw.join("tunindex.csv"), &benchmark_csv(DAYS));
    write(
        &raw.join("sectors.csv"),
        "ticker,sector,company_name\nBIAT,Banks,Banque Internationale Arabe de Tunisie\nSFBT,Consumer,SFBT\n",
    );
    write(
        &raw.join("dividends.csv"),
        "ticker,year,dividend_per_share\nBIAT,2023.0,\"5,2\"\n",
    );
    write(
        &daily.join(format!("updated_stocks_{}.csv", day(DAYS))),
        &format!(
            "ticker,date,close,volume,volatility,market_cap_m\nbiat,{},120.5,900,1.1,350\n",
            day(DAYS)
        ),
    );
    write(
        &daily.join(format!("updated_index_{}.csv", day(DAYS))),
        &format!("date,close\n{},{}\n", day(DAYS), bench_close(DAYS)),
    );

    let mut config = PipelineConfig::default();
    config.inputs.historical = raw.join("historical.csv");
    config.inputs.daily_updates_dir = daily;
    config.inputs.benchmark = raw.join("tunindex.csv");
    config.inputs.sectors = raw.join("sectors.csv");
    config.inputs.dividends = raw.join("dividends.csv");
    config.outputs.dir = root.join("processed");
    config
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                std::fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

// ── Full run ─────────────────────────────────────────────────────────

#[test]
fn full_run_writes_every_table() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());

    let outcome = run_pipeline(&config).unwrap();
    let out = &outcome.output_dir;
    let manifest = &outcome.manifest;

    assert_eq!(manifest.tables.len(), 9);
    for t in &manifest.tables {
        assert!(out.join(&t.file).is_file(), "{} missing", t.file);
    }
    assert!(out.join(&config.outputs.manifest).is_file());

    // 35 + 1 incremental rows for BIAT, 35 for SFBT.
    assert_eq!(manifest.table("enriched").unwrap().rows, 71);
    assert_eq!(manifest.table("fact").unwrap().rows, 71);
    assert_eq!(manifest.table("dim_stock").unwrap().rows, 2);
    assert_eq!(manifest.table("dim_date").unwrap().rows, 36);
    assert_eq!(manifest.table("correlation_pairs").unwrap().rows, 1);

    let historical = manifest.inputs.iter().find(|i| i.name == "historical").unwrap();
    assert_eq!(historical.role, InputRole::Required);
    assert_eq!(historical.dropped, 1);
    assert!(manifest.warnings.iter().any(|w| w.contains("1 rows dropped")));

    let enriched = read_lines(&out.join(&config.outputs.enriched));
    let last_biat = enriched
        .iter()
        .filter(|l| l.contains(",BIAT,"))
        .last()
        .unwrap();
    assert!(last_biat.starts_with(&format!("{},BIAT,,,,120.5,900,1.1,350,incremental", day(DAYS))));
    assert!(last_biat.contains(",Banks,Banque Internationale Arabe de Tunisie,2023,5.2,"));

    let dim_stock = read_lines(&out.join(&config.outputs.dim_stock));
    assert_eq!(
        dim_stock,
        vec![
            "ticker,sector,company",
            "BIAT,Banks,Banque Internationale Arabe de Tunisie",
            "SFBT,Consumer,SFBT",
        ]
    );

    let stock_bench = read_lines(&out.join(&config.outputs.stock_benchmark));
    assert_eq!(stock_bench[0], "ticker,correlation,correlation_volatility,data_points");
    assert_eq!(stock_bench.len(), 3);
    let biat = stock_bench.iter().find(|l| l.starts_with("BIAT,")).unwrap();
    let sfbt = stock_bench.iter().find(|l| l.starts_with("SFBT,")).unwrap();
    assert!(biat.ends_with(",35"));
    assert!(sfbt.ends_with(",34"));
}

#[test]
fn rerun_is_byte_identical() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());

    run_pipeline(&config).unwrap();
    let first = snapshot(&config.outputs.dir);
    run_pipeline(&config).unwrap();
    let second = snapshot(&config.outputs.dir);

    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
}

// ── Error policy ─────────────────────────────────────────────────────

#[test]
fn missing_historical_is_fatal_and_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let mut config = full_fixture(root.path());
    config.inputs.historical = root.path().join("raw/absent.csv");

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, PipelineError::HistoricalMissing(_)));
    assert!(!config.outputs.dir.exists());
}

#[test]
fn historical_without_required_columns_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());
    write(&config.inputs.historical, "ticker,date,close\nBIAT,2023-03-01,10\n");

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, PipelineError::HistoricalInvalid(_)));
    assert!(err.to_string().contains("open"));
}

#[test]
fn missing_optional_sources_degrade() {
    let root = tempfile::tempdir().unwrap();
    let mut config = full_fixture(root.path());
    config.inputs.sectors = root.path().join("raw/no_sectors.csv");
    config.inputs.dividends = root.path().join("raw/no_dividends.csv");
    config.inputs.benchmark = root.path().join("raw/no_index.csv");
    config.inputs.daily_updates_dir = root.path().join("raw/no_updates");

    let outcome = run_pipeline(&config).unwrap();
    let manifest = &outcome.manifest;

    for name in ["sectors", "dividends", "benchmark"] {
        let input = manifest.inputs.iter().find(|i| i.name == name).unwrap();
        assert_eq!(input.status, InputStatus::Missing, "{name}");
    }
    assert!(manifest.warnings.len() >= 4);

    let dim_stock = read_lines(&outcome.output_dir.join(&config.outputs.dim_stock));
    assert_eq!(dim_stock[1], "BIAT,Unclassified,");
    assert_eq!(dim_stock[2], "SFBT,Unclassified,");

    // No benchmark: benchmark tables carry headers only.
    assert_eq!(manifest.table("stock_benchmark").unwrap().rows, 0);
    assert_eq!(manifest.table("sector_benchmark").unwrap().rows, 0);
    assert_eq!(manifest.table("enriched").unwrap().rows, 70);
}

#[test]
fn unusable_optional_source_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());
    write(&config.inputs.sectors, "symbol,industry\nBIAT,Banks\n");

    let outcome = run_pipeline(&config).unwrap();
    let sectors = outcome
        .manifest
        .inputs
        .iter()
        .find(|i| i.name == "sectors")
        .unwrap();
    assert_eq!(sectors.status, InputStatus::Skipped);
    assert!(sectors.blake3.is_some());
    assert!(outcome
        .manifest
        .warnings
        .iter()
        .any(|w| w.contains("missing required column(s): sector")));
}

// ── Restart and check ────────────────────────────────────────────────

#[test]
fn correlate_restart_reproduces_tables() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());
    let outcome = run_pipeline(&config).unwrap();

    let names = [
        "correlation_matrix",
        "correlation_pairs",
        "stock_benchmark",
        "sector_benchmark",
    ];
    let before: Vec<String> = names
        .iter()
        .map(|n| outcome.manifest.table(n).unwrap().blake3.clone())
        .collect();
    for n in names {
        let file = &outcome.manifest.table(n).unwrap().file;
        std::fs::remove_file(outcome.output_dir.join(file)).unwrap();
    }

    let restarted = run_correlation_stage(&config).unwrap();
    let after: Vec<String> = restarted.tables.iter().map(|t| t.blake3.clone()).collect();
    assert_eq!(before, after);
    assert_eq!(restarted.report.matrix_tickers, 2);
}

#[test]
fn correlate_without_enriched_table_fails() {
    let root = tempfile::tempdir().unwrap();
    let config = full_fixture(root.path());
    let err = run_correlation_stage(&config).unwrap_err();
    assert!(matches!(err, PipelineError::EnrichedMissing(_)));
}

#[test]
fn check_reports_required_and_optional_inputs() {
    let root = tempfile::tempdir().unwrap();
    let mut config = full_fixture(root.path());

    let check = check_inputs(&config);
    assert!(check.is_ready());
    let daily = check.inputs.iter().find(|c| c.name == "daily_updates").unwrap();
    assert_eq!(
        daily.detail.as_deref(),
        Some("1 stock batches, 1 index snapshots")
    );

    config.inputs.historical = root.path().join("gone.csv");
    config.inputs.sectors = root.path().join("gone_too.csv");
    let check = check_inputs(&config);
    assert!(!check.is_ready());
    let sectors = check.inputs.iter().find(|c| c.name == "sectors").unwrap();
    assert!(!sectors.exists);
    assert_eq!(sectors.role, InputRole::Optional);
}
