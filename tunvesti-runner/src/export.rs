//! CSV export for every output table.
//!
//! Each table has a builder returning the CSV text, so the full set can be
//! produced in memory before anything touches disk. `write_table` then writes
//! one table atomically (temp file + rename) and records its hash.
//!
//! Floats are written with Rust's shortest round-trip formatting; missing
//! values are empty cells.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tunvesti_core::{
    BenchmarkCorrelation, CorrelationMatrix, DateDimRow, EnrichedRow, FactRow, PairCorrelation,
    ReconciledRow, SectorCorrelation, StockDimRow,
};

/// A table in memory, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCsv {
    pub name: &'static str,
    pub file: String,
    pub rows: usize,
    pub content: String,
}

/// A table written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenTable {
    pub name: String,
    pub file: String,
    pub rows: usize,
    pub blake3: String,
}

fn num(v: f64) -> String {
    v.to_string()
}

fn opt(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

fn opt_u64(v: Option<u64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Row tables ─────────────────────────────────────────────────────

const RECONCILED_HEADER: [&str; 20] = [
    "date",
    "ticker",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "volatility",
    "market_cap",
    "source",
    "benchmark_close",
    "benchmark_open",
    "benchmark_high",
    "benchmark_low",
    "benchmark_volume",
    "benchmark_change_pct",
    "sector",
    "company",
    "year",
    "dividend_per_share",
];

fn reconciled_fields(row: &ReconciledRow) -> Vec<String> {
    let p = &row.price;
    let b = row.benchmark.as_ref();
    vec![
        p.date.to_string(),
        p.ticker.clone(),
        opt(p.open),
        opt(p.high),
        opt(p.low),
        num(p.close),
        opt_u64(p.volume),
        opt(p.volatility),
        opt(p.market_cap),
        row.source.as_str().to_string(),
        opt(b.map(|b| b.close)),
        opt(b.and_then(|b| b.open)),
        opt(b.and_then(|b| b.high)),
        opt(b.and_then(|b| b.low)),
        opt(b.and_then(|b| b.volume)),
        opt(b.and_then(|b| b.change_pct)),
        row.sector.clone(),
        row.company.clone().unwrap_or_default(),
        row.year.to_string(),
        num(row.dividend_per_share),
    ]
}

/// Reconciled table (`merged_stocks`).
pub fn reconciled_csv(rows: &[ReconciledRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RECONCILED_HEADER)?;
    for row in rows {
        wtr.write_record(reconciled_fields(row))?;
    }
    finish(wtr)
}

/// Enriched table: reconciled columns followed by the derived metrics.
pub fn enriched_csv(rows: &[EnrichedRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header: Vec<&str> = RECONCILED_HEADER.to_vec();
    header.extend([
        "daily_return_pct",
        "volatility_30d",
        "avg_volume_30d",
        "dividend_yield_pct",
        "benchmark_daily_return_pct",
    ]);
    wtr.write_record(&header)?;

    for row in rows {
        let m = &row.metrics;
        let mut fields = reconciled_fields(&row.base);
        fields.extend([
            opt(m.daily_return_pct),
            opt(m.volatility_30d),
            opt(m.avg_volume_30d),
            num(m.dividend_yield_pct),
            opt(m.benchmark_daily_return_pct),
        ]);
        wtr.write_record(&fields)?;
    }
    finish(wtr)
}

/// `fact_stock_daily`.
pub fn fact_csv(rows: &[FactRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "ticker",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "daily_return_pct",
        "volatility_30d",
        "dividend_yield_pct",
        "avg_volume_30d",
        "benchmark_close",
        "market_cap",
    ])?;
    for f in rows {
        wtr.write_record([
            f.date.to_string(),
            f.ticker.clone(),
            opt(f.open),
            opt(f.high),
            opt(f.low),
            num(f.close),
            opt_u64(f.volume),
            opt(f.daily_return_pct),
            opt(f.volatility_30d),
            num(f.dividend_yield_pct),
            opt(f.avg_volume_30d),
            opt(f.benchmark_close),
            opt(f.market_cap),
        ])?;
    }
    finish(wtr)
}

// ─── Dimensions ─────────────────────────────────────────────────────

pub fn dim_date_csv(rows: &[DateDimRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "year",
        "month",
        "quarter",
        "week",
        "day_of_week",
        "day_name",
        "is_trading_day",
    ])?;
    for d in rows {
        wtr.write_record([
            d.date.to_string(),
            d.year.to_string(),
            d.month.to_string(),
            d.quarter.to_string(),
            d.week.to_string(),
            d.day_of_week.to_string(),
            d.day_name.clone(),
            d.is_trading_day.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn dim_stock_csv(rows: &[StockDimRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "sector", "company"])?;
    for s in rows {
        wtr.write_record([
            s.ticker.as_str(),
            s.sector.as_str(),
            s.company.as_deref().unwrap_or(""),
        ])?;
    }
    finish(wtr)
}

// ─── Correlation tables ─────────────────────────────────────────────

/// Square matrix with a leading `ticker` column.
pub fn correlation_matrix_csv(matrix: &CorrelationMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["ticker".to_string()];
    header.extend(matrix.tickers.iter().cloned());
    wtr.write_record(&header)?;

    for (ticker, values) in matrix.tickers.iter().zip(&matrix.values) {
        let mut fields = vec![ticker.clone()];
        fields.extend(values.iter().map(|v| opt(*v)));
        wtr.write_record(&fields)?;
    }
    finish(wtr)
}

pub fn correlation_pairs_csv(pairs: &[PairCorrelation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker_a", "ticker_b", "correlation"])?;
    for p in pairs {
        wtr.write_record([p.ticker_a.clone(), p.ticker_b.clone(), opt(p.correlation)])?;
    }
    finish(wtr)
}

pub fn stock_benchmark_csv(rows: &[BenchmarkCorrelation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "correlation",
        "correlation_volatility",
        "data_points",
    ])?;
    for c in rows {
        wtr.write_record([
            c.ticker.clone(),
            num(c.correlation),
            opt(c.correlation_volatility),
            c.data_points.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn sector_benchmark_csv(rows: &[SectorCorrelation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["sector", "correlation", "stocks_in_sector", "data_points"])?;
    for s in rows {
        wtr.write_record([
            s.sector.clone(),
            num(s.correlation),
            s.stocks_in_sector.to_string(),
            s.data_points.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Writing ────────────────────────────────────────────────────────

fn temp_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(format!(".{file}.tmp"))
}

fn written(table: &TableCsv) -> WrittenTable {
    WrittenTable {
        name: table.name.to_string(),
        file: table.file.clone(),
        rows: table.rows,
        blake3: blake3::hash(table.content.as_bytes()).to_hex().to_string(),
    }
}

/// Write one table under `dir`. The content lands in a temp file first and
/// is renamed into place, so a failed run never leaves a half-written table.
pub fn write_table(dir: &Path, table: &TableCsv) -> Result<WrittenTable> {
    write_tables(dir, std::slice::from_ref(table))?
        .pop()
        .context("no table written")
}

/// Write a set of tables as one unit. Every table is staged to its temp file
/// before any is renamed into place; a failed stage removes what it staged.
pub fn write_tables(dir: &Path, tables: &[TableCsv]) -> Result<Vec<WrittenTable>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;

    let mut staged: Vec<PathBuf> = Vec::with_capacity(tables.len());
    for table in tables {
        let tmp = temp_path(dir, &table.file);
        if let Err(e) = std::fs::write(&tmp, &table.content) {
            for path in &staged {
                let _ = std::fs::remove_file(path);
            }
            return Err(e).with_context(|| format!("failed to write {}", tmp.display()));
        }
        staged.push(tmp);
    }

    for (table, tmp) in tables.iter().zip(&staged) {
        let path = dir.join(&table.file);
        std::fs::rename(tmp, &path)
            .with_context(|| format!("failed to move {} into place", path.display()))?;
    }

    Ok(tables.iter().map(written).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tunvesti_core::{
        BenchmarkRecord, DerivedMetrics, PriceRecord, RecordSource, UNCLASSIFIED,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_row() -> EnrichedRow {
        let mut price = PriceRecord::new("BIAT", day(3), 101.5);
        price.volume = Some(1200);
        EnrichedRow {
            base: ReconciledRow {
                price,
                source: RecordSource::Incremental,
                benchmark: Some(BenchmarkRecord::new(day(3), 9012.25)),
                sector: "Banks".into(),
                company: Some("Banque Internationale Arabe, de Tunisie".into()),
                year: 2024,
                dividend_per_share: 0.0,
            },
            metrics: DerivedMetrics {
                daily_return_pct: Some(-1.25),
                ..DerivedMetrics::default()
            },
        }
    }

    fn lines(csv: &str) -> Vec<&str> {
        csv.lines().collect()
    }

    #[test]
    fn reconciled_header_and_empty_cells() {
        let row = sample_row().base;
        let csv = reconciled_csv(&[row]).unwrap();
        let lines = lines(&csv);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("date,ticker,open,high,low,close,volume"));
        assert!(lines[0].ends_with("sector,company,year,dividend_per_share"));
        assert!(lines[1].starts_with("2024-01-03,BIAT,,,,101.5,1200,,,incremental,9012.25,"));
        assert!(lines[1].contains("\"Banque Internationale Arabe, de Tunisie\""));
    }

    #[test]
    fn enriched_appends_metric_columns() {
        let csv = enriched_csv(&[sample_row()]).unwrap();
        let lines = lines(&csv);
        assert!(lines[0].ends_with(
            "daily_return_pct,volatility_30d,avg_volume_30d,dividend_yield_pct,benchmark_daily_return_pct"
        ));
        assert!(lines[1].ends_with(",-1.25,,,0,"));
    }

    #[test]
    fn matrix_is_square_with_ticker_column() {
        let matrix = CorrelationMatrix {
            tickers: vec!["A".into(), "B".into()],
            values: vec![vec![Some(1.0), None], vec![None, Some(1.0)]],
        };
        let csv = correlation_matrix_csv(&matrix).unwrap();
        assert_eq!(lines(&csv), vec!["ticker,A,B", "A,1,", "B,,1"]);
    }

    #[test]
    fn dim_stock_handles_missing_company() {
        let csv = dim_stock_csv(&[StockDimRow {
            ticker: "X".into(),
            sector: UNCLASSIFIED.into(),
            company: None,
        }])
        .unwrap();
        assert_eq!(lines(&csv), vec!["ticker,sector,company", "X,Unclassified,"]);
    }

    #[test]
    fn empty_tables_still_have_headers() {
        assert_eq!(correlation_pairs_csv(&[]).unwrap(), "ticker_a,ticker_b,correlation\n");
        assert_eq!(
            sector_benchmark_csv(&[]).unwrap(),
            "sector,correlation,stocks_in_sector,data_points\n"
        );
    }

    #[test]
    fn write_table_records_hash_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("processed");
        let table = TableCsv {
            name: "pairs",
            file: "pairs.csv".into(),
            rows: 0,
            content: correlation_pairs_csv(&[]).unwrap(),
        };
        let written = write_table(&out, &table).unwrap();

        let on_disk = std::fs::read_to_string(out.join("pairs.csv")).unwrap();
        assert_eq!(on_disk, table.content);
        assert_eq!(written.blake3, blake3::hash(on_disk.as_bytes()).to_hex().to_string());
        assert!(!out.join(".pairs.csv.tmp").exists());
    }

    #[test]
    fn failed_table_write_leaves_no_partial_set() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        let table = |name: &'static str, file: &str| TableCsv {
            name,
            file: file.into(),
            rows: 0,
            content: correlation_pairs_csv(&[]).unwrap(),
        };
        // A directory squatting on the second temp path makes its write fail.
        std::fs::create_dir_all(out.join(".pairs.csv.tmp")).unwrap();

        let tables = [table("matrix", "matrix.csv"), table("pairs", "pairs.csv")];
        assert!(write_tables(out, &tables).is_err());
        assert!(!out.join("matrix.csv").exists());
        assert!(!out.join(".matrix.csv.tmp").exists());
        assert!(!out.join("pairs.csv").exists());
    }
}
