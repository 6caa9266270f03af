//! Source discovery and CSV loading.
//!
//! Files are read into untyped [`RawTable`]s; typing and row validation
//! happen in the core normalizer. Incremental batches are discovered by file
//! name prefix, and their creation date is taken from the `YYYY-MM-DD` in the
//! name.

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tunvesti_core::{
    BatchId, BenchmarkRecord, DerivedMetrics, EnrichedRow, PriceRecord, RawTable, ReconciledRow,
    RecordSource,
};

/// Errors from the loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{line}: {reason}")]
    BadRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// A table read from disk plus the BLAKE3 hash of its bytes.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub hash: String,
}

/// An incremental batch file found in the daily-updates directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub id: BatchId,
}

/// Read a delimited file. Ragged rows are accepted; short rows read missing
/// cells as empty.
pub fn read_raw_table(path: &Path) -> Result<LoadedTable, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = blake3::hash(&bytes).to_hex().to_string();

    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(String::from)
        .collect();

    let mut table = RawTable::new(file_label(path), headers);
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let fields = record.iter().map(String::from).collect();
        match record.position() {
            Some(pos) => table.push_row_at(pos.line() as usize, fields),
            None => table.push_row(fields),
        }
    }

    Ok(LoadedTable { table, hash })
}

/// File name used to label a source in reports.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Batch identity from a file name such as `updated_stocks_2024-01-03.csv`.
/// Names without a parseable date get `created = None`.
pub fn batch_id_from_file_name(name: &str) -> BatchId {
    let created = name
        .char_indices()
        .filter_map(|(i, _)| name.get(i..i + 10))
        .find_map(|candidate| NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok());
    BatchId::new(name, created)
}

/// Every `{prefix}*.csv` file in `dir`, ordered by batch id. A missing
/// directory yields no batches.
pub fn discover_batches(dir: &Path, prefix: &str) -> Result<Vec<BatchFile>, LoadError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut batches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.to_ascii_lowercase().ends_with(".csv") {
            batches.push(BatchFile {
                path: entry.path(),
                id: batch_id_from_file_name(&name),
            });
        }
    }
    batches.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(batches)
}

/// One row of a previously written enriched table.
#[derive(Debug, Deserialize)]
struct EnrichedCsvRow {
    date: NaiveDate,
    ticker: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    volume: Option<u64>,
    volatility: Option<f64>,
    market_cap: Option<f64>,
    source: String,
    benchmark_close: Option<f64>,
    benchmark_open: Option<f64>,
    benchmark_high: Option<f64>,
    benchmark_low: Option<f64>,
    benchmark_volume: Option<f64>,
    benchmark_change_pct: Option<f64>,
    sector: String,
    company: Option<String>,
    year: i32,
    dividend_per_share: f64,
    daily_return_pct: Option<f64>,
    volatility_30d: Option<f64>,
    avg_volume_30d: Option<f64>,
    dividend_yield_pct: f64,
    benchmark_daily_return_pct: Option<f64>,
}

impl EnrichedCsvRow {
    fn into_row(self) -> Result<EnrichedRow, String> {
        let source: RecordSource = self.source.parse()?;
        let benchmark = self.benchmark_close.map(|close| BenchmarkRecord {
            date: self.date,
            close,
            open: self.benchmark_open,
            high: self.benchmark_high,
            low: self.benchmark_low,
            volume: self.benchmark_volume,
            change_pct: self.benchmark_change_pct,
        });
        Ok(EnrichedRow {
            base: ReconciledRow {
                price: PriceRecord {
                    ticker: self.ticker,
                    date: self.date,
                    open: self.open,
                    high: self.high,
                    low: self.low,
                    close: self.close,
                    volume: self.volume,
                    volatility: self.volatility,
                    market_cap: self.market_cap,
                },
                source,
                benchmark,
                sector: self.sector,
                company: self.company.filter(|c| !c.is_empty()),
                year: self.year,
                dividend_per_share: self.dividend_per_share,
            },
            metrics: DerivedMetrics {
                daily_return_pct: self.daily_return_pct,
                volatility_30d: self.volatility_30d,
                avg_volume_30d: self.avg_volume_30d,
                dividend_yield_pct: self.dividend_yield_pct,
                benchmark_daily_return_pct: self.benchmark_daily_return_pct,
            },
        })
    }
}

/// Read an enriched table written by a previous run, for restarting at the
/// correlation stage.
pub fn read_enriched_table(path: &Path) -> Result<Vec<EnrichedRow>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(std::io::BufReader::new(file));

    let mut rows = Vec::new();
    for result in reader.deserialize::<EnrichedCsvRow>() {
        let raw = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = rows.len() as u64 + 2;
        let row = raw.into_row().map_err(|reason| LoadError::BadRow {
            path: path.to_path_buf(),
            line,
            reason,
        })?;
        rows.push(row);
    }
    rows.sort_by(|a, b| (a.ticker(), a.date()).cmp(&(b.ticker(), b.date())));
    Ok(rows)
}
