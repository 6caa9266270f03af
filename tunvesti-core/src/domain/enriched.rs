//! Joined and enriched rows, one per (ticker, date).

use super::price::{BenchmarkRecord, PriceRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which source supplied the winning record for a (ticker, date) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Historical,
    Incremental,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Historical => "historical",
            RecordSource::Incremental => "incremental",
        }
    }
}

impl std::str::FromStr for RecordSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "historical" => Ok(RecordSource::Historical),
            "incremental" => Ok(RecordSource::Incremental),
            other => Err(format!("unknown record source '{other}'")),
        }
    }
}

/// A price record joined with benchmark, sector and dividend references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub price: PriceRecord,
    pub source: RecordSource,
    /// Benchmark for the same date, if the benchmark covers it.
    pub benchmark: Option<BenchmarkRecord>,
    pub sector: String,
    pub company: Option<String>,
    pub year: i32,
    /// Zero when no dividend is on record for (ticker, year).
    pub dividend_per_share: f64,
}

impl ReconciledRow {
    pub fn ticker(&self) -> &str {
        &self.price.ticker
    }

    pub fn date(&self) -> NaiveDate {
        self.price.date
    }
}

/// Time-series metrics derived per ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub daily_return_pct: Option<f64>,
    pub volatility_30d: Option<f64>,
    pub avg_volume_30d: Option<f64>,
    pub dividend_yield_pct: f64,
    pub benchmark_daily_return_pct: Option<f64>,
}

/// Reconciled row plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub base: ReconciledRow,
    pub metrics: DerivedMetrics,
}

impl EnrichedRow {
    pub fn ticker(&self) -> &str {
        self.base.ticker()
    }

    pub fn date(&self) -> NaiveDate {
        self.base.date()
    }
}
