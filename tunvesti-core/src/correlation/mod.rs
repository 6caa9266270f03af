//! Correlation engine.
//!
//! All correlations are computed from the daily returns of the enriched
//! table. Results are recomputed wholesale on every run.

pub mod benchmark;
pub mod stock;

pub use benchmark::{BenchmarkCorrelation, SectorCorrelation};
pub use stock::{CorrelationMatrix, PairCorrelation};

use crate::domain::EnrichedRow;
use crate::report::{Stage, StageSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Shared observations needed for a stock or sector to be correlated
    /// with the benchmark.
    pub min_benchmark_overlap: usize,
    /// Shared observations needed for a stock pair.
    pub min_pair_overlap: usize,
    /// Width of the rolling correlation behind `correlation_volatility`.
    pub rolling_window: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_benchmark_overlap: 30,
            min_pair_overlap: 2,
            rolling_window: 60,
        }
    }
}

/// Non-null returns organized for correlation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnPanel {
    /// Ticker → date → daily return.
    pub stocks: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    /// Date → benchmark daily return.
    pub benchmark: BTreeMap<NaiveDate, f64>,
    /// Sector → (ticker, date, return) for every row of that sector.
    pub sectors: BTreeMap<String, Vec<(String, NaiveDate, f64)>>,
}

impl ReturnPanel {
    pub fn from_rows(rows: &[EnrichedRow]) -> Self {
        let mut panel = Self::default();
        for row in rows {
            let ticker = row.ticker();
            let series = panel.stocks.entry(ticker.to_string()).or_default();
            if let Some(b) = row.metrics.benchmark_daily_return_pct {
                panel.benchmark.insert(row.date(), b);
            }
            let Some(r) = row.metrics.daily_return_pct else {
                continue;
            };
            series.insert(row.date(), r);
            panel
                .sectors
                .entry(row.base.sector.clone())
                .or_default()
                .push((ticker.to_string(), row.date(), r));
        }
        panel
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub summary: StageSummary,
    pub matrix_tickers: usize,
    pub defined_pairs: usize,
    pub undefined_pairs: usize,
    pub benchmark_dates: usize,
    /// Tickers left out of the benchmark list.
    pub excluded_tickers: Vec<String>,
    /// Sectors left out of the sector list.
    pub excluded_sectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSet {
    pub matrix: CorrelationMatrix,
    pub pairs: Vec<PairCorrelation>,
    pub stock_benchmark: Vec<BenchmarkCorrelation>,
    pub sector_benchmark: Vec<SectorCorrelation>,
    pub report: CorrelationReport,
}

/// Compute every correlation table from the enriched rows.
pub fn compute_correlations(rows: &[EnrichedRow], config: &CorrelationConfig) -> CorrelationSet {
    let panel = ReturnPanel::from_rows(rows);

    let matrix = stock::stock_matrix(&panel, config.min_pair_overlap);
    let pairs = matrix.pairs();
    let (stock_benchmark, excluded_tickers) =
        benchmark::stock_benchmark(&panel, config.min_benchmark_overlap, config.rolling_window);
    let (sector_benchmark, excluded_sectors) =
        benchmark::sector_benchmark(&panel, config.min_benchmark_overlap);

    let defined_pairs = pairs.iter().filter(|p| p.correlation.is_some()).count();
    let report = CorrelationReport {
        summary: StageSummary::from_keys(
            Stage::Correlate,
            rows.len(),
            0,
            rows.iter().map(|r| (r.ticker(), r.date())),
        ),
        matrix_tickers: matrix.len(),
        defined_pairs,
        undefined_pairs: pairs.len() - defined_pairs,
        benchmark_dates: panel.benchmark.len(),
        excluded_tickers,
        excluded_sectors,
    };

    CorrelationSet {
        matrix,
        pairs,
        stock_benchmark,
        sector_benchmark,
        report,
    }
}
