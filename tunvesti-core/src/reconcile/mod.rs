//! Source reconciliation.
//!
//! Merges the historical load and every incremental batch into one record per
//! (ticker, date), then left-joins benchmark, sector and dividend references.
//! The output is sorted by (ticker, date), which the metric stage relies on.

mod joins;
mod priority;

use crate::domain::{
    BenchmarkRecord, DividendRecord, PriceRecord, ReconciledRow, RecordSource, SectorAssignment,
};
use crate::report::{Stage, StageSummary};
use chrono::{Datelike, NaiveDate};
use joins::{BenchmarkIndex, DividendIndex, SectorIndex};
use priority::{Priority, Resolver};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of an input batch. Orders by creation date (undated first), then
/// label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId {
    pub created: Option<NaiveDate>,
    pub label: String,
}

impl BatchId {
    pub fn new(label: impl Into<String>, created: Option<NaiveDate>) -> Self {
        Self {
            created,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBatch {
    pub id: BatchId,
    pub records: Vec<PriceRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkBatch {
    pub id: BatchId,
    pub records: Vec<BenchmarkRecord>,
}

/// Everything the reconciler consumes. `None` marks an optional source that
/// was not available at all; `Some(vec![])` one that was empty.
#[derive(Debug, Clone)]
pub struct ReconcileInput {
    pub historical: PriceBatch,
    pub incremental: Vec<PriceBatch>,
    /// Bulk benchmark file.
    pub benchmark: Option<BenchmarkBatch>,
    /// Benchmark snapshots; these outrank the bulk file.
    pub benchmark_updates: Vec<BenchmarkBatch>,
    pub sectors: Option<Vec<SectorAssignment>>,
    pub dividends: Option<Vec<DividendRecord>>,
}

impl ReconcileInput {
    /// Input with only the required historical batch.
    pub fn new(historical: PriceBatch) -> Self {
        Self {
            historical,
            incremental: Vec::new(),
            benchmark: None,
            benchmark_updates: Vec::new(),
            sectors: None,
            dividends: None,
        }
    }
}

/// Nulls in the optional price columns of the reconciled table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullCounts {
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub volume: usize,
    pub volatility: usize,
    pub market_cap: usize,
}

impl NullCounts {
    fn tally(&mut self, p: &PriceRecord) {
        self.open += usize::from(p.open.is_none());
        self.high += usize::from(p.high.is_none());
        self.low += usize::from(p.low.is_none());
        self.volume += usize::from(p.volume.is_none());
        self.volatility += usize::from(p.volatility.is_none());
        self.market_cap += usize::from(p.market_cap.is_none());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub summary: StageSummary,
    pub historical_rows: usize,
    pub incremental_rows: usize,
    pub incremental_batches: usize,
    /// Price candidates that lost to a higher-priority record for their key.
    pub superseded: usize,
    /// Keys present in the historical load whose value came from an incremental batch.
    pub historical_overridden: usize,
    pub benchmark_dates: usize,
    pub benchmark_superseded: usize,
    pub rows_with_benchmark: usize,
    pub rows_with_sector: usize,
    pub rows_with_dividend: usize,
    pub sector_conflicts: usize,
    pub dividend_conflicts: usize,
    pub null_counts: NullCounts,
    /// Degraded sources.
    pub warnings: Vec<String>,
}

/// Reconciled rows plus the deduplicated benchmark series (sorted by date).
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub rows: Vec<ReconciledRow>,
    pub benchmark: Vec<BenchmarkRecord>,
    pub report: ReconcileReport,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("historical source '{0}' has no usable records")]
    EmptyHistorical(String),
}

/// Reconcile all sources into one row per (ticker, date).
pub fn reconcile(input: ReconcileInput) -> Result<Reconciled, ReconcileError> {
    let ReconcileInput {
        historical,
        mut incremental,
        benchmark,
        mut benchmark_updates,
        sectors,
        dividends,
    } = input;

    if historical.records.is_empty() {
        return Err(ReconcileError::EmptyHistorical(historical.id.label));
    }

    let mut warnings = Vec::new();
    if incremental.iter().all(|b| b.records.is_empty()) {
        warnings.push("no incremental records; using historical load only".to_string());
    }

    // Prices: historical is rank 0, incremental batches follow in id order.
    incremental.sort_by(|a, b| a.id.cmp(&b.id));
    let historical_rows = historical.records.len();
    let incremental_rows: usize = incremental.iter().map(|b| b.records.len()).sum();
    let incremental_batches = incremental.len();

    let mut prices: Resolver<(String, NaiveDate), (PriceRecord, RecordSource)> = Resolver::new();
    let mut historical_overridden = 0;
    let ranked = std::iter::once((RecordSource::Historical, historical)).chain(
        incremental
            .into_iter()
            .map(|batch| (RecordSource::Incremental, batch)),
    );
    for (batch_rank, (source, batch)) in ranked.enumerate() {
        for (row, record) in batch.records.into_iter().enumerate() {
            let key = (record.ticker.clone(), record.date);
            let displaced = prices.offer(key, Priority { batch_rank, row }, (record, source));
            if let Some((_, RecordSource::Historical)) = displaced {
                if source == RecordSource::Incremental {
                    historical_overridden += 1;
                }
            }
        }
    }
    let superseded = prices.superseded();

    // Benchmark: bulk file is rank 0, snapshots follow in id order.
    if benchmark.as_ref().map_or(true, |b| b.records.is_empty())
        && benchmark_updates.iter().all(|b| b.records.is_empty())
    {
        warnings.push("no benchmark records; benchmark fields left empty".to_string());
    }
    benchmark_updates.sort_by(|a, b| a.id.cmp(&b.id));
    let mut bench: Resolver<NaiveDate, BenchmarkRecord> = Resolver::new();
    for (batch_rank, batch) in benchmark.into_iter().chain(benchmark_updates).enumerate() {
        for (row, record) in batch.records.into_iter().enumerate() {
            bench.offer(record.date, Priority { batch_rank, row }, record);
        }
    }
    let benchmark_superseded = bench.superseded();
    let bench_index: BenchmarkIndex = bench.into_values().map(|b| (b.date, b)).collect();

    let sector_index = match sectors {
        Some(s) if !s.is_empty() => SectorIndex::build(&s),
        _ => {
            warnings.push("no sector reference; all tickers unclassified".to_string());
            SectorIndex::default()
        }
    };
    let dividend_index = match dividends {
        Some(d) if !d.is_empty() => DividendIndex::build(&d),
        _ => {
            warnings.push("no dividend reference; dividend_per_share defaults to 0".to_string());
            DividendIndex::default()
        }
    };

    let mut null_counts = NullCounts::default();
    let mut rows_with_benchmark = 0;
    let mut rows_with_sector = 0;
    let mut rows_with_dividend = 0;

    let rows: Vec<ReconciledRow> = prices
        .into_values()
        .map(|(price, source)| {
            null_counts.tally(&price);
            let year = price.date.year();
            let benchmark = bench_index.get(&price.date).cloned();
            let (sector, company, matched) = sector_index.lookup(&price.ticker);
            let dividend = dividend_index.lookup(&price.ticker, year);

            rows_with_benchmark += usize::from(benchmark.is_some());
            rows_with_sector += usize::from(matched);
            rows_with_dividend += usize::from(dividend.is_some());

            ReconciledRow {
                price,
                source,
                benchmark,
                sector,
                company,
                year,
                dividend_per_share: dividend.unwrap_or(0.0),
            }
        })
        .collect();

    let summary = StageSummary::from_keys(
        Stage::Reconcile,
        historical_rows + incremental_rows,
        superseded,
        rows.iter().map(|r| (r.ticker(), r.date())),
    );

    let report = ReconcileReport {
        summary,
        historical_rows,
        incremental_rows,
        incremental_batches,
        superseded,
        historical_overridden,
        benchmark_dates: bench_index.len(),
        benchmark_superseded,
        rows_with_benchmark,
        rows_with_sector,
        rows_with_dividend,
        sector_conflicts: sector_index.conflicts,
        dividend_conflicts: dividend_index.conflicts,
        null_counts,
        warnings,
    };

    Ok(Reconciled {
        rows,
        benchmark: bench_index.into_values().collect(),
        report,
    })
}
