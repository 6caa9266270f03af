//! Benchmark returns, computed once per date and broadcast to every row.

use super::returns::pct_changes;
use crate::domain::BenchmarkRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Daily return of the benchmark keyed by date. `series` must be sorted by
/// date with one record per date.
pub fn benchmark_returns(series: &[BenchmarkRecord]) -> BTreeMap<NaiveDate, f64> {
    let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
    series
        .iter()
        .zip(pct_changes(&closes))
        .filter_map(|(b, r)| r.map(|r| (b.date, r)))
        .collect()
}
