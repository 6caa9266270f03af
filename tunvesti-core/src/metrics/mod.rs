//! Metric derivation.
//!
//! A single pass over the reconciled table. Rows must arrive sorted by
//! (ticker, date); rolling state restarts whenever the ticker changes, so no
//! window ever spans two tickers.

pub mod benchmark;
pub mod returns;
pub mod rolling;

use crate::domain::{BenchmarkRecord, DerivedMetrics, EnrichedRow, ReconciledRow};
use crate::report::{Stage, StageSummary};
use benchmark::benchmark_returns;
use chrono::NaiveDate;
use returns::pct_change;
use rolling::TrailingWindow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window parameters for the derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Trailing observations for volatility and average volume.
    pub window: usize,
    /// Annualization factor for volatility (square-rooted).
    pub trading_days_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window: 30,
            trading_days_per_year: 252.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), DeriveError> {
        if self.window < 2 {
            return Err(DeriveError::InvalidConfig(format!(
                "window must be at least 2, got {}",
                self.window
            )));
        }
        if !(self.trading_days_per_year > 0.0) {
            return Err(DeriveError::InvalidConfig(format!(
                "trading_days_per_year must be positive, got {}",
                self.trading_days_per_year
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DeriveError {
    #[error("invalid metrics config: {0}")]
    InvalidConfig(String),

    #[error("rows not sorted by (ticker, date) at index {index}: {ticker} {date}")]
    Unsorted {
        index: usize,
        ticker: String,
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeriveReport {
    pub summary: StageSummary,
    pub tickers: usize,
    pub rows_with_return: usize,
    pub rows_with_volatility: usize,
    pub rows_with_avg_volume: usize,
    pub rows_with_dividend_yield: usize,
    pub rows_with_benchmark_return: usize,
    /// Returns left undefined because the previous close was zero.
    pub zero_previous_close: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub rows: Vec<EnrichedRow>,
    pub report: DeriveReport,
}

/// Derive per-row metrics.
///
/// `benchmark` is the deduplicated benchmark series sorted by date; its
/// returns are computed once and broadcast by date.
pub fn derive_metrics(
    rows: Vec<ReconciledRow>,
    benchmark: &[BenchmarkRecord],
    config: &MetricsConfig,
) -> Result<Derived, DeriveError> {
    config.validate()?;
    check_sorted(&rows)?;

    let bench_returns = benchmark_returns(benchmark);
    let annualize = config.trading_days_per_year.sqrt();
    let rows_in = rows.len();

    let mut returns_window = TrailingWindow::new(config.window);
    let mut volume_window = TrailingWindow::new(config.window);
    let mut current: Option<String> = None;
    let mut prev_close: Option<f64> = None;

    let mut tickers = 0;
    let mut zero_previous_close = 0;
    let mut enriched = Vec::with_capacity(rows_in);

    for row in rows {
        if current.as_deref() != Some(row.ticker()) {
            tickers += 1;
            returns_window.reset();
            volume_window.reset();
            prev_close = None;
            current = Some(row.ticker().to_string());
        }
        let close = row.price.close;

        let daily_return_pct = prev_close.and_then(|p| pct_change(p, close));
        if prev_close == Some(0.0) {
            zero_previous_close += 1;
        }

        returns_window.push(daily_return_pct);
        volume_window.push(row.price.volume.map(|v| v as f64));

        let dividend_yield_pct = if row.dividend_per_share > 0.0 && close > 0.0 {
            row.dividend_per_share / close * 100.0
        } else {
            0.0
        };

        let metrics = DerivedMetrics {
            daily_return_pct,
            volatility_30d: returns_window.std().map(|s| s * annualize),
            avg_volume_30d: volume_window.mean(),
            dividend_yield_pct,
            benchmark_daily_return_pct: bench_returns.get(&row.date()).copied(),
        };

        prev_close = Some(close);
        enriched.push(EnrichedRow { base: row, metrics });
    }

    let count = |f: fn(&DerivedMetrics) -> bool| enriched.iter().filter(|r| f(&r.metrics)).count();
    let report = DeriveReport {
        summary: StageSummary::from_keys(
            Stage::Derive,
            rows_in,
            0,
            enriched.iter().map(|r| (r.ticker(), r.date())),
        ),
        tickers,
        rows_with_return: count(|m| m.daily_return_pct.is_some()),
        rows_with_volatility: count(|m| m.volatility_30d.is_some()),
        rows_with_avg_volume: count(|m| m.avg_volume_30d.is_some()),
        rows_with_dividend_yield: count(|m| m.dividend_yield_pct > 0.0),
        rows_with_benchmark_return: count(|m| m.benchmark_daily_return_pct.is_some()),
        zero_previous_close,
    };

    Ok(Derived {
        rows: enriched,
        report,
    })
}

fn check_sorted(rows: &[ReconciledRow]) -> Result<(), DeriveError> {
    for (index, pair) in rows.windows(2).enumerate() {
        if (pair[0].ticker(), pair[0].date()) >= (pair[1].ticker(), pair[1].date()) {
            return Err(DeriveError::Unsorted {
                index: index + 1,
                ticker: pair[1].ticker().to_string(),
                date: pair[1].date(),
            });
        }
    }
    Ok(())
}

/// Assert two floats are within epsilon.
#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceRecord, RecordSource, UNCLASSIFIED};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn row(ticker: &str, n: i64, close: f64) -> ReconciledRow {
        let mut price = PriceRecord::new(ticker, day(n), close);
        price.volume = Some(100 + n as u64);
        ReconciledRow {
            price,
            source: RecordSource::Historical,
            benchmark: None,
            sector: UNCLASSIFIED.to_string(),
            company: None,
            year: 2024,
            dividend_per_share: 0.0,
        }
    }

    fn series(ticker: &str, n: usize) -> Vec<ReconciledRow> {
        (0..n)
            .map(|i| row(ticker, i as i64, 100.0 + ((i * 7) % 5) as f64))
            .collect()
    }

    #[test]
    fn returns_reset_per_ticker() {
        let mut rows = vec![row("A", 0, 100.0), row("A", 1, 110.0), row("A", 2, 99.0)];
        rows.push(row("B", 0, 50.0));
        let out = derive_metrics(rows, &[], &MetricsConfig::default()).unwrap();
        let r: Vec<Option<f64>> = out.rows.iter().map(|r| r.metrics.daily_return_pct).collect();
        assert_eq!(r[0], None);
        assert_approx(r[1].unwrap(), 10.0, DEFAULT_EPSILON);
        assert_approx(r[2].unwrap(), -10.0, DEFAULT_EPSILON);
        assert_eq!(r[3], None);
        assert_eq!(out.report.tickers, 2);
    }

    #[test]
    fn volatility_waits_for_full_window() {
        let out = derive_metrics(series("A", 29), &[], &MetricsConfig::default()).unwrap();
        assert!(out.rows.iter().all(|r| r.metrics.volatility_30d.is_none()));
        assert!(out.rows.iter().all(|r| r.metrics.avg_volume_30d.is_none()));

        let out = derive_metrics(series("A", 30), &[], &MetricsConfig::default()).unwrap();
        let present: Vec<usize> = out
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.metrics.volatility_30d.is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(present, vec![29]);
        assert_eq!(out.report.rows_with_avg_volume, 1);
    }

    #[test]
    fn volatility_is_annualized_sample_std() {
        let config = MetricsConfig {
            window: 3,
            trading_days_per_year: 252.0,
        };
        // returns: None, 10, -10
        let rows = vec![row("A", 0, 100.0), row("A", 1, 110.0), row("A", 2, 99.0)];
        let out = derive_metrics(rows, &[], &config).unwrap();
        let expected = (200.0_f64).sqrt() * 252.0_f64.sqrt();
        assert_approx(out.rows[2].metrics.volatility_30d.unwrap(), expected, 1e-9);
        // volumes 100, 101, 102
        assert_approx(out.rows[2].metrics.avg_volume_30d.unwrap(), 101.0, DEFAULT_EPSILON);
    }

    #[test]
    fn dividend_yield_defaults_to_zero() {
        let mut with_div = row("A", 0, 20.0);
        with_div.dividend_per_share = 0.5;
        let rows = vec![with_div, row("A", 1, 20.0)];
        let out = derive_metrics(rows, &[], &MetricsConfig::default()).unwrap();
        assert_approx(out.rows[0].metrics.dividend_yield_pct, 2.5, DEFAULT_EPSILON);
        assert_eq!(out.rows[1].metrics.dividend_yield_pct, 0.0);
    }

    #[test]
    fn zero_close_yields_no_yield_and_no_next_return() {
        let mut zero = row("A", 0, 0.0);
        zero.dividend_per_share = 1.0;
        let out = derive_metrics(vec![zero, row("A", 1, 5.0)], &[], &MetricsConfig::default())
            .unwrap();
        assert_eq!(out.rows[0].metrics.dividend_yield_pct, 0.0);
        assert_eq!(out.rows[1].metrics.daily_return_pct, None);
        assert_eq!(out.report.zero_previous_close, 1);
    }

    #[test]
    fn benchmark_return_broadcast_by_date() {
        let bench = vec![
            BenchmarkRecord::new(day(0), 1000.0),
            BenchmarkRecord::new(day(1), 1010.0),
        ];
        let rows = vec![row("A", 1, 1.0), row("B", 1, 2.0)];
        let out = derive_metrics(rows, &bench, &MetricsConfig::default()).unwrap();
        for r in &out.rows {
            assert_approx(r.metrics.benchmark_daily_return_pct.unwrap(), 1.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn unsorted_input_is_rejected() {
        let rows = vec![row("B", 0, 1.0), row("A", 0, 1.0)];
        let err = derive_metrics(rows, &[], &MetricsConfig::default()).unwrap_err();
        assert!(matches!(err, DeriveError::Unsorted { index: 1, .. }));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let rows = vec![row("A", 0, 1.0), row("A", 0, 2.0)];
        assert!(derive_metrics(rows, &[], &MetricsConfig::default()).is_err());
    }

    #[test]
    fn window_below_two_is_invalid() {
        let config = MetricsConfig {
            window: 1,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            derive_metrics(vec![], &[], &config),
            Err(DeriveError::InvalidConfig(_))
        ));
    }
}
