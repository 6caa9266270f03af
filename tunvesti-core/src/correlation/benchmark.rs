//! Correlation against the benchmark, per stock and pooled per sector.

use super::stock::descending;
use super::ReturnPanel;
use crate::stats::{pearson, rolling_pearson, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkCorrelation {
    pub ticker: String,
    pub correlation: f64,
    /// Sample std of the rolling correlation; `None` with fewer than two
    /// full rolling windows.
    pub correlation_volatility: Option<f64>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorCorrelation {
    pub sector: String,
    pub correlation: f64,
    pub stocks_in_sector: usize,
    pub data_points: usize,
}

/// Per-stock correlation with the benchmark. Tickers with fewer than
/// `min_overlap` shared dates, or an undefined correlation, are excluded and
/// returned by name in the second element.
pub fn stock_benchmark(
    panel: &ReturnPanel,
    min_overlap: usize,
    rolling_window: usize,
) -> (Vec<BenchmarkCorrelation>, Vec<String>) {
    let mut out = Vec::new();
    let mut excluded = Vec::new();

    for (ticker, series) in &panel.stocks {
        let (xs, ys): (Vec<f64>, Vec<f64>) = series
            .iter()
            .filter_map(|(date, r)| panel.benchmark.get(date).map(|b| (*r, *b)))
            .unzip();

        let correlation = if xs.len() >= min_overlap.max(2) {
            pearson(&xs, &ys)
        } else {
            None
        };
        let Some(correlation) = correlation else {
            excluded.push(ticker.clone());
            continue;
        };

        let rolling: Vec<f64> = rolling_pearson(&xs, &ys, rolling_window)
            .into_iter()
            .flatten()
            .collect();

        out.push(BenchmarkCorrelation {
            ticker: ticker.clone(),
            correlation,
            correlation_volatility: sample_std(&rolling),
            data_points: xs.len(),
        });
    }

    out.sort_by(|a, b| {
        descending(Some(a.correlation), Some(b.correlation)).then_with(|| a.ticker.cmp(&b.ticker))
    });
    (out, excluded)
}

/// Per-sector correlation over the pooled observations of every ticker in
/// the sector. Sectors below `min_overlap` pooled observations are excluded.
pub fn sector_benchmark(
    panel: &ReturnPanel,
    min_overlap: usize,
) -> (Vec<SectorCorrelation>, Vec<String>) {
    let mut out = Vec::new();
    let mut excluded = Vec::new();

    for (sector, observations) in &panel.sectors {
        let mut tickers = BTreeSet::new();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (ticker, date, r) in observations {
            if let Some(b) = panel.benchmark.get(date) {
                tickers.insert(ticker.as_str());
                xs.push(*r);
                ys.push(*b);
            }
        }

        let correlation = if xs.len() >= min_overlap.max(2) {
            pearson(&xs, &ys)
        } else {
            None
        };
        match correlation {
            Some(correlation) => out.push(SectorCorrelation {
                sector: sector.clone(),
                correlation,
                stocks_in_sector: tickers.len(),
                data_points: xs.len(),
            }),
            None => excluded.push(sector.clone()),
        }
    }

    out.sort_by(|a, b| {
        descending(Some(a.correlation), Some(b.correlation)).then_with(|| a.sector.cmp(&b.sector))
    });
    (out, excluded)
}
