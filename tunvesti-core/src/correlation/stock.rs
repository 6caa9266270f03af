//! Stock-to-stock correlation over pairwise-complete observations.

use super::ReturnPanel;
use crate::stats::pearson;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Symmetric ticker × ticker matrix. `None` where the correlation is
/// undefined (too little overlap or zero variance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Sorted ascending; row and column order of `values`.
    pub tickers: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Correlation between two tickers by name.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.tickers.binary_search_by(|t| t.as_str().cmp(a)).ok()?;
        let j = self.tickers.binary_search_by(|t| t.as_str().cmp(b)).ok()?;
        self.values[i][j]
    }

    /// Upper-triangle pairs, strongest first.
    pub fn pairs(&self) -> Vec<PairCorrelation> {
        let mut pairs = Vec::new();
        for i in 0..self.len() {
            for j in (i + 1)..self.len() {
                pairs.push(PairCorrelation {
                    ticker_a: self.tickers[i].clone(),
                    ticker_b: self.tickers[j].clone(),
                    correlation: self.values[i][j],
                });
            }
        }
        pairs.sort_by(|x, y| {
            descending(x.correlation, y.correlation)
                .then_with(|| x.ticker_a.cmp(&y.ticker_a))
                .then_with(|| x.ticker_b.cmp(&y.ticker_b))
        });
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCorrelation {
    pub ticker_a: String,
    pub ticker_b: String,
    pub correlation: Option<f64>,
}

/// Descending by value with undefined values last.
pub(crate) fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Pearson correlation over the dates both series have.
pub(crate) fn pairwise(
    a: &BTreeMap<chrono::NaiveDate, f64>,
    b: &BTreeMap<chrono::NaiveDate, f64>,
    min_overlap: usize,
) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .filter_map(|(date, x)| b.get(date).map(|y| (*x, *y)))
        .unzip();
    if xs.len() < min_overlap.max(2) {
        return None;
    }
    pearson(&xs, &ys)
}

/// Build the stock matrix. Tickers without a single return are left out.
pub fn stock_matrix(panel: &ReturnPanel, min_overlap: usize) -> CorrelationMatrix {
    let series: Vec<(&String, &BTreeMap<chrono::NaiveDate, f64>)> = panel
        .stocks
        .iter()
        .filter(|(_, s)| !s.is_empty())
        .collect();
    let n = series.len();
    let mut values = vec![vec![None; n]; n];

    for i in 0..n {
        // Diagonal is exactly 1 whenever the series has variance.
        values[i][i] = pairwise(series[i].1, series[i].1, min_overlap).map(|_| 1.0);
        for j in (i + 1)..n {
            let r = pairwise(series[i].1, series[j].1, min_overlap);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        tickers: series.iter().map(|(t, _)| (*t).clone()).collect(),
        values,
    }
}
