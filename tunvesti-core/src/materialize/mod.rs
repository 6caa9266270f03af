//! Projections of the enriched table for reporting tools.

pub mod dimensions;

pub use dimensions::{date_dimension, stock_dimension, DateDimRow, StockDimRow};

use crate::domain::EnrichedRow;
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("null or out-of-range '{column}' at dimension row {row}")]
    BadValue { column: &'static str, row: usize },
}

/// One row of `fact_stock_daily`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
    pub daily_return_pct: Option<f64>,
    pub volatility_30d: Option<f64>,
    pub dividend_yield_pct: f64,
    pub avg_volume_30d: Option<f64>,
    pub benchmark_close: Option<f64>,
    pub market_cap: Option<f64>,
}

impl From<&EnrichedRow> for FactRow {
    fn from(row: &EnrichedRow) -> Self {
        let p = &row.base.price;
        let m = &row.metrics;
        Self {
            date: p.date,
            ticker: p.ticker.clone(),
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            volume: p.volume,
            daily_return_pct: m.daily_return_pct,
            volatility_30d: m.volatility_30d,
            dividend_yield_pct: m.dividend_yield_pct,
            avg_volume_30d: m.avg_volume_30d,
            benchmark_close: row.base.benchmark.as_ref().map(|b| b.close),
            market_cap: p.market_cap,
        }
    }
}

/// Fact rows in (ticker, date) order.
pub fn fact_table(rows: &[EnrichedRow]) -> Vec<FactRow> {
    let mut facts: Vec<FactRow> = rows.iter().map(FactRow::from).collect();
    facts.sort_by(|a, b| (&a.ticker, a.date).cmp(&(&b.ticker, b.date)));
    facts
}
