//! Daily price and benchmark records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV observation for a single ticker on a single date.
///
/// `close` is the only price that must be present; rows lacking it never
/// leave the normalizer. Tickers are stored uppercased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
    /// Scraper-provided volatility figure. Carried through, never used by metrics.
    pub volatility: Option<f64>,
    /// Market capitalization (millions). Carried through, never used by metrics.
    pub market_cap: Option<f64>,
}

impl PriceRecord {
    /// Record with only the required fields set.
    pub fn new(ticker: impl Into<String>, date: NaiveDate, close: f64) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            volatility: None,
            market_cap: None,
        }
    }

    /// Reconciliation key.
    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.ticker, self.date)
    }

    /// Basic sanity check on the optional prices: high >= low when both exist.
    pub fn is_consistent(&self) -> bool {
        match (self.high, self.low) {
            (Some(h), Some(l)) => h >= l,
            _ => true,
        }
    }
}

/// One day of the market benchmark (TUNINDEX). Has no ticker; joined on date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub change_pct: Option<f64>,
}

impl BenchmarkRecord {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
            change_pct: None,
        }
    }
}
