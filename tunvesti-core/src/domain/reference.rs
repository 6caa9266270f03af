//! Static reference data: sector assignments and dividends.

use serde::{Deserialize, Serialize};

/// Sector given to tickers absent from the sector reference.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Ticker → sector mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorAssignment {
    pub ticker: String,
    pub sector: String,
    pub company: Option<String>,
}

/// Dividend paid per share for a ticker in a calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub ticker: String,
    pub year: i32,
    pub dividend_per_share: f64,
}
