//! Per-stage summaries.
//!
//! Stages never write to a log sink. They return a `StageSummary` (plus a
//! stage-specific report) and the caller decides how to surface it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Pipeline stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Reconcile,
    Derive,
    Correlate,
    Materialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Reconcile => "reconcile",
            Stage::Derive => "derive",
            Stage::Correlate => "correlate",
            Stage::Materialize => "materialize",
        };
        f.write_str(name)
    }
}

/// Row counts, dropped rows, date range and ticker count for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_tickers: usize,
}

impl StageSummary {
    /// Build a summary from the (ticker, date) keys of a stage's output.
    pub fn from_keys<'a>(
        stage: Stage,
        rows_in: usize,
        dropped: usize,
        keys: impl IntoIterator<Item = (&'a str, NaiveDate)>,
    ) -> Self {
        let mut rows_out = 0;
        let mut tickers = BTreeSet::new();
        let mut first_date: Option<NaiveDate> = None;
        let mut last_date: Option<NaiveDate> = None;

        for (ticker, date) in keys {
            rows_out += 1;
            tickers.insert(ticker);
            first_date = Some(first_date.map_or(date, |d| d.min(date)));
            last_date = Some(last_date.map_or(date, |d| d.max(date)));
        }

        Self {
            stage,
            rows_in,
            rows_out,
            dropped,
            first_date,
            last_date,
            unique_tickers: tickers.len(),
        }
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rows in, {} rows out, {} dropped, {} tickers",
            self.stage, self.rows_in, self.rows_out, self.dropped, self.unique_tickers
        )?;
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            write!(f, ", {first} to {last}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn summary_tracks_range_and_tickers() {
        let keys = [("A", day(5)), ("B", day(2)), ("A", day(9))];
        let summary = StageSummary::from_keys(Stage::Reconcile, 4, 1, keys);

        assert_eq!(summary.rows_out, 3);
        assert_eq!(summary.unique_tickers, 2);
        assert_eq!(summary.first_date, Some(day(2)));
        assert_eq!(summary.last_date, Some(day(9)));
    }

    #[test]
    fn empty_summary_has_no_range() {
        let summary = StageSummary::from_keys(Stage::Derive, 0, 0, std::iter::empty());
        assert_eq!(summary.rows_out, 0);
        assert_eq!(summary.first_date, None);
        assert_eq!(
            summary.to_string(),
            "derive: 0 rows in, 0 rows out, 0 dropped, 0 tickers"
        );
    }
}
