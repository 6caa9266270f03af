//! Reference lookups joined onto reconciled prices.
//!
//! Reference tables resolve duplicate keys first-wins. A duplicate that
//! disagrees with the kept entry is counted as a conflict.

use crate::domain::{BenchmarkRecord, DividendRecord, SectorAssignment, UNCLASSIFIED};
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Ticker → (sector, company).
#[derive(Debug, Default)]
pub(crate) struct SectorIndex {
    by_ticker: BTreeMap<String, (String, Option<String>)>,
    pub conflicts: usize,
}

impl SectorIndex {
    pub fn build(assignments: &[SectorAssignment]) -> Self {
        let mut index = Self::default();
        for a in assignments {
            match index.by_ticker.entry(a.ticker.to_uppercase()) {
                Entry::Vacant(slot) => {
                    slot.insert((a.sector.clone(), a.company.clone()));
                }
                Entry::Occupied(slot) => {
                    if slot.get().0 != a.sector {
                        index.conflicts += 1;
                    }
                }
            }
        }
        index
    }

    /// Sector and company for a ticker; unknown tickers are unclassified.
    pub fn lookup(&self, ticker: &str) -> (String, Option<String>, bool) {
        match self.by_ticker.get(ticker) {
            Some((sector, company)) => (sector.clone(), company.clone(), true),
            None => (UNCLASSIFIED.to_string(), None, false),
        }
    }
}

/// (ticker, year) → dividend per share.
#[derive(Debug, Default)]
pub(crate) struct DividendIndex {
    by_key: BTreeMap<(String, i32), f64>,
    pub conflicts: usize,
}

impl DividendIndex {
    pub fn build(records: &[DividendRecord]) -> Self {
        let mut index = Self::default();
        for d in records {
            match index.by_key.entry((d.ticker.to_uppercase(), d.year)) {
                Entry::Vacant(slot) => {
                    slot.insert(d.dividend_per_share);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != d.dividend_per_share {
                        index.conflicts += 1;
                    }
                }
            }
        }
        index
    }

    pub fn lookup(&self, ticker: &str, year: i32) -> Option<f64> {
        self.by_key.get(&(ticker.to_string(), year)).copied()
    }
}

/// Date → benchmark record, already deduplicated.
pub(crate) type BenchmarkIndex = BTreeMap<NaiveDate, BenchmarkRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(ticker: &str, sector: &str) -> SectorAssignment {
        SectorAssignment {
            ticker: ticker.into(),
            sector: sector.into(),
            company: None,
        }
    }

    #[test]
    fn first_sector_wins_and_conflicts_are_counted() {
        let index = SectorIndex::build(&[
            sector("BIAT", "Banks"),
            sector("biat", "Insurance"),
            sector("BIAT", "Banks"),
        ]);
        assert_eq!(index.lookup("BIAT").0, "Banks");
        assert_eq!(index.conflicts, 1);
    }

    #[test]
    fn unknown_ticker_is_unclassified() {
        let index = SectorIndex::build(&[]);
        let (sector, company, matched) = index.lookup("NOPE");
        assert_eq!(sector, UNCLASSIFIED);
        assert_eq!(company, None);
        assert!(!matched);
    }

    #[test]
    fn dividends_key_on_ticker_and_year() {
        let index = DividendIndex::build(&[
            DividendRecord {
                ticker: "sah".into(),
                year: 2022,
                dividend_per_share: 0.3,
            },
            DividendRecord {
                ticker: "SAH".into(),
                year: 2022,
                dividend_per_share: 0.4,
            },
        ]);
        assert_eq!(index.lookup("SAH", 2022), Some(0.3));
        assert_eq!(index.lookup("SAH", 2023), None);
        assert_eq!(index.conflicts, 1);
    }
}
