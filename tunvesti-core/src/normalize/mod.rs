//! Raw record normalization.
//!
//! Every source has its own normalization function returning a fixed record
//! type. Rows that cannot be admitted are dropped and recorded as a
//! [`RowIssue`]; only a structurally unusable table (missing required
//! columns) is an error.

mod columns;
pub mod date;
pub mod numeric;
mod sources;

pub use date::parse_date;
pub use numeric::{is_placeholder, parse_decimal, parse_non_negative, parse_volume};
pub use sources::{
    normalize_benchmark, normalize_dividends, normalize_historical, normalize_incremental,
    normalize_sectors,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Issues kept verbatim in a report; the rest are only counted.
pub const MAX_REPORTED_ISSUES: usize = 50;

/// One data row of a delimited source, fields as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source (the header is line 1).
    pub line: usize,
    pub fields: Vec<String>,
}

/// A header plus data rows, untyped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Source name used in reports (usually the file name).
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row at an explicit source line.
    pub fn push_row_at(&mut self, line: usize, fields: Vec<String>) {
        self.rows.push(RawRow { line, fields });
    }

    /// Append a row on the line after the previous one.
    pub fn push_row(&mut self, fields: Vec<String>) {
        let line = self.rows.last().map_or(2, |r| r.line + 1);
        self.push_row_at(line, fields);
    }

    /// Convenience constructor for in-memory tables.
    pub fn from_rows<S: AsRef<str>>(name: &str, headers: &[S], rows: &[Vec<S>]) -> Self {
        let mut table = Self::new(name, headers.iter().map(|h| h.as_ref().to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|f| f.as_ref().to_string()).collect());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which kind of source a table was normalized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Historical,
    Incremental,
    Benchmark,
    Sectors,
    Dividends,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Historical => "historical",
            SourceKind::Incremental => "incremental",
            SourceKind::Benchmark => "benchmark",
            SourceKind::Sectors => "sectors",
            SourceKind::Dividends => "dividends",
        };
        f.write_str(name)
    }
}

/// A dropped row and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub source: String,
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.source, self.line, self.reason)
    }
}

/// Outcome of normalizing one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub source: String,
    pub kind: SourceKind,
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped: usize,
    /// First [`MAX_REPORTED_ISSUES`] dropped rows.
    pub issues: Vec<RowIssue>,
    /// Header names present in the source but not read.
    pub ignored_columns: Vec<String>,
    /// Admitted rows whose high is below their low.
    pub inconsistent: usize,
}

impl NormalizeReport {
    fn new(table: &RawTable, kind: SourceKind, ignored_columns: Vec<String>) -> Self {
        Self {
            source: table.name.clone(),
            kind,
            rows_in: table.len(),
            rows_out: 0,
            dropped: 0,
            issues: Vec::new(),
            ignored_columns,
            inconsistent: 0,
        }
    }

    fn drop_row(&mut self, row: &RawRow, reason: impl Into<String>) {
        self.dropped += 1;
        if self.issues.len() < MAX_REPORTED_ISSUES {
            self.issues.push(RowIssue {
                source: self.source.clone(),
                line: row.line,
                reason: reason.into(),
            });
        }
    }
}

/// Normalized records plus the report describing what was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub report: NormalizeReport,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{source_name}: missing required column(s): {}", columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },
}
