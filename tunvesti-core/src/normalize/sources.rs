//! One normalization function per source.

use super::columns::{ColumnSpec, Layout};
use super::date::parse_date;
use super::numeric::{parse_decimal, parse_non_negative, parse_volume};
use super::{NormalizeError, NormalizeReport, Normalized, RawRow, RawTable, SourceKind};
use crate::domain::{BenchmarkRecord, DividendRecord, PriceRecord, SectorAssignment};
use chrono::NaiveDate;

const TICKER: &[&str] = &["ticker", "symbol"];
const DATE: &[&str] = &["date"];
const OPEN: &[&str] = &["open"];
const HIGH: &[&str] = &["high"];
const LOW: &[&str] = &["low"];
const VOLUME: &[&str] = &["volume"];

const HISTORICAL: [ColumnSpec; 7] = [
    ColumnSpec::required("ticker", TICKER),
    ColumnSpec::required("date", DATE),
    ColumnSpec::required("open", OPEN),
    ColumnSpec::required("high", HIGH),
    ColumnSpec::required("low", LOW),
    ColumnSpec::required("close", &["close"]),
    ColumnSpec::required("volume", VOLUME),
];

const INCREMENTAL: [ColumnSpec; 9] = [
    ColumnSpec::required("ticker", TICKER),
    ColumnSpec::required("date", DATE),
    ColumnSpec::optional("open", OPEN),
    ColumnSpec::optional("high", HIGH),
    ColumnSpec::optional("low", LOW),
    ColumnSpec::required("close", &["close"]),
    ColumnSpec::optional("volume", VOLUME),
    ColumnSpec::optional("volatility", &["volatility"]),
    ColumnSpec::optional("market_cap", &["market_cap", "market_cap_m"]),
];

const BENCHMARK: [ColumnSpec; 7] = [
    ColumnSpec::required("date", DATE),
    ColumnSpec::required("close", &["close", "price", "tunindex_close"]),
    ColumnSpec::optional("open", OPEN),
    ColumnSpec::optional("high", HIGH),
    ColumnSpec::optional("low", LOW),
    ColumnSpec::optional("volume", &["vol.", "vol", "volume"]),
    ColumnSpec::optional("change_pct", &["change %", "change%", "change_pct"]),
];

const SECTORS: [ColumnSpec; 3] = [
    ColumnSpec::required("ticker", TICKER),
    ColumnSpec::required("sector", &["sector"]),
    ColumnSpec::optional("company", &["company_name", "company name", "company"]),
];

const DIVIDENDS: [ColumnSpec; 3] = [
    ColumnSpec::required("ticker", TICKER),
    ColumnSpec::required("year", &["year"]),
    ColumnSpec::required(
        "dividend_per_share",
        &["dividend_per_share", "dividend", "dps"],
    ),
];

/// Normalize the bulk historical load. All OHLCV columns must exist.
pub fn normalize_historical(table: &RawTable) -> Result<Normalized<PriceRecord>, NormalizeError> {
    normalize_prices(table, SourceKind::Historical, &HISTORICAL)
}

/// Normalize one scraped daily batch. Only ticker, date and close are
/// required; `volatility` and `market_cap` pass through when present.
pub fn normalize_incremental(table: &RawTable) -> Result<Normalized<PriceRecord>, NormalizeError> {
    normalize_prices(table, SourceKind::Incremental, &INCREMENTAL)
}

/// Normalize a benchmark (index) table. A ticker column, if any, is ignored.
pub fn normalize_benchmark(
    table: &RawTable,
) -> Result<Normalized<BenchmarkRecord>, NormalizeError> {
    let (layout, mut report) = prepare(table, SourceKind::Benchmark, &BENCHMARK)?;
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let date = match require_date(&layout, row) {
            Ok(d) => d,
            Err(reason) => {
                report.drop_row(row, reason);
                continue;
            }
        };
        let close = match require_close(&layout, row) {
            Ok(c) => c,
            Err(reason) => {
                report.drop_row(row, reason);
                continue;
            }
        };

        records.push(BenchmarkRecord {
            date,
            close,
            open: optional(&layout, row, "open"),
            high: optional(&layout, row, "high"),
            low: optional(&layout, row, "low"),
            volume: layout
                .get(row, "volume")
                .and_then(parse_abbreviated_volume),
            change_pct: layout.get(row, "change_pct").and_then(parse_decimal),
        });
    }

    report.rows_out = records.len();
    Ok(Normalized { records, report })
}

/// Normalize the sector reference. Tickers are uppercased.
pub fn normalize_sectors(
    table: &RawTable,
) -> Result<Normalized<SectorAssignment>, NormalizeError> {
    let (layout, mut report) = prepare(table, SourceKind::Sectors, &SECTORS)?;
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let Some(ticker) = layout.get(row, "ticker").map(canonical_ticker) else {
            report.drop_row(row, "missing ticker");
            continue;
        };
        let Some(sector) = layout.get(row, "sector") else {
            report.drop_row(row, "missing sector");
            continue;
        };
        records.push(SectorAssignment {
            ticker,
            sector: sector.to_string(),
            company: layout.get(row, "company").map(str::to_string),
        });
    }

    report.rows_out = records.len();
    Ok(Normalized { records, report })
}

/// Normalize the dividend reference. Years written as floats (`2021.0`)
/// are accepted.
pub fn normalize_dividends(
    table: &RawTable,
) -> Result<Normalized<DividendRecord>, NormalizeError> {
    let (layout, mut report) = prepare(table, SourceKind::Dividends, &DIVIDENDS)?;
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let Some(ticker) = layout.get(row, "ticker").map(canonical_ticker) else {
            report.drop_row(row, "missing ticker");
            continue;
        };
        let Some(year) = layout.get(row, "year").and_then(parse_year) else {
            report.drop_row(row, "unparseable year");
            continue;
        };
        let Some(dividend_per_share) = layout
            .get(row, "dividend_per_share")
            .and_then(parse_non_negative)
        else {
            report.drop_row(row, "unparseable dividend_per_share");
            continue;
        };
        records.push(DividendRecord {
            ticker,
            year,
            dividend_per_share,
        });
    }

    report.rows_out = records.len();
    Ok(Normalized { records, report })
}

fn normalize_prices(
    table: &RawTable,
    kind: SourceKind,
    specs: &[ColumnSpec],
) -> Result<Normalized<PriceRecord>, NormalizeError> {
    let (layout, mut report) = prepare(table, kind, specs)?;
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        match price_row(&layout, row) {
            Ok(record) => {
                if !record.is_consistent() {
                    report.inconsistent += 1;
                }
                records.push(record);
            }
            Err(reason) => report.drop_row(row, reason),
        }
    }

    report.rows_out = records.len();
    Ok(Normalized { records, report })
}

fn price_row(layout: &Layout, row: &RawRow) -> Result<PriceRecord, String> {
    let ticker = layout
        .get(row, "ticker")
        .map(canonical_ticker)
        .ok_or_else(|| "missing ticker".to_string())?;
    let date = require_date(layout, row)?;
    let close = require_close(layout, row)?;

    Ok(PriceRecord {
        ticker,
        date,
        open: optional(layout, row, "open"),
        high: optional(layout, row, "high"),
        low: optional(layout, row, "low"),
        close,
        volume: layout.get(row, "volume").and_then(parse_volume),
        volatility: optional(layout, row, "volatility"),
        market_cap: optional(layout, row, "market_cap"),
    })
}

fn prepare(
    table: &RawTable,
    kind: SourceKind,
    specs: &[ColumnSpec],
) -> Result<(Layout, NormalizeReport), NormalizeError> {
    let layout = Layout::resolve(&table.headers, specs).map_err(|columns| {
        NormalizeError::MissingColumns {
            source_name: table.name.clone(),
            columns,
        }
    })?;
    let report = NormalizeReport::new(table, kind, layout.ignored.clone());
    Ok((layout, report))
}

fn require_date(layout: &Layout, row: &RawRow) -> Result<NaiveDate, String> {
    let raw = layout
        .get(row, "date")
        .ok_or_else(|| "missing date".to_string())?;
    parse_date(raw).ok_or_else(|| format!("unparseable date '{raw}'"))
}

fn require_close(layout: &Layout, row: &RawRow) -> Result<f64, String> {
    let raw = layout
        .get(row, "close")
        .ok_or_else(|| "missing close".to_string())?;
    let close = parse_decimal(raw).ok_or_else(|| format!("unparseable close '{raw}'"))?;
    if close < 0.0 {
        return Err(format!("negative close '{raw}'"));
    }
    Ok(close)
}

fn optional(layout: &Layout, row: &RawRow, field: &str) -> Option<f64> {
    layout.get(row, field).and_then(parse_non_negative)
}

pub(crate) fn canonical_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn parse_year(raw: &str) -> Option<i32> {
    let value = parse_decimal(raw)?;
    if value.fract() != 0.0 || !(1900.0..=2200.0).contains(&value) {
        return None;
    }
    Some(value as i32)
}

/// Index volumes are often published abbreviated (`1.25M`, `830K`).
fn parse_abbreviated_volume(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (digits, scale) = match trimmed.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&trimmed[..trimmed.len() - 1], 1e3),
        Some('M') => (&trimmed[..trimmed.len() - 1], 1e6),
        Some('B') => (&trimmed[..trimmed.len() - 1], 1e9),
        _ => (trimmed, 1.0),
    };
    parse_non_negative(digits).map(|v| v * scale)
}
