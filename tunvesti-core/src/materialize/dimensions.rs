//! Date and stock dimensions by distinct-value extraction.

use super::MaterializeError;
use crate::domain::EnrichedRow;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateDimRow {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    /// ISO week number.
    pub week: u32,
    /// 0 = Monday.
    pub day_of_week: u32,
    pub day_name: String,
    /// Every date in the table had at least one trade.
    pub is_trading_day: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDimRow {
    pub ticker: String,
    pub sector: String,
    pub company: Option<String>,
}

fn epoch_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

fn from_epoch_days(days: i32) -> NaiveDate {
    NaiveDate::default() + Duration::days(i64::from(days))
}

fn required<T>(value: Option<T>, column: &'static str, row: usize) -> Result<T, MaterializeError> {
    value.ok_or(MaterializeError::BadValue { column, row })
}

fn to_u32(value: i32, column: &'static str, row: usize) -> Result<u32, MaterializeError> {
    u32::try_from(value).map_err(|_| MaterializeError::BadValue { column, row })
}

/// One row per distinct date, ascending.
pub fn date_dimension(rows: &[EnrichedRow]) -> Result<Vec<DateDimRow>, MaterializeError> {
    let days: Vec<i32> = rows.iter().map(|r| epoch_days(r.date())).collect();
    let df = DataFrame::new(vec![Column::new("date".into(), days).cast(&DataType::Date)?])?;

    let dims = df
        .lazy()
        .unique_stable(Some(vec!["date".into()]), UniqueKeepStrategy::First)
        .sort(["date"], SortMultipleOptions::default())
        .select([
            col("date").cast(DataType::Int32).alias("epoch_day"),
            col("date").dt().year().cast(DataType::Int32).alias("year"),
            col("date").dt().month().cast(DataType::Int32).alias("month"),
            col("date").dt().quarter().cast(DataType::Int32).alias("quarter"),
            col("date").dt().week().cast(DataType::Int32).alias("week"),
            col("date").dt().weekday().cast(DataType::Int32).alias("weekday"),
        ])
        .collect()?;

    let epoch_day = dims.column("epoch_day")?.i32()?;
    let year = dims.column("year")?.i32()?;
    let month = dims.column("month")?.i32()?;
    let quarter = dims.column("quarter")?.i32()?;
    let week = dims.column("week")?.i32()?;
    let weekday = dims.column("weekday")?.i32()?;

    let mut out = Vec::with_capacity(dims.height());
    for i in 0..dims.height() {
        // polars weekdays run 1 (Monday) to 7 (Sunday)
        let day_of_week = to_u32(required(weekday.get(i), "weekday", i)? - 1, "weekday", i)?;
        let day_name = DAY_NAMES
            .get(day_of_week as usize)
            .ok_or(MaterializeError::BadValue {
                column: "weekday",
                row: i,
            })?;
        out.push(DateDimRow {
            date: from_epoch_days(required(epoch_day.get(i), "date", i)?),
            year: required(year.get(i), "year", i)?,
            month: to_u32(required(month.get(i), "month", i)?, "month", i)?,
            quarter: to_u32(required(quarter.get(i), "quarter", i)?, "quarter", i)?,
            week: to_u32(required(week.get(i), "week", i)?, "week", i)?,
            day_of_week,
            day_name: day_name.to_string(),
            is_trading_day: 1,
        });
    }
    Ok(out)
}

/// One row per distinct ticker, ascending. The first row seen for a ticker
/// supplies its sector and company.
pub fn stock_dimension(rows: &[EnrichedRow]) -> Result<Vec<StockDimRow>, MaterializeError> {
    let tickers: Vec<&str> = rows.iter().map(|r| r.ticker()).collect();
    let sectors: Vec<&str> = rows.iter().map(|r| r.base.sector.as_str()).collect();
    let companies: Vec<Option<&str>> = rows.iter().map(|r| r.base.company.as_deref()).collect();

    let df = df!(
        "ticker" => tickers,
        "sector" => sectors,
        "company" => companies,
    )?;

    let dims = df
        .lazy()
        .unique_stable(Some(vec!["ticker".into()]), UniqueKeepStrategy::First)
        .sort(["ticker"], SortMultipleOptions::default())
        .collect()?;

    let ticker = dims.column("ticker")?.str()?;
    let sector = dims.column("sector")?.str()?;
    let company = dims.column("company")?.str()?;

    let mut out = Vec::with_capacity(dims.height());
    for i in 0..dims.height() {
        out.push(StockDimRow {
            ticker: required(ticker.get(i), "ticker", i)?.to_string(),
            sector: required(sector.get(i), "sector", i)?.to_string(),
            company: company.get(i).map(str::to_string),
        });
    }
    Ok(out)
}
