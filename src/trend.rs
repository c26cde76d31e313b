//! Buckets rows by calendar period and sums a value per bucket.
//!
//! Everything here is a pure function of its inputs: binning the same rows twice returns the same
//! sequence, and nothing is cached between calls.

use crate::Result;
use anyhow::ensure;
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The calendar period used to bucket a sales trend.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

serde_plain::derive_display_from_serialize!(Period);
serde_plain::derive_fromstr_from_deserialize!(Period);

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Weekly,
        Period::Monthly,
        Period::Quarterly,
        Period::Yearly,
    ];

    /// A capitalized label for selectors and chart titles.
    pub fn label(&self) -> &'static str {
        match self {
            Period::Weekly => "Weekly",
            Period::Monthly => "Monthly",
            Period::Quarterly => "Quarterly",
            Period::Yearly => "Yearly",
        }
    }

    /// The first day of the period containing `date`. Weeks start on Monday.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Period::Monthly => date.with_day(1).unwrap_or(date),
            Period::Quarterly => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Period::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }
}

/// One point of a trend line: the start of a bucket (or a raw day) and its value.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

impl TrendPoint {
    pub fn new(date: NaiveDate, value: Decimal) -> Self {
        Self { date, value }
    }
}

fn sum_by_date<F>(
    dates: &[NaiveDate],
    values: &[Option<Decimal>],
    key: F,
) -> Result<Vec<TrendPoint>>
where
    F: Fn(NaiveDate) -> NaiveDate,
{
    ensure!(
        dates.len() == values.len(),
        "Cannot bin {} values against {} dates",
        values.len(),
        dates.len()
    );
    let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values) {
        *buckets.entry(key(*date)).or_default() += value.unwrap_or_default();
    }
    Ok(buckets
        .into_iter()
        .map(|(date, value)| TrendPoint::new(date, value))
        .collect())
}

/// Sums `values` per `period`, ordered by bucket start ascending.
pub fn bin(
    dates: &[NaiveDate],
    values: &[Option<Decimal>],
    period: Period,
) -> Result<Vec<TrendPoint>> {
    sum_by_date(dates, values, |d| period.bucket_start(d))
}

/// Sums `values` per calendar day, ordered ascending.
pub fn daily(dates: &[NaiveDate], values: &[Option<Decimal>]) -> Result<Vec<TrendPoint>> {
    sum_by_date(dates, values, |d| d)
}

/// Running total over `points`, which must already be in ascending date order.
pub fn cumulative(points: &[TrendPoint]) -> Vec<TrendPoint> {
    points
        .iter()
        .scan(Decimal::ZERO, |total, point| {
            *total += point.value;
            Some(TrendPoint::new(point.date, *total))
        })
        .collect()
}
