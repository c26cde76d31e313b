use crate::model::{Amount, OutletId};
use crate::Result;
use anyhow::{anyhow, bail};
use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Day zero of the Excel 1900 date system, after accounting for the fictional 1900-02-29.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const TIME_SUFFIXES: &[&str] = &[
    "",
    " %H:%M",
    " %H:%M:%S",
    "T%H:%M:%S",
    " %H:%M:%S%.f",
    "T%H:%M:%S%.f",
];

/// A single value read from a spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Interprets the cell as a calendar date. Text is tried against a handful of common layouts,
    /// numbers are treated as Excel serial dates.
    pub fn to_date(&self) -> Result<NaiveDate> {
        match self {
            Cell::DateTime(dt) => Ok(dt.date()),
            Cell::Int(n) => excel_serial_to_date(*n as f64),
            Cell::Float(f) => excel_serial_to_date(*f),
            Cell::Text(s) => parse_date_text(s),
            Cell::Empty => bail!("the date is empty"),
            Cell::Bool(b) => bail!("'{b}' is not a date"),
        }
    }

    /// Interprets the cell as a number. Empty cells are missing values and yield `None`.
    pub fn to_decimal(&self) -> Result<Option<Decimal>> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Int(n) => Ok(Some(Decimal::from(*n))),
            Cell::Float(f) => Decimal::from_f64(*f)
                .map(Some)
                .ok_or_else(|| anyhow!("'{f}' cannot be represented as a decimal")),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) => Amount::from_str(s)
                .map(|a| Some(a.value()))
                .map_err(|e| anyhow!("'{s}' is not a number: {e}")),
            Cell::Bool(b) => Ok(Some(if *b { Decimal::ONE } else { Decimal::ZERO })),
            Cell::DateTime(dt) => bail!("'{dt}' is a date, not a number"),
        }
    }

    /// Interprets the cell as a label. Empty cells yield `None`.
    pub fn to_label(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string())
    }

    pub fn to_outlet(&self) -> Option<OutletId> {
        self.to_label().map(OutletId::new)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(n) => write!(f, "{n}"),
            // Whole floats are how numeric codes such as outlet numbers usually arrive.
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{}", s.trim()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Int(n) => Cell::Int(*n),
            Data::Float(f) => Cell::Float(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

fn excel_serial_to_date(serial: f64) -> Result<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        bail!("'{serial}' is not a valid spreadsheet date");
    }
    let (y, m, d) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| anyhow!("invalid epoch"))?;
    epoch
        .checked_add_signed(Duration::days(serial.trunc() as i64))
        .ok_or_else(|| anyhow!("'{serial}' is not a valid spreadsheet date"))
}

fn parse_date_text(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for date_format in DATE_FORMATS {
        for suffix in TIME_SUFFIXES {
            let layout = format!("{date_format}{suffix}");
            if suffix.is_empty() {
                if let Ok(date) = NaiveDate::parse_from_str(s, &layout) {
                    return Ok(date);
                }
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, &layout) {
                return Ok(dt.date());
            }
        }
    }
    // RFC 3339 with an offset, e.g. 2024-01-05T10:00:00+02:00
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    bail!("'{s}' is not a recognized date")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_from_text() {
        assert_eq!(Cell::text("2024-01-08").to_date().unwrap(), ymd(2024, 1, 8));
        assert_eq!(Cell::text("2024/01/08").to_date().unwrap(), ymd(2024, 1, 8));
        assert_eq!(Cell::text("01/08/2024").to_date().unwrap(), ymd(2024, 1, 8));
        assert_eq!(Cell::text("08.01.2024").to_date().unwrap(), ymd(2024, 1, 8));
        assert_eq!(
            Cell::text("2024-01-08 13:45:00").to_date().unwrap(),
            ymd(2024, 1, 8)
        );
        assert_eq!(
            Cell::text("2024-01-08T13:45:00").to_date().unwrap(),
            ymd(2024, 1, 8)
        );
    }

    #[test]
    fn test_date_from_serial() {
        assert_eq!(Cell::Int(45292).to_date().unwrap(), ymd(2024, 1, 1));
        assert_eq!(Cell::Float(45292.75).to_date().unwrap(), ymd(2024, 1, 1));
    }

    #[test]
    fn test_date_errors() {
        assert!(Cell::Empty.to_date().is_err());
        assert!(Cell::text("yesterday").to_date().is_err());
        assert!(Cell::Float(-3.0).to_date().is_err());
        assert!(Cell::Bool(true).to_date().is_err());
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(Cell::Int(7).to_decimal().unwrap(), Some(Decimal::from(7)));
        assert_eq!(
            Cell::Float(2.5).to_decimal().unwrap(),
            Some(Decimal::from_str("2.5").unwrap())
        );
        assert_eq!(
            Cell::text("$1,000.25").to_decimal().unwrap(),
            Some(Decimal::from_str("1000.25").unwrap())
        );
        assert_eq!(Cell::Empty.to_decimal().unwrap(), None);
        assert_eq!(Cell::text("  ").to_decimal().unwrap(), None);
        assert!(Cell::text("n/a").to_decimal().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Cell::Float(101.0).to_label().as_deref(), Some("101"));
        assert_eq!(Cell::Int(7).to_label().as_deref(), Some("7"));
        assert_eq!(Cell::text(" Bakery ").to_label().as_deref(), Some("Bakery"));
        assert_eq!(Cell::Empty.to_label(), None);
    }

    #[test]
    fn test_from_calamine() {
        assert_eq!(Cell::from(&Data::Float(1.5)), Cell::Float(1.5));
        assert_eq!(Cell::from(&Data::String("x".into())), Cell::text("x"));
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
        assert_eq!(
            Cell::from(&Data::DateTimeIso("2024-03-01T00:00:00".into())),
            Cell::text("2024-03-01T00:00:00")
        );
    }
}
