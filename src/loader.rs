//! Reads uploaded workbooks into rows of [`Cell`]s.

use crate::model::Cell;
use crate::Result;
use anyhow::{anyhow, Context};
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use std::fmt::{Display, Formatter};
use std::io::Cursor;
use tracing::debug;

/// The sheet name the products export is expected to use.
pub const PRODUCTS_SHEET: &str = "Sheet1";

/// Which worksheet of a workbook to read.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SheetSelector<'a> {
    /// The first worksheet, whatever its name.
    First,
    /// The worksheet with exactly this name.
    Named(&'a str),
}

impl Display for SheetSelector<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSelector::First => write!(f, "the first sheet"),
            SheetSelector::Named(name) => write!(f, "sheet '{name}'"),
        }
    }
}

/// Opens an `.xlsx` workbook held in memory and returns every row of the selected sheet.
///
/// # Errors
/// - The bytes are not a readable xlsx workbook.
/// - The selected sheet does not exist.
pub fn read_sheet(bytes: &[u8], sheet: SheetSelector<'_>) -> Result<Vec<Vec<Cell>>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .context("Unable to open the uploaded file as an xlsx workbook")?;

    let range: Range<Data> = match sheet {
        SheetSelector::First => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("The workbook does not contain any sheets"))?
            .context("Unable to read the first sheet")?,
        SheetSelector::Named(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("Unable to read sheet '{name}'"))?,
    };

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|r| r.iter().map(Cell::from).collect())
        .collect();
    debug!("Read {} rows from {sheet}", rows.len());
    Ok(rows)
}
