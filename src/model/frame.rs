//! An in-memory table of spreadsheet cells with a parsed date for every row.

use crate::model::{Cell, Columns, OutletId};
use crate::Result;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// The header of the transaction date column.
pub const TR_DATE: &str = "TrDate";

/// Header row, parsed dates and raw cells of one sheet.
///
/// Each row keeps the 1-based row number it had in the sheet, which every error message cites.
/// Only the date column is interpreted on load. Every other column is read on demand through the
/// typed accessors, so a missing column is reported by the first computation that needs it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Columns,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Cell>>,
    sheet_rows: Vec<usize>,
}

impl Frame {
    /// Builds a frame from sheet rows. The first row is the header. Rows in which every cell is
    /// empty are skipped.
    ///
    /// # Errors
    /// - The sheet has no header row.
    /// - The `TrDate` column is absent, or any of its cells is not a date.
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Result<Self>
    where
        R: IntoIterator<Item = Cell>,
    {
        let mut rows = rows.into_iter();
        let columns = match rows.next() {
            Some(header_row) => Columns::new(header_row.into_iter().map(|c| c.to_string())),
            None => bail!("An empty sheet cannot be loaded, a header row is required"),
        };
        let date_ix = columns.index(TR_DATE)?;

        let mut dates = Vec::new();
        let mut data = Vec::new();
        let mut sheet_rows = Vec::new();
        for (row_ix, row) in rows.enumerate() {
            let row: Vec<Cell> = row.into_iter().collect();
            if row.iter().all(Cell::is_empty) {
                continue;
            }
            // one for the header, one for 1-based sheet rows
            let sheet_row = row_ix + 2;
            let date = row
                .get(date_ix)
                .unwrap_or(&Cell::Empty)
                .to_date()
                .with_context(|| format!("Unable to parse {TR_DATE} at sheet row {sheet_row}"))?;
            dates.push(date);
            data.push(row);
            sheet_rows.push(sheet_row);
        }

        Ok(Self {
            columns,
            dates,
            rows: data,
            sheet_rows,
        })
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The transaction date of each row.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The sheet row number of each row.
    pub fn sheet_rows(&self) -> &[usize] {
        &self.sheet_rows
    }

    /// Pairs every cell of `header` with its sheet row number.
    fn column<'a>(&'a self, header: &str) -> Result<impl Iterator<Item = (usize, &'a Cell)> + 'a> {
        let ix = self.columns.index(header)?;
        let cells = self
            .rows
            .iter()
            .map(move |row| row.get(ix).unwrap_or(&Cell::Empty));
        Ok(self.sheet_rows.iter().copied().zip(cells))
    }

    /// Reads `header` as numbers. Empty cells are `None`.
    pub fn decimals(&self, header: &str) -> Result<Vec<Option<Decimal>>> {
        self.column(header)?
            .map(|(sheet_row, cell)| {
                cell.to_decimal()
                    .with_context(|| format!("Invalid {header} at sheet row {sheet_row}"))
            })
            .collect()
    }

    /// Reads `header` as text labels. Empty cells are `None`.
    pub fn labels(&self, header: &str) -> Result<Vec<Option<String>>> {
        Ok(self
            .column(header)?
            .map(|(_, cell)| cell.to_label())
            .collect())
    }

    /// Reads `header` as outlet identifiers. Empty cells are `None`.
    pub fn outlets(&self, header: &str) -> Result<Vec<Option<OutletId>>> {
        Ok(self
            .column(header)?
            .map(|(_, cell)| cell.to_outlet())
            .collect())
    }

    /// Keeps the rows whose entry in `keep` is true.
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows.len());
        let mut flags = keep.iter().copied();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        let mut flags = keep.iter().copied();
        self.dates.retain(|_| flags.next().unwrap_or(false));
        let mut flags = keep.iter().copied();
        self.sheet_rows.retain(|_| flags.next().unwrap_or(false));
    }

    /// Returns a copy containing only the rows whose entry in `keep` is true.
    pub fn filtered(&self, keep: &[bool]) -> Self {
        let mut frame = self.clone();
        frame.retain(keep);
        frame
    }

    /// Replaces every cell of `header` with the result of `f`.
    pub fn map_column<F>(&mut self, header: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Cell) -> Result<Cell>,
    {
        let ix = self.columns.index(header)?;
        for (row, sheet_row) in self.rows.iter_mut().zip(&self.sheet_rows) {
            if row.len() <= ix {
                row.resize(ix + 1, Cell::Empty);
            }
            row[ix] = f(&row[ix])
                .with_context(|| format!("Invalid {header} at sheet row {sheet_row}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn rows() -> Vec<Vec<Cell>> {
        vec![
            vec!["PCNumber".into(), "TrDate".into(), "Sales".into()],
            vec![Cell::Int(1), "2024-01-01".into(), Cell::Float(10.0)],
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::Int(2), "2024-01-02".into()],
        ]
    }

    #[test]
    fn test_from_rows_skips_blank_rows() {
        let frame = Frame::from_rows(rows()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.dates(),
            &[
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
            ]
        );
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let frame = Frame::from_rows(rows()).unwrap();
        let sales = frame.decimals("Sales").unwrap();
        assert_eq!(sales, vec![Some(Decimal::from_str("10").unwrap()), None]);
    }

    #[test]
    fn test_missing_date_column() {
        let err = Frame::from_rows(vec![vec![Cell::text("PCNumber")]]).unwrap_err();
        assert!(err.to_string().contains("TrDate"));
    }

    #[test]
    fn test_unparsable_date_names_row() {
        let rows = vec![
            vec![Cell::text("TrDate")],
            vec![Cell::text("2024-01-01")],
            vec![Cell::text("not a date")],
        ];
        let err = Frame::from_rows(rows).unwrap_err();
        assert!(err.to_string().contains("sheet row 3"), "{err}");
    }

    #[test]
    fn test_empty_sheet() {
        assert!(Frame::from_rows(Vec::<Vec<Cell>>::new()).is_err());
    }

    #[test]
    fn test_missing_column_fails_on_use() {
        let frame = Frame::from_rows(rows()).unwrap();
        let err = frame.decimals("SalesTax").unwrap_err();
        assert!(err.to_string().contains("SalesTax"));
    }

    #[test]
    fn test_retain() {
        let mut frame = Frame::from_rows(rows()).unwrap();
        frame.retain(&[false, true]);
        assert_eq!(frame.len(), 1);
        assert_eq!(
            frame.outlets("PCNumber").unwrap(),
            vec![Some(OutletId::new("2"))]
        );
        assert_eq!(frame.dates().len(), 1);
        assert_eq!(frame.sheet_rows(), &[4]);
    }

    #[test]
    fn test_errors_cite_sheet_rows_after_blank_rows() {
        let rows = vec![
            vec![Cell::text("TrDate"), Cell::text("Sales")],
            vec![Cell::text("2024-01-01"), Cell::Float(1.0)],
            vec![Cell::Empty, Cell::Empty],
            vec![Cell::text("2024-01-02"), Cell::text("lots")],
        ];
        let mut frame = Frame::from_rows(rows).unwrap();
        assert_eq!(frame.sheet_rows(), &[2, 4]);

        let err = frame.decimals("Sales").unwrap_err();
        assert!(err.to_string().contains("sheet row 4"), "{err}");

        frame.retain(&[false, true]);
        let err = frame
            .map_column("Sales", |cell| {
                cell.to_decimal()?;
                Ok(cell.clone())
            })
            .unwrap_err();
        assert!(err.to_string().contains("sheet row 4"), "{err}");
    }

    #[test]
    fn test_map_column() {
        let mut frame = Frame::from_rows(rows()).unwrap();
        frame.map_column("Sales", |_| Ok(Cell::Int(5))).unwrap();
        assert_eq!(
            frame.decimals("Sales").unwrap(),
            vec![Some(Decimal::from(5)), Some(Decimal::from(5))]
        );
    }
}
