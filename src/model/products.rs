use crate::loader::{self, SheetSelector, PRODUCTS_SHEET};
use crate::model::sales::{distinct, PC_NUMBER};
use crate::model::{Cell, Frame, OutletId};
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const SALES: &str = "Sales";
pub const CATEGORY: &str = "Category";
pub const SUBCATEGORY: &str = "Subcategory";
pub const RECIPE_NAME: &str = "RecipeName";
pub const CHECK_QUANTITY: &str = "CheckQuantity";

/// Line items from the products export: outlet, date, product, category, subcategory, sales and
/// quantity.
///
/// `Sales` holds magnitudes: refunds recorded as negative amounts are folded into their absolute
/// value on load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductTable {
    frame: Frame,
}

impl ProductTable {
    /// Reads the sheet named `Sheet1` of an xlsx workbook.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::from_rows(loader::read_sheet(bytes, SheetSelector::Named(PRODUCTS_SHEET))?)
    }

    /// Builds the table from sheet rows (header first) and replaces `Sales` with its absolute
    /// value.
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Result<Self>
    where
        R: IntoIterator<Item = Cell>,
    {
        let mut frame = Frame::from_rows(rows)?;
        frame.map_column(SALES, absolute)?;
        Ok(Self { frame })
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.frame.dates()
    }

    pub fn outlet_ids(&self) -> Result<Vec<Option<OutletId>>> {
        self.frame.outlets(PC_NUMBER)
    }

    /// Distinct outlets in order of first appearance.
    pub fn outlets(&self) -> Result<Vec<OutletId>> {
        Ok(distinct(self.outlet_ids()?))
    }

    /// The rows belonging to `outlet`.
    pub fn for_outlet(&self, outlet: &OutletId) -> Result<Self> {
        let keep: Vec<bool> = self
            .outlet_ids()?
            .iter()
            .map(|id| id.as_ref() == Some(outlet))
            .collect();
        Ok(Self {
            frame: self.frame.filtered(&keep),
        })
    }

    pub fn sales(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(SALES)
    }

    pub fn quantities(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(CHECK_QUANTITY)
    }

    pub fn categories(&self) -> Result<Vec<Option<String>>> {
        self.frame.labels(CATEGORY)
    }

    pub fn subcategories(&self) -> Result<Vec<Option<String>>> {
        self.frame.labels(SUBCATEGORY)
    }

    pub fn product_names(&self) -> Result<Vec<Option<String>>> {
        self.frame.labels(RECIPE_NAME)
    }
}

fn absolute(cell: &Cell) -> Result<Cell> {
    Ok(match cell {
        Cell::Int(n) => Cell::Int(n.saturating_abs()),
        Cell::Float(f) => Cell::Float(f.abs()),
        other => match other.to_decimal()? {
            None => Cell::Empty,
            Some(value) => Cell::Text(value.abs().to_string()),
        },
    })
}
