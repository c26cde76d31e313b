use crate::loader::{self, SheetSelector};
use crate::model::{Cell, Frame, OutletId};
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

pub const PC_NUMBER: &str = "PCNumber";
pub const GROSS_SALES: &str = "GrossSales";
pub const CUSTOMER_COUNT: &str = "CustomerCount";
pub const SALES_TAX: &str = "SalesTax";
pub const DISCOUNT_REFUND: &str = "DiscountRefund";

/// Transactions from the sales export: one row per outlet and day with gross sales, customer
/// count, tax and discounts.
///
/// Every row has a strictly positive `GrossSales`; other rows are dropped on load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesTable {
    frame: Frame,
}

impl SalesTable {
    /// Reads the first sheet of an xlsx workbook.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::from_rows(loader::read_sheet(bytes, SheetSelector::First)?)
    }

    /// Builds the table from sheet rows (header first) and drops rows whose gross sales are not
    /// positive, including rows where it is missing.
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Result<Self>
    where
        R: IntoIterator<Item = Cell>,
    {
        let mut frame = Frame::from_rows(rows)?;
        let keep: Vec<bool> = frame
            .decimals(GROSS_SALES)?
            .into_iter()
            .map(|gross| gross.is_some_and(|g| g > Decimal::ZERO))
            .collect();
        let before = frame.len();
        frame.retain(&keep);
        debug!(
            "Loaded {} sales rows, dropped {} without positive {GROSS_SALES}",
            frame.len(),
            before - frame.len()
        );
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

    pub fn gross_sales(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(GROSS_SALES)
    }

    pub fn customer_counts(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(CUSTOMER_COUNT)
    }

    pub fn sales_tax(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(SALES_TAX)
    }

    pub fn discount_refund(&self) -> Result<Vec<Option<Decimal>>> {
        self.frame.decimals(DISCOUNT_REFUND)
    }
}

/// Removes missing and repeated ids, keeping first-appearance order.
pub(crate) fn distinct(ids: Vec<Option<OutletId>>) -> Vec<OutletId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .flatten()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
