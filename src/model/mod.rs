//! Types that represent the core data model: spreadsheet cells, the tables loaded from an upload
//! and the values they hold.
mod amount;
mod cell;
mod columns;
mod frame;
mod outlet;
mod products;
mod sales;

pub use amount::{to_millions, Amount, AmountError, Millions};
pub use cell::Cell;
pub use columns::{Columns, MissingColumn};
pub use frame::{Frame, TR_DATE};
pub use outlet::OutletId;
pub use products::{ProductTable, CATEGORY, CHECK_QUANTITY, RECIPE_NAME, SALES, SUBCATEGORY};
pub use sales::{
    SalesTable, CUSTOMER_COUNT, DISCOUNT_REFUND, GROSS_SALES, PC_NUMBER, SALES_TAX,
};
