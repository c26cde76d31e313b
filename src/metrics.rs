//! Summary statistics and group-by aggregations over the loaded tables.
//!
//! Missing values are skipped by sums and excluded from the denominator of means. Rounding to two
//! decimal places uses banker's rounding.

use crate::model::{to_millions, OutletId, ProductTable, SalesTable};
use crate::Result;
use anyhow::ensure;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Sum of the present values.
pub fn sum(values: &[Option<Decimal>]) -> Decimal {
    values.iter().flatten().sum()
}

/// Mean of the present values, `None` when there are none.
pub fn mean(values: &[Option<Decimal>]) -> Option<Decimal> {
    let present: Vec<Decimal> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<Decimal>() / Decimal::from(present.len()))
}

/// Ordered `(key, value)` pairs produced by a group-by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTotals<K> {
    entries: Vec<(K, Decimal)>,
}

impl<K> Default for GroupTotals<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K> GroupTotals<K> {
    pub fn entries(&self) -> &[(K, Decimal)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.entries.iter().map(|(_, v)| *v)
    }

    /// Expresses every value in millions, rounded to two decimals.
    pub fn in_millions(self) -> Self {
        self.map_values(to_millions)
    }

    fn map_values(self, f: impl Fn(Decimal) -> Decimal) -> Self {
        Self {
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }
}

impl<K> FromIterator<(K, Decimal)> for GroupTotals<K> {
    fn from_iter<T: IntoIterator<Item = (K, Decimal)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Sums `values` per key, ordered by key. Rows without a key are ignored; a key whose values are
/// all missing sums to zero.
pub fn sum_by<K: Ord + Clone>(
    keys: &[Option<K>],
    values: &[Option<Decimal>],
) -> Result<GroupTotals<K>> {
    ensure!(
        keys.len() == values.len(),
        "Cannot group {} values by {} keys",
        values.len(),
        keys.len()
    );
    let mut groups: BTreeMap<K, Decimal> = BTreeMap::new();
    for (key, value) in keys.iter().zip(values) {
        if let Some(key) = key {
            *groups.entry(key.clone()).or_default() += value.unwrap_or_default();
        }
    }
    Ok(groups.into_iter().collect())
}

/// Averages `values` per key, ordered by key. Keys without any present value are left out.
pub fn mean_by<K: Ord + Clone>(
    keys: &[Option<K>],
    values: &[Option<Decimal>],
) -> Result<GroupTotals<K>> {
    ensure!(
        keys.len() == values.len(),
        "Cannot group {} values by {} keys",
        values.len(),
        keys.len()
    );
    let mut groups: BTreeMap<K, (Decimal, usize)> = BTreeMap::new();
    for (key, value) in keys.iter().zip(values) {
        if let (Some(key), Some(value)) = (key, value) {
            let (total, count) = groups.entry(key.clone()).or_default();
            *total += *value;
            *count += 1;
        }
    }
    Ok(groups
        .into_iter()
        .map(|(k, (total, count))| (k, total / Decimal::from(count)))
        .collect())
}

pub fn sum_by_outlet(
    outlets: &[Option<OutletId>],
    values: &[Option<Decimal>],
) -> Result<GroupTotals<OutletId>> {
    sum_by(outlets, values)
}

pub fn mean_by_outlet(
    outlets: &[Option<OutletId>],
    values: &[Option<Decimal>],
) -> Result<GroupTotals<OutletId>> {
    mean_by(outlets, values)
}

/// Headline figures of the sales view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesMetrics {
    pub outlet_count: usize,
    /// Sum of gross sales in millions, two decimals.
    pub total_sales_millions: Decimal,
    pub total_customers: i64,
    /// Mean gross sales per row, two decimals. `None` for an empty table.
    pub average_sales: Option<Decimal>,
    pub total_tax_millions: Decimal,
    pub total_discount_millions: Decimal,
}

impl SalesMetrics {
    pub fn compute(table: &SalesTable) -> Result<Self> {
        let outlets: HashSet<OutletId> = table.outlet_ids()?.into_iter().flatten().collect();
        let gross = table.gross_sales()?;
        Ok(Self {
            outlet_count: outlets.len(),
            total_sales_millions: to_millions(sum(&gross)),
            total_customers: whole(sum(&table.customer_counts()?)),
            average_sales: mean(&gross).map(|m| m.round_dp(2)),
            total_tax_millions: to_millions(sum(&table.sales_tax()?)),
            total_discount_millions: to_millions(sum(&table.discount_refund()?)),
        })
    }
}

/// All-outlet figures of the products view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductOverview {
    pub total_revenue: Decimal,
    pub total_quantity: Decimal,
}

impl ProductOverview {
    pub fn compute(table: &ProductTable) -> Result<Self> {
        Ok(Self {
            total_revenue: sum(&table.sales()?),
            total_quantity: sum(&table.quantities()?).normalize(),
        })
    }
}

/// Figures for the outlet selected in the products view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutletProductMetrics {
    pub total_sales: Decimal,
    pub total_quantity: Decimal,
    /// The category with the highest summed sales. Ties go to the name that sorts first.
    pub top_category: Option<String>,
}

impl OutletProductMetrics {
    pub fn compute(table: &ProductTable) -> Result<Self> {
        let by_category = sum_by(&table.categories()?, &table.sales()?)?;
        Ok(Self {
            total_sales: sum(&table.sales()?),
            total_quantity: sum(&table.quantities()?).normalize(),
            top_category: top_key(&by_category),
        })
    }
}

/// The key with the largest value; the first such key in key order wins ties.
pub fn top_key<K: Clone>(totals: &GroupTotals<K>) -> Option<K> {
    let mut best: Option<&(K, Decimal)> = None;
    for entry in totals.entries() {
        match best {
            Some((_, value)) if entry.1 <= *value => {}
            _ => best = Some(entry),
        }
    }
    best.map(|(k, _)| k.clone())
}

/// The `limit` products with the highest summed quantity, largest first. Ties are ordered by
/// product name.
pub fn top_products(table: &ProductTable, limit: usize) -> Result<GroupTotals<String>> {
    let totals = sum_by(&table.product_names()?, &table.quantities()?)?;
    let mut entries = totals.entries;
    // BTreeMap order already sorts names, and the sort is stable.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    Ok(entries
        .into_iter()
        .map(|(k, v)| (k, v.normalize()))
        .collect())
}

/// Each category's share of the table's total sales, in percent, ordered by category. Empty when
/// total sales are zero.
pub fn product_mix(table: &ProductTable) -> Result<GroupTotals<String>> {
    let sales = table.sales()?;
    let total = sum(&sales);
    if total.is_zero() {
        return Ok(GroupTotals::default());
    }
    let by_category = sum_by(&table.categories()?, &sales)?;
    Ok(by_category.map_values(|v| v * ONE_HUNDRED / total))
}

/// Summed sales per `(category, subcategory)`, ordered by category then subcategory.
pub fn category_breakdown(table: &ProductTable) -> Result<GroupTotals<(String, String)>> {
    let keys: Vec<Option<(String, String)>> = table
        .categories()?
        .into_iter()
        .zip(table.subcategories()?)
        .map(|(c, s)| c.zip(s))
        .collect();
    sum_by(&keys, &table.sales()?)
}

fn whole(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or_default()
}
