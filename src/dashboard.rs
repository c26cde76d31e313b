//! Composes the dashboard pages.
//!
//! [`build`] takes the analysis type the operator picked, their outlet and period selections and
//! the bytes of the uploaded workbook, and runs the whole pipeline from scratch: load, aggregate,
//! bin and chart. The result is a [`Page`] that the display surface renders without further
//! computation.

use crate::chart::{Chart, Series, ACCENT_COLOR, CURRENCY_TEXT};
use crate::metrics::{
    self, category_breakdown, product_mix, top_products, OutletProductMetrics, ProductOverview,
    SalesMetrics,
};
use crate::model::{Amount, Millions, OutletId, ProductTable, SalesTable};
use crate::trend::{self, Period};
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const TOP_PRODUCTS: usize = 10;
const NOT_AVAILABLE: &str = "n/a";
pub const UPLOAD_PROMPT: &str = "Please upload an Excel file to view the dashboard.";

/// The two dashboards the operator can choose between.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    #[default]
    Sales,
    Products,
}

serde_plain::derive_display_from_serialize!(Analysis);
serde_plain::derive_fromstr_from_deserialize!(Analysis);

impl Analysis {
    pub const ALL: [Analysis; 2] = [Analysis::Sales, Analysis::Products];

    pub fn label(&self) -> &'static str {
        match self {
            Analysis::Sales => "Sales Data Analysis",
            Analysis::Products => "Products Data Analysis",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Analysis::Sales => "Sales Insights Dashboard",
            Analysis::Products => "Products Insights Dashboard",
        }
    }
}

/// The operator's current choices. An outlet that does not exist in the upload is ignored in
/// favor of the first outlet.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub outlet: Option<String>,
    #[serde(default)]
    pub period: Period,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A message shown above the page content.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

/// A labelled figure.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
}

impl MetricCard {
    fn new(label: &str, value: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// A drop-down. `name` is the query parameter it sets.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Selector {
    pub name: &'static str,
    pub label: &'static str,
    /// `(value, label)` pairs.
    pub options: Vec<(String, String)>,
    pub selected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub cards: Vec<MetricCard>,
    pub charts: Vec<Chart>,
}

impl Section {
    fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            cards: Vec::new(),
            charts: Vec::new(),
        }
    }

    fn card(mut self, card: MetricCard) -> Self {
        self.cards.push(card);
        self
    }

    fn chart(mut self, chart: Chart) -> Self {
        self.charts.push(chart);
        self
    }
}

/// Everything the display surface needs to draw one dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub analysis: Analysis,
    pub title: &'static str,
    pub notices: Vec<Notice>,
    pub selectors: Vec<Selector>,
    pub sections: Vec<Section>,
}

impl Page {
    fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            title: analysis.title(),
            notices: Vec::new(),
            selectors: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// The page shown before a workbook has been uploaded.
    pub fn awaiting_upload(analysis: Analysis) -> Self {
        let mut page = Self::new(analysis);
        page.notices.push(Notice::info(UPLOAD_PROMPT));
        page
    }

    /// Every chart on the page, in display order.
    pub fn charts(&self) -> impl Iterator<Item = &Chart> {
        self.sections.iter().flat_map(|s| s.charts.iter())
    }

    pub fn cards(&self) -> impl Iterator<Item = &MetricCard> {
        self.sections.iter().flat_map(|s| s.cards.iter())
    }
}

/// Runs the pipeline for `analysis` over the uploaded workbook. Without an upload the page only
/// carries a prompt.
///
/// # Errors
/// Load failures (unreadable workbook, missing sheet, missing or unparsable `TrDate`) and missing
/// columns are returned to the caller for display.
pub fn build(analysis: Analysis, selection: &Selection, upload: Option<&[u8]>) -> Result<Page> {
    let Some(bytes) = upload else {
        return Ok(Page::awaiting_upload(analysis));
    };
    debug!("Building the {analysis} page from {} bytes", bytes.len());
    match analysis {
        Analysis::Sales => sales_page(&SalesTable::load(bytes)?, selection),
        Analysis::Products => products_page(&ProductTable::load(bytes)?, selection),
    }
}

fn choose_outlet(outlets: &[OutletId], selection: &Selection) -> Option<OutletId> {
    selection
        .outlet
        .as_deref()
        .and_then(|wanted| outlets.iter().find(|o| o.as_str() == wanted))
        .or_else(|| outlets.first())
        .cloned()
}

fn outlet_selector(
    label: &'static str,
    outlets: &[OutletId],
    selected: Option<&OutletId>,
) -> Selector {
    Selector {
        name: "outlet",
        label,
        options: outlets
            .iter()
            .map(|o| (o.to_string(), o.to_string()))
            .collect(),
        selected: selected.map(|o| o.to_string()).unwrap_or_default(),
    }
}

fn period_selector(selected: Period) -> Selector {
    Selector {
        name: "period",
        label: "Choose Sales Trend Period",
        options: Period::ALL
            .iter()
            .map(|p| (p.to_string(), p.label().to_string()))
            .collect(),
        selected: selected.to_string(),
    }
}

/// Builds the sales dashboard from an already loaded table.
pub fn sales_page(table: &SalesTable, selection: &Selection) -> Result<Page> {
    let mut page = Page::new(Analysis::Sales);
    let outlets = table.outlets()?;
    let outlet = choose_outlet(&outlets, selection);
    let period = selection.period;

    if table.is_empty() {
        page.notices
            .push(Notice::warning("The uploaded sheet has no rows with positive gross sales."));
    }
    page.selectors.push(period_selector(period));
    page.selectors.push(outlet_selector(
        "Select Outlet for Trend Analysis",
        &outlets,
        outlet.as_ref(),
    ));

    let m = SalesMetrics::compute(table)?;
    page.sections.push(
        Section::new("Key Performance Metrics")
            .card(MetricCard::new("Outlets Count", m.outlet_count))
            .card(MetricCard::new("Total Sales (Millions)", millions(m.total_sales_millions)))
            .card(MetricCard::new("Total Customers", m.total_customers))
            .card(MetricCard::new(
                "Average Sales",
                m.average_sales
                    .map(|a| Amount::new(a).to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ))
            .card(MetricCard::new("Total Tax (Millions)", millions(m.total_tax_millions)))
            .card(MetricCard::new(
                "Total Discount (Millions)",
                millions(m.total_discount_millions),
            )),
    );

    let trend_chart = match &outlet {
        Some(outlet) => {
            let rows = table.for_outlet(outlet)?;
            let points = trend::bin(rows.dates(), &rows.gross_sales()?, period)?;
            Chart::line(
                &format!("{} Sales Trend for Outlet {outlet}", period.label()),
                "Date",
                "Total Sales",
                Series::from_points(&points),
            )
        }
        None => Chart::line(
            &format!("{} Sales Trend", period.label()),
            "Date",
            "Total Sales",
            Series::default(),
        ),
    };
    page.sections
        .push(Section::new("Sales Trend Analysis for Selected Outlet").chart(trend_chart));

    let ids = table.outlet_ids()?;
    let gross = table.gross_sales()?;
    let by_outlet = metrics::sum_by_outlet(&ids, &gross)?.in_millions();
    let outlet_chart = Chart::bar(
        "Total Sales by Outlet (in Millions)",
        "Outlet/PC Name",
        "Total Sales (Millions)",
        Series::from_totals(&by_outlet),
    )
    .with_color(ACCENT_COLOR);
    page.sections
        .push(Section::new("Sales Breakdown by Outlet").chart(outlet_chart));

    let customers = metrics::sum_by_outlet(&ids, &table.customer_counts()?)?;
    let tax = metrics::sum_by_outlet(&ids, &table.sales_tax()?)?.in_millions();
    let discount = metrics::sum_by_outlet(&ids, &table.discount_refund()?)?.in_millions();
    let average = metrics::mean_by_outlet(&ids, &gross)?;
    page.sections.push(
        Section::new("Store-Specific Metrics")
            .chart(Chart::bar(
                "Total Customers Visited per Store",
                "Outlet/PC Name",
                "Customers Visited",
                Series::from_totals(&customers),
            ))
            .chart(Chart::bar(
                "Total Tax Paid per Store (Millions)",
                "Outlet/PC Name",
                "Total Tax (Millions)",
                Series::from_totals(&tax),
            ))
            .chart(Chart::bar(
                "Total Discount per Store (Millions)",
                "Outlet/PC Name",
                "Total Discount (Millions)",
                Series::from_totals(&discount),
            ))
            .chart(Chart::bar(
                "Average Sales per Store (in Dollars)",
                "Outlet/PC Name",
                "Average Sales",
                Series::from_totals(&average),
            )),
    );

    Ok(page)
}

/// Builds the products dashboard from an already loaded table.
pub fn products_page(table: &ProductTable, selection: &Selection) -> Result<Page> {
    let mut page = Page::new(Analysis::Products);
    let outlets = table.outlets()?;
    let outlet = choose_outlet(&outlets, selection);

    if table.is_empty() {
        page.notices
            .push(Notice::warning("The uploaded sheet has no rows."));
    }

    let overview = ProductOverview::compute(table)?;
    page.sections.push(
        Section::new("Overall Metrics for All Outlets")
            .card(MetricCard::new(
                "Total Revenue Generated",
                Amount::new(overview.total_revenue),
            ))
            .card(MetricCard::new("Total Quantity Sold", overview.total_quantity)),
    );

    page.selectors
        .push(outlet_selector("Select Outlet for Analysis", &outlets, outlet.as_ref()));
    let rows = match &outlet {
        Some(outlet) => table.for_outlet(outlet)?,
        None => table.clone(),
    };
    let outlet_label = outlet.as_ref().map(|o| o.to_string()).unwrap_or_default();

    let m = OutletProductMetrics::compute(&rows)?;
    page.sections.push(
        Section::new("Key Performance Metrics for Selected Outlet")
            .card(MetricCard::new("Total Sales", Amount::new(m.total_sales)))
            .card(MetricCard::new("Total Quantity Sold", m.total_quantity))
            .card(MetricCard::new(
                "Top Category",
                m.top_category.as_deref().unwrap_or(NOT_AVAILABLE),
            )),
    );

    let sales = rows.sales()?;
    let days = trend::daily(rows.dates(), &sales)?;
    let day_chart = Chart::line(
        &format!("Day-wise Revenue Trend for Outlet {outlet_label}"),
        "Date",
        "Revenue",
        Series::from_points(&days),
    );
    page.sections
        .push(Section::new("Day-wise Revenue Trend Analysis").chart(day_chart));

    let top = top_products(&rows, TOP_PRODUCTS)?;
    let top_chart = Chart::horizontal_bar(
        "Top 10 Selling Products by Quantity Sold",
        "Quantity Sold",
        "Product",
        vec![Series::from_totals(&top)],
    );
    page.sections
        .push(Section::new("Top 10 Selling Products by Quantity Sold").chart(top_chart));

    let mix = product_mix(&rows)?;
    let mix_chart = Chart::pie("Product Mix Ratios by Category", Series::from_totals(&mix));
    page.sections
        .push(Section::new("Product Mix Ratios by Category").chart(mix_chart));

    let cumulative_chart = Chart::line(
        "Cumulative Sales Over Time",
        "Date",
        "Cumulative Sales",
        Series::from_points(&trend::cumulative(&days)),
    );
    page.sections
        .push(Section::new("Cumulative Sales Over Time").chart(cumulative_chart));

    // One trace per category, colored separately by plotly.
    let mut by_category: BTreeMap<String, (Vec<String>, Vec<Decimal>)> = BTreeMap::new();
    for ((category, subcategory), value) in category_breakdown(&rows)?.entries() {
        let (labels, values) = by_category.entry(category.clone()).or_default();
        labels.push(subcategory.clone());
        values.push(*value);
    }
    let series = by_category
        .into_iter()
        .map(|(category, (labels, values))| Series::new(labels, values).named(category))
        .collect();
    let breakdown_chart = Chart::horizontal_bar(
        "Sales by Category and Subcategory",
        "Total Sales",
        "Subcategory",
        series,
    )
    .with_text_template(CURRENCY_TEXT);
    page.sections
        .push(Section::new("Sales by Category and Subcategory").chart(breakdown_chart));

    if outlets.len() > 1 {
        let by_outlet = metrics::sum_by_outlet(&table.outlet_ids()?, &table.sales()?)?;
        let outlet_chart = Chart::bar(
            "Total Sales by Outlet",
            "Outlet (PCNumber)",
            "Total Sales",
            Series::from_totals(&by_outlet),
        )
        .with_color(ACCENT_COLOR)
        .with_text_template(CURRENCY_TEXT);
        page.sections
            .push(Section::new("Total Sales by Outlet").chart(outlet_chart));
    }

    Ok(page)
}

fn millions(value: Decimal) -> Millions {
    Amount::new(value * Decimal::from(1_000_000)).millions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{product_rows, products_workbook, sales_rows, sales_workbook};

    fn card<'a>(page: &'a Page, label: &str) -> &'a str {
        page.cards()
            .find(|c| c.label == label)
            .map(|c| c.value.as_str())
            .unwrap()
    }

    #[test]
    fn test_no_upload_prompts() {
        for analysis in Analysis::ALL {
            let page = build(analysis, &Selection::default(), None).unwrap();
            assert_eq!(page.notices, vec![Notice::info(UPLOAD_PROMPT)]);
            assert!(page.sections.is_empty());
            assert_eq!(page.title, analysis.title());
        }
    }

    #[test]
    fn test_unreadable_upload_is_an_error() {
        assert!(build(Analysis::Sales, &Selection::default(), Some(b"nope")).is_err());
        assert!(build(Analysis::Products, &Selection::default(), Some(b"nope")).is_err());
    }

    #[test]
    fn test_sales_page_cards() {
        let table = SalesTable::from_rows(sales_rows()).unwrap();
        let page = sales_page(&table, &Selection::default()).unwrap();
        assert_eq!(card(&page, "Outlets Count"), "3");
        assert_eq!(card(&page, "Total Sales (Millions)"), "$4.00M");
        assert_eq!(card(&page, "Total Customers"), "125");
        assert_eq!(card(&page, "Average Sales"), "$666,766.67");
        assert_eq!(card(&page, "Total Tax (Millions)"), "$0.32M");
        assert_eq!(card(&page, "Total Discount (Millions)"), "$0.05M");
        assert!(page.notices.is_empty());
    }

    #[test]
    fn test_build_from_sales_workbook() {
        let bytes = sales_workbook();
        let page = build(Analysis::Sales, &Selection::default(), Some(&bytes)).unwrap();
        assert_eq!(page.title, Analysis::Sales.title());
        assert_eq!(card(&page, "Outlets Count"), "3");
        assert_eq!(card(&page, "Total Sales (Millions)"), "$4.00M");
        assert_eq!(card(&page, "Total Customers"), "125");
        assert_eq!(card(&page, "Average Sales"), "$666,766.67");
    }

    #[test]
    fn test_build_from_products_workbook() {
        let bytes = products_workbook();
        let page = build(Analysis::Products, &Selection::default(), Some(&bytes)).unwrap();
        assert_eq!(card(&page, "Total Revenue Generated"), "$24.25");
        assert_eq!(card(&page, "Total Sales"), "$22.25");
        assert_eq!(card(&page, "Top Category"), "Beverages");
    }

    #[test]
    fn test_sales_page_charts() {
        let table = SalesTable::from_rows(sales_rows()).unwrap();
        let selection = Selection {
            outlet: Some("101".to_string()),
            period: Period::Weekly,
        };
        let page = sales_page(&table, &selection).unwrap();
        let titles: Vec<&str> = page.charts().map(|c| c.title()).collect();
        assert_eq!(
            titles,
            vec![
                "Weekly Sales Trend for Outlet 101",
                "Total Sales by Outlet (in Millions)",
                "Total Customers Visited per Store",
                "Total Tax Paid per Store (Millions)",
                "Total Discount per Store (Millions)",
                "Average Sales per Store (in Dollars)",
            ]
        );
        assert!(page.charts().all(|c| !c.is_empty()));
        let outlet = &page.selectors[1];
        assert_eq!(outlet.selected, "101");
        assert_eq!(outlet.options.len(), 3);
        assert_eq!(page.selectors[0].selected, "weekly");
    }

    #[test]
    fn test_unknown_outlet_falls_back_to_first() {
        let table = SalesTable::from_rows(sales_rows()).unwrap();
        let selection = Selection {
            outlet: Some("999".to_string()),
            period: Period::Monthly,
        };
        let page = sales_page(&table, &selection).unwrap();
        assert_eq!(page.selectors[1].selected, "102");
        assert_eq!(
            page.charts().next().unwrap().title(),
            "Monthly Sales Trend for Outlet 102"
        );
    }

    #[test]
    fn test_empty_sales_table_warns_and_renders_blank_charts() {
        let rows = vec![
            sales_rows().remove(0),
            vec![
                crate::model::Cell::Int(1),
                crate::model::Cell::text("2024-01-01"),
                crate::model::Cell::Int(-5),
            ],
        ];
        let table = SalesTable::from_rows(rows).unwrap();
        let page = sales_page(&table, &Selection::default()).unwrap();
        assert_eq!(page.notices.len(), 1);
        assert_eq!(page.notices[0].level, Level::Warning);
        assert_eq!(card(&page, "Average Sales"), NOT_AVAILABLE);
        assert!(page.charts().all(|c| c.is_empty()));
    }

    #[test]
    fn test_products_page() {
        let table = ProductTable::from_rows(product_rows()).unwrap();
        let page = products_page(&table, &Selection::default()).unwrap();
        assert_eq!(card(&page, "Total Revenue Generated"), "$24.25");
        assert_eq!(card(&page, "Total Sales"), "$22.25");
        assert_eq!(card(&page, "Top Category"), "Beverages");
        let titles: Vec<&str> = page.charts().map(|c| c.title()).collect();
        assert_eq!(
            titles,
            vec![
                "Day-wise Revenue Trend for Outlet 7",
                "Top 10 Selling Products by Quantity Sold",
                "Product Mix Ratios by Category",
                "Cumulative Sales Over Time",
                "Sales by Category and Subcategory",
                "Total Sales by Outlet",
            ]
        );
    }

    #[test]
    fn test_single_outlet_skips_outlet_comparison() {
        let table = ProductTable::from_rows(product_rows()).unwrap();
        let seven = table.for_outlet(&OutletId::new("7")).unwrap();
        let page = products_page(&seven, &Selection::default()).unwrap();
        assert!(page.charts().all(|c| c.title() != "Total Sales by Outlet"));
    }

    #[test]
    fn test_category_chart_has_trace_per_category() {
        let table = ProductTable::from_rows(product_rows()).unwrap();
        let page = products_page(&table, &Selection::default()).unwrap();
        let chart = page
            .charts()
            .find(|c| c.title() == "Sales by Category and Subcategory")
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&chart.to_json().unwrap()).unwrap();
        let names: Vec<&str> = v["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Bakery", "Beverages"]);
    }

    #[test]
    fn test_analysis_strings() {
        assert_eq!(Analysis::Products.to_string(), "products");
        assert_eq!("sales".parse::<Analysis>().unwrap(), Analysis::Sales);
        assert!("inventory".parse::<Analysis>().is_err());
    }
}
