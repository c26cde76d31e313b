//! Declarative chart descriptions.
//!
//! A [`Chart`] serializes to a plotly.js figure (`{"data": [...], "layout": {...}}`), which the
//! page hands to `Plotly.newPlot` in the browser. Charts built from empty results carry no traces
//! and a "No data" annotation.

use crate::metrics::GroupTotals;
use crate::trend::TrendPoint;
use crate::Result;
use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

pub const ACCENT_COLOR: &str = "#FF5733";
/// Currency with thousands separators and two decimals, e.g. `$1,234.50`.
pub const CURRENCY_TEXT: &str = "$%{text:,.2f}";
pub const PLAIN_TEXT: &str = "%{text}";

const BAR_WIDTH: f64 = 0.3;
const LINE_WIDTH: f64 = 3.0;
const MARKER_SIZE: f64 = 8.0;
const BACKGROUND: &str = "#111111";
const FOREGROUND: &str = "#f2f5fa";
const GRID: &str = "#283442";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Scatter,
    Bar,
    Pie,
}

/// One labelled series of values, the input for every chart constructor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub values: Vec<Decimal>,
}

impl Series {
    pub fn new(labels: Vec<String>, values: Vec<Decimal>) -> Self {
        Self {
            name: None,
            labels,
            values,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn from_totals<K: Display>(totals: &GroupTotals<K>) -> Self {
        Self::new(
            totals.keys().map(|k| k.to_string()).collect(),
            totals.values().collect(),
        )
    }

    pub fn from_points(points: &[TrendPoint]) -> Self {
        Self::new(
            points
                .iter()
                .map(|p| p.date.format("%Y-%m-%d").to_string())
                .collect(),
            points.iter().map(|p| p.value).collect(),
        )
    }

    fn numbers(&self) -> Vec<Value> {
        self.values.iter().map(|v| number(*v)).collect()
    }

    /// The values rounded to two decimals, for bar labels.
    fn rounded(&self) -> Vec<Value> {
        self.values.iter().map(|v| number(v.round_dp(2))).collect()
    }

    fn strings(&self) -> Vec<Value> {
        self.labels.iter().cloned().map(Value::String).collect()
    }
}

fn number(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orientation: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    x: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    y: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    values: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    text: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    texttemplate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    textposition: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker: Option<Marker>,
}

impl Trace {
    fn new(kind: TraceKind) -> Self {
        Self {
            kind,
            name: None,
            mode: None,
            orientation: None,
            x: Vec::new(),
            y: Vec::new(),
            labels: Vec::new(),
            values: Vec::new(),
            text: Vec::new(),
            texttemplate: None,
            textposition: None,
            width: None,
            line: None,
            marker: None,
        }
    }

    fn has_data(&self) -> bool {
        !(self.x.is_empty() && self.y.is_empty() && self.values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Line {
    width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Title {
    text: String,
}

impl Title {
    fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<Title>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    axis_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categoryorder: Option<&'static str>,
    gridcolor: &'static str,
}

impl Axis {
    fn titled(title: &str) -> Self {
        Self {
            title: Some(Title::new(title)),
            axis_type: None,
            categoryorder: None,
            gridcolor: GRID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Font {
    color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Annotation {
    text: &'static str,
    showarrow: bool,
    xref: &'static str,
    yref: &'static str,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Layout {
    title: Title,
    #[serde(skip_serializing_if = "Option::is_none")]
    xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    barmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    annotations: Vec<Annotation>,
    paper_bgcolor: &'static str,
    plot_bgcolor: &'static str,
    font: Font,
}

impl Layout {
    fn new(title: &str, xaxis: Option<Axis>, yaxis: Option<Axis>) -> Self {
        Self {
            title: Title::new(title),
            xaxis,
            yaxis,
            barmode: None,
            annotations: Vec::new(),
            paper_bgcolor: BACKGROUND,
            plot_bgcolor: BACKGROUND,
            font: Font { color: FOREGROUND },
        }
    }
}

/// A chart ready to be drawn by plotly.js.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    data: Vec<Trace>,
    layout: Layout,
}

impl Chart {
    fn new(traces: Vec<Trace>, layout: Layout) -> Self {
        let data: Vec<Trace> = traces.into_iter().filter(Trace::has_data).collect();
        let mut layout = layout;
        if data.is_empty() {
            layout.annotations.push(Annotation {
                text: "No data",
                showarrow: false,
                xref: "paper",
                yref: "paper",
                x: 0.5,
                y: 0.5,
            });
        }
        Self { data, layout }
    }

    /// A line over time, e.g. a sales trend.
    pub fn line(title: &str, x_title: &str, y_title: &str, series: Series) -> Self {
        let mut trace = Trace::new(TraceKind::Scatter);
        trace.mode = Some("lines");
        trace.x = series.strings();
        trace.y = series.numbers();
        trace.name = series.name;
        trace.line = Some(Line { width: LINE_WIDTH });
        trace.marker = Some(Marker {
            color: None,
            size: Some(MARKER_SIZE),
        });
        Self::new(
            vec![trace],
            Layout::new(
                title,
                Some(Axis::titled(x_title)),
                Some(Axis::titled(y_title)),
            ),
        )
    }

    /// Vertical bars over a categorical x-axis, labelled with their values rounded to two
    /// decimals. Labels stay numeric so a text template can format them.
    pub fn bar(title: &str, x_title: &str, y_title: &str, series: Series) -> Self {
        let mut trace = Trace::new(TraceKind::Bar);
        trace.text = series.rounded();
        trace.x = series.strings();
        trace.y = series.numbers();
        trace.name = series.name;
        trace.width = Some(BAR_WIDTH);
        trace.textposition = Some("outside");
        let mut xaxis = Axis::titled(x_title);
        xaxis.axis_type = Some("category");
        Self::new(
            vec![trace],
            Layout::new(title, Some(xaxis), Some(Axis::titled(y_title))),
        )
    }

    /// Horizontal bars, one trace per series, stacked, with the largest total at the top.
    pub fn horizontal_bar(title: &str, x_title: &str, y_title: &str, series: Vec<Series>) -> Self {
        let traces = series
            .into_iter()
            .map(|s| {
                let mut trace = Trace::new(TraceKind::Bar);
                trace.orientation = Some("h");
                trace.text = s.numbers();
                trace.x = s.numbers();
                trace.y = s.strings();
                trace.name = s.name;
                trace.texttemplate = Some(PLAIN_TEXT.to_string());
                trace.textposition = Some("outside");
                trace
            })
            .collect();
        let mut yaxis = Axis::titled(y_title);
        yaxis.categoryorder = Some("total ascending");
        let mut layout = Layout::new(title, Some(Axis::titled(x_title)), Some(yaxis));
        layout.barmode = Some("relative");
        Self::new(traces, layout)
    }

    /// Slices sized by value.
    pub fn pie(title: &str, series: Series) -> Self {
        let mut trace = Trace::new(TraceKind::Pie);
        trace.labels = series.strings();
        trace.values = series.numbers();
        trace.name = series.name;
        Self::new(vec![trace], Layout::new(title, None, None))
    }

    /// Sets the bar or marker color of every trace.
    pub fn with_color(mut self, color: &str) -> Self {
        for trace in &mut self.data {
            let marker = trace.marker.get_or_insert_with(Marker::default);
            marker.color = Some(color.to_string());
        }
        self
    }

    /// Sets the plotly `texttemplate` of every trace, e.g. [`CURRENCY_TEXT`].
    pub fn with_text_template(mut self, template: &str) -> Self {
        for trace in &mut self.data {
            trace.texttemplate = Some(template.to_string());
        }
        self
    }

    pub fn title(&self) -> &str {
        &self.layout.title.text
    }

    /// True when there was nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Unable to serialize chart")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn to_value(chart: &Chart) -> Value {
        serde_json::from_str(&chart.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_line() {
        let points = vec![
            TrendPoint::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), dec("100")),
            TrendPoint::new(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(), dec("200.5")),
        ];
        let chart = Chart::line(
            "Weekly Sales Trend",
            "Date",
            "Total Sales",
            Series::from_points(&points),
        );
        let v = to_value(&chart);
        assert_eq!(v["data"][0]["type"], "scatter");
        assert_eq!(v["data"][0]["x"], json!(["2024-01-01", "2024-01-08"]));
        assert_eq!(v["data"][0]["y"], json!([100.0, 200.5]));
        assert_eq!(v["data"][0]["line"]["width"], json!(3.0));
        assert_eq!(v["layout"]["title"]["text"], "Weekly Sales Trend");
        assert_eq!(v["layout"]["xaxis"]["title"]["text"], "Date");
        assert!(v["layout"].get("annotations").is_none());
    }

    #[test]
    fn test_bar_styling() {
        let series = Series::new(
            vec!["101".into(), "102".into()],
            vec![dec("0.456"), dec("2")],
        );
        let chart = Chart::bar("By Outlet", "Outlet", "Sales", series).with_color(ACCENT_COLOR);
        let v = to_value(&chart);
        assert_eq!(v["data"][0]["type"], "bar");
        assert_eq!(v["data"][0]["width"], json!(0.3));
        assert_eq!(v["data"][0]["text"], json!([0.46, 2.0]));
        assert_eq!(v["data"][0]["textposition"], "outside");
        assert_eq!(v["data"][0]["marker"]["color"], ACCENT_COLOR);
        assert_eq!(v["layout"]["xaxis"]["type"], "category");
    }

    #[test]
    fn test_horizontal_bar() {
        let a = Series::new(vec!["Bread".into()], vec![dec("6")]).named("Bakery");
        let b = Series::new(vec!["Coffee".into()], vec![dec("12")]).named("Beverages");
        let chart = Chart::horizontal_bar("By Category", "Sales", "Subcategory", vec![a, b])
            .with_text_template(CURRENCY_TEXT);
        let v = to_value(&chart);
        assert_eq!(v["data"].as_array().unwrap().len(), 2);
        assert_eq!(v["data"][0]["orientation"], "h");
        assert_eq!(v["data"][1]["name"], "Beverages");
        assert_eq!(v["data"][1]["texttemplate"], CURRENCY_TEXT);
        assert_eq!(v["layout"]["yaxis"]["categoryorder"], "total ascending");
    }

    #[test]
    fn test_pie() {
        let series = Series::new(
            vec!["Bakery".into(), "Beverages".into()],
            vec![dec("46"), dec("54")],
        );
        let v = to_value(&Chart::pie("Product Mix", series));
        assert_eq!(v["data"][0]["type"], "pie");
        assert_eq!(v["data"][0]["labels"], json!(["Bakery", "Beverages"]));
        assert!(v["layout"].get("xaxis").is_none());
    }

    #[test]
    fn test_empty_chart_is_blank() {
        let chart = Chart::bar("Nothing", "x", "y", Series::default()).with_color(ACCENT_COLOR);
        assert!(chart.is_empty());
        let v = to_value(&chart);
        assert_eq!(v["data"], json!([]));
        assert_eq!(v["layout"]["annotations"][0]["text"], "No data");
        assert_eq!(chart.title(), "Nothing");
    }
}
