//! Turns pages into HTML.
//!
//! The markup is deliberately plain: a dark stylesheet, forms that submit back to the server and
//! one `<div>` per chart that plotly.js fills in on load.

use crate::dashboard::{Analysis, Level, MetricCard, Notice, Page, Section, Selector};
use crate::Result;
use std::fmt::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
body { background: #0e1117; color: #fafafa; font-family: sans-serif; margin: 0; }
main { max-width: 1200px; margin: 0 auto; padding: 1rem 2rem; }
nav { display: flex; gap: 1rem; align-items: center; padding: 0.75rem 2rem; background: #262730; }
nav a { color: #fafafa; text-decoration: none; }
nav a.active { font-weight: bold; border-bottom: 2px solid #FF5733; }
nav form { margin-left: auto; }
.notice { padding: 0.75rem 1rem; border-radius: 4px; margin: 0.5rem 0; }
.notice.info { background: #172d43; }
.notice.warning { background: #3d3a14; }
.notice.error { background: #3e1c1c; }
.cards { display: flex; flex-wrap: wrap; gap: 1rem; }
.card { background: #262730; padding: 0.75rem 1rem; border-radius: 4px; min-width: 10rem; }
.card .label { font-size: 0.85rem; color: #a3a8b8; }
.card .value { font-size: 1.6rem; }
.chart { width: 100%; min-height: 450px; }
form.inline { display: inline-flex; gap: 0.5rem; align-items: center; margin: 0.5rem 0; }
"#;

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Keeps `</script>` inside JSON from closing the surrounding script element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn document(title: &str, head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n{head}</head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

fn notice(out: &mut String, notice: &Notice) {
    let class = match notice.level {
        Level::Info => "info",
        Level::Warning => "warning",
        Level::Error => "error",
    };
    let _ = writeln!(
        out,
        "<div class=\"notice {class}\">{}</div>",
        escape(&notice.text)
    );
}

/// The access code form. `notice` is shown above the form when present.
pub fn login_page(notice_text: Option<&str>) -> String {
    let mut body = String::from("<main>\n<h1>Insights Dashboard</h1>\n");
    if let Some(text) = notice_text {
        notice(&mut body, &Notice::error(text));
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\" class=\"inline\">\n\
         <label for=\"code\">Enter access code</label>\n\
         <input type=\"password\" id=\"code\" name=\"code\" autofocus>\n\
         <button type=\"submit\">Login</button>\n</form>\n</main>\n",
    );
    document("Insights Dashboard", "", &body)
}

fn navigation(current: Analysis) -> String {
    let mut nav = String::from("<nav>\n");
    for analysis in Analysis::ALL {
        let class = if analysis == current { " class=\"active\"" } else { "" };
        let _ = writeln!(
            nav,
            "<a href=\"/dashboard?analysis={analysis}\"{class}>{}</a>",
            escape(analysis.label())
        );
    }
    nav.push_str(
        "<form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\n\
         </nav>\n",
    );
    nav
}

fn upload_form(analysis: Analysis) -> String {
    format!(
        "<form method=\"post\" action=\"/upload?analysis={analysis}\" \
         enctype=\"multipart/form-data\" class=\"inline\">\n\
         <label for=\"file\">Upload Excel file</label>\n\
         <input type=\"file\" id=\"file\" name=\"file\" accept=\".xlsx\">\n\
         <button type=\"submit\">Upload</button>\n</form>\n"
    )
}

/// The selectors submit together, carrying the analysis along so the page stays put.
fn selectors(out: &mut String, analysis: Analysis, selectors: &[Selector]) {
    if selectors.is_empty() {
        return;
    }
    out.push_str("<form method=\"get\" action=\"/dashboard\" class=\"inline\">\n");
    let _ = writeln!(
        out,
        "<input type=\"hidden\" name=\"analysis\" value=\"{analysis}\">"
    );
    for selector in selectors {
        let _ = writeln!(
            out,
            "<label for=\"{name}\">{}</label>\n\
             <select id=\"{name}\" name=\"{name}\" onchange=\"this.form.submit()\">",
            escape(selector.label),
            name = selector.name
        );
        for (value, label) in &selector.options {
            let selected = if *value == selector.selected { " selected" } else { "" };
            let _ = writeln!(
                out,
                "<option value=\"{}\"{selected}>{}</option>",
                escape(value),
                escape(label)
            );
        }
        out.push_str("</select>\n");
    }
    out.push_str("<noscript><button type=\"submit\">Apply</button></noscript>\n</form>\n");
}

fn cards(out: &mut String, cards: &[MetricCard]) {
    if cards.is_empty() {
        return;
    }
    out.push_str("<div class=\"cards\">\n");
    for card in cards {
        let _ = writeln!(
            out,
            "<div class=\"card\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
            escape(&card.label),
            escape(&card.value)
        );
    }
    out.push_str("</div>\n");
}

fn section(out: &mut String, section: &Section, next_chart: &mut usize) -> Result<()> {
    let _ = writeln!(out, "<section>\n<h2>{}</h2>", escape(&section.heading));
    cards(out, &section.cards);
    for chart in &section.charts {
        let id = format!("chart-{next_chart}");
        *next_chart += 1;
        let _ = writeln!(
            out,
            "<div class=\"chart\" id=\"{id}\"></div>\n<script>\n\
             (function () {{ var fig = {}; \
             Plotly.newPlot(\"{id}\", fig.data, fig.layout, {{responsive: true}}); }})();\n\
             </script>",
            script_safe(&chart.to_json()?)
        );
    }
    out.push_str("</section>\n");
    Ok(())
}

/// A full dashboard: navigation, upload form, notices, selectors, then each section.
pub fn dashboard_page(page: &Page) -> Result<String> {
    let mut body = navigation(page.analysis);
    body.push_str("<main>\n");
    let _ = writeln!(body, "<h1>{}</h1>", escape(page.title));
    body.push_str(&upload_form(page.analysis));
    for n in &page.notices {
        notice(&mut body, n);
    }
    selectors(&mut body, page.analysis, &page.selectors);
    let mut next_chart = 0;
    for s in &page.sections {
        section(&mut body, s, &mut next_chart)?;
    }
    body.push_str("</main>\n");
    let head = format!("<script src=\"{PLOTLY_CDN}\" charset=\"utf-8\"></script>\n");
    Ok(document(page.title, &head, &body))
}

/// The dashboard chrome around an error panel, used when the pipeline fails.
pub fn error_page(analysis: Analysis, message: &str) -> String {
    let mut body = navigation(analysis);
    body.push_str("<main>\n");
    let _ = writeln!(body, "<h1>{}</h1>", escape(analysis.title()));
    body.push_str(&upload_form(analysis));
    notice(&mut body, &Notice::error(message));
    body.push_str("</main>\n");
    document(analysis.title(), "", &body)
}
