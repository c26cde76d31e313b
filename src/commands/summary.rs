use crate::commands::Out;
use crate::dashboard::{self, Analysis, MetricCard, Notice, Page, Selection};
use crate::{utils, Result};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// The headline figures of one dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    analysis: Analysis,
    notices: Vec<Notice>,
    cards: Vec<MetricCard>,
}

impl Summary {
    pub fn cards(&self) -> &[MetricCard] {
        &self.cards
    }
}

/// Loads `file` the way the dashboard would and reports its metric cards.
///
/// # Errors
/// Returns an error if the file cannot be read or the workbook cannot be processed.
pub async fn summary(
    file: &Path,
    analysis: Analysis,
    outlet: Option<&str>,
) -> Result<Out<Summary>> {
    let bytes = utils::read_bytes(file).await?;
    let selection = Selection {
        outlet: outlet.map(str::to_string),
        ..Selection::default()
    };
    let page = dashboard::build(analysis, &selection, Some(&bytes))?;
    Ok(summarize(&page))
}

fn summarize(page: &Page) -> Out<Summary> {
    let mut message = page.title.to_string();
    for notice in &page.notices {
        let _ = write!(message, "\n  {}", notice.text);
    }
    let cards: Vec<MetricCard> = page.cards().cloned().collect();
    for card in &cards {
        let _ = write!(message, "\n  {}: {}", card.label, card.value);
    }
    Out::new(
        message,
        Summary {
            analysis: page.analysis,
            notices: page.notices.clone(),
            cards,
        },
    )
}
