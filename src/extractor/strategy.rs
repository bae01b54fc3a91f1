use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::error::ExtractError;

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

/// Trimmed text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// One way of reading a field out of a row.
#[derive(Debug, Clone)]
pub enum FieldStrategy {
    /// Text of the `index`-th `td` of a row holding at least `min_cells` cells.
    TableCell { index: usize, min_cells: usize },
    /// Text of the first element matching the selector.
    Text(Selector),
    /// Text of the first match, or `attr` on it when the text is empty.
    TextOrAttr { selector: Selector, attr: &'static str },
}

impl FieldStrategy {
    pub fn apply(&self, row: ElementRef<'_>) -> Option<String> {
        let value = match self {
            FieldStrategy::TableCell { index, min_cells } => {
                let cells: Vec<_> = row.select(&CELL_SELECTOR).collect();
                if cells.len() < *min_cells {
                    return None;
                }
                cells.get(*index).map(|cell| element_text(*cell))
            }
            FieldStrategy::Text(selector) => row.select(selector).next().map(element_text),
            FieldStrategy::TextOrAttr { selector, attr } => {
                row.select(selector).next().map(|el| {
                    let text = element_text(el);
                    if text.is_empty() {
                        el.value().attr(attr).unwrap_or_default().trim().to_string()
                    } else {
                        text
                    }
                })
            }
        };

        value.filter(|v| !v.is_empty())
    }
}

static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("td").expect("Invalid cell selector")
});

/// Ordered, named strategies for a single field; the first present value wins.
#[derive(Debug, Clone)]
pub struct FieldChain {
    field: &'static str,
    strategies: Vec<(String, FieldStrategy)>,
}

impl FieldChain {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, name: impl Into<String>, strategy: FieldStrategy) -> Self {
        self.strategies.push((name.into(), strategy));
        self
    }

    pub fn then_selector(self, selector: &str) -> Result<Self, ExtractError> {
        let parsed = parse_selector(selector)?;
        Ok(self.then(selector, FieldStrategy::Text(parsed)))
    }

    pub fn first_present(&self, row: ElementRef<'_>) -> Option<String> {
        self.strategies.iter().find_map(|(name, strategy)| {
            let value = strategy.apply(row)?;
            debug!("{} taken from '{}'", self.field, name);
            Some(value)
        })
    }

    /// Date: configured selector, 5th cell, then common class names.
    pub fn date(configured: Option<&str>) -> Result<Self, ExtractError> {
        let mut chain = Self::new("date");
        if let Some(selector) = configured {
            chain = chain.then_selector(selector)?;
        }
        chain = chain.then("5th cell", FieldStrategy::TableCell { index: 4, min_cells: 5 });
        for selector in [".date", ".time", ".created"] {
            chain = chain.then_selector(selector)?;
        }
        Ok(chain.then(
            "[data-date]",
            FieldStrategy::TextOrAttr {
                selector: parse_selector("[data-date]")?,
                attr: "data-date",
            },
        ))
    }

    /// View count: configured selector, 4th cell, then common class names.
    pub fn view_count(configured: Option<&str>) -> Result<Self, ExtractError> {
        let mut chain = Self::new("view count");
        if let Some(selector) = configured {
            chain = chain.then_selector(selector)?;
        }
        chain = chain.then("4th cell", FieldStrategy::TableCell { index: 3, min_cells: 5 });
        for selector in [".views", ".hit", ".count"] {
            chain = chain.then_selector(selector)?;
        }
        Ok(chain.then(
            "[data-views]",
            FieldStrategy::TextOrAttr {
                selector: parse_selector("[data-views]")?,
                attr: "data-views",
            },
        ))
    }
}
