mod dedupe;
mod strategy;

pub use dedupe::dedupe;
pub use strategy::{element_text, FieldChain, FieldStrategy};

use chrono::Local;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::config::SiteProfile;
use crate::error::{ExtractError, RowError};
use crate::models::{NoticeRecord, NO_TITLE};
use crate::parsers::{normalize_view_count, resolve_href};
use strategy::parse_selector;

static PINNED_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("td.top-notice").expect("Invalid pinned cell selector")
});

static CATEGORY_BADGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span.cate").expect("Invalid category badge selector")
});

/// Badge class marking a notice as pinned.
const PINNED_BADGE_CLASS: &str = "cate00";

/// A site profile with every selector parsed once per page.
struct CompiledProfile {
    page_url: Url,
    rows: Selector,
    category: Option<Selector>,
    title: Selector,
    link: Selector,
    date: FieldChain,
    view_count: FieldChain,
    take_count: usize,
}

impl CompiledProfile {
    fn new(profile: &SiteProfile) -> Result<Self, ExtractError> {
        let page_url = Url::parse(&profile.url).map_err(|source| ExtractError::SiteUrl {
            url: profile.url.clone(),
            source,
        })?;

        Ok(Self {
            page_url,
            rows: parse_selector(&profile.selector)?,
            category: profile
                .category_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            title: parse_selector(&profile.title_selector)?,
            link: parse_selector(&profile.link_selector)?,
            date: FieldChain::date(profile.date_selector.as_deref())?,
            view_count: FieldChain::view_count(profile.views_selector.as_deref())?,
            take_count: profile.take_count,
        })
    }
}

/// Extract up to `take_count` notice rows from `markup`. Rows that fail are
/// skipped; only an unusable profile fails the whole page.
pub fn extract(markup: &str, profile: &SiteProfile) -> Result<Vec<NoticeRecord>, ExtractError> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    extract_with_date(markup, profile, &today)
}

/// Same as [`extract`], with the date used for rows that carry none.
pub fn extract_with_date(
    markup: &str,
    profile: &SiteProfile,
    fallback_date: &str,
) -> Result<Vec<NoticeRecord>, ExtractError> {
    let compiled = CompiledProfile::new(profile)?;
    let document = Html::parse_document(markup);

    let rows: Vec<ElementRef<'_>> = document.select(&compiled.rows).collect();
    info!(
        "[{}] matched={} take={} selector='{}'",
        profile.name,
        rows.len(),
        compiled.take_count,
        profile.selector
    );

    let mut records = Vec::new();
    for (index, row) in rows.into_iter().take(compiled.take_count).enumerate() {
        match extract_row(row, &compiled, fallback_date) {
            Ok(record) => records.push(record),
            Err(e) => warn!("[{}] skipping row {}: {}", profile.name, index, e),
        }
    }

    Ok(records)
}

fn extract_row(
    row: ElementRef<'_>,
    profile: &CompiledProfile,
    fallback_date: &str,
) -> Result<NoticeRecord, RowError> {
    let is_pinned = is_pinned(row);

    let category = profile
        .category
        .as_ref()
        .and_then(|selector| row.select(selector).next())
        .map(element_text)
        .unwrap_or_default();

    let title = row
        .select(&profile.title)
        .next()
        .map(element_text)
        .unwrap_or_else(|| NO_TITLE.to_string());

    let link = match row
        .select(&profile.link)
        .next()
        .and_then(|el| el.value().attr("href"))
    {
        Some(href) => resolve_href(href, &profile.page_url).map_err(|source| RowError::Link {
            href: href.to_string(),
            source,
        })?,
        None => String::new(),
    };

    let date = profile
        .date
        .first_present(row)
        .unwrap_or_else(|| fallback_date.to_string());

    let view_count = profile
        .view_count
        .first_present(row)
        .map(|raw| normalize_view_count(&raw))
        .unwrap_or_default();

    Ok(NoticeRecord::new(title, link, date, view_count, category, is_pinned))
}

/// A row is pinned when it has a top-notice cell or a `cate00` category badge.
fn is_pinned(row: ElementRef<'_>) -> bool {
    let pinned_by_cell = row.select(&PINNED_CELL_SELECTOR).next().is_some();
    let pinned_by_badge = row
        .select(&CATEGORY_BADGE_SELECTOR)
        .any(|badge| badge.value().classes().any(|class| class == PINNED_BADGE_CLASS));

    pinned_by_cell || pinned_by_badge
}
