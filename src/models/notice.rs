use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parsers::{normalize_link, normalize_title};

// NewType pattern for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// md5 over the normalized title directly followed by the normalized link.
    pub fn of(title: &str, link: &str) -> Self {
        let input = format!("{}{}", normalize_title(title), normalize_link(link));
        Fingerprint(format!("{:x}", md5::compute(input.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One item extracted from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRecord {
    pub title: String,
    pub link: String,
    pub date: String,
    pub view_count: String,
    pub category: String,
    pub is_pinned: bool,
    pub fingerprint: Fingerprint,
}

impl NoticeRecord {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        date: impl Into<String>,
        view_count: impl Into<String>,
        category: impl Into<String>,
        is_pinned: bool,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        let fingerprint = Fingerprint::of(&title, &link);

        Self {
            title,
            link,
            date: date.into(),
            view_count: view_count.into(),
            category: category.into(),
            is_pinned,
            fingerprint,
        }
    }

    /// The (normalized title, normalized link) pair records are deduplicated on.
    pub fn dedupe_key(&self) -> (String, String) {
        (normalize_title(&self.title), normalize_link(&self.link))
    }
}
