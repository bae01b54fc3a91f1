pub mod link;
pub mod views;

pub use link::*;
pub use views::*;

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_title(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
