use once_cell::sync::Lazy;
use regex::Regex;

static VIEWS_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(views?|hits?|조회수|조회)\b[:：]?\s*")
        .expect("Invalid views label regex")
});

static NON_NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9,.]")
        .expect("Invalid non-numeric regex")
});

static DIGIT_RUN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9][0-9,.]*")
        .expect("Invalid digit run regex")
});

/// Reduce a free-text view counter ("Views 3,921", "조회수 3921회") to a plain
/// integer string. Returns an empty string when no digits are present.
pub fn normalize_view_count(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let unlabeled = VIEWS_LABEL_REGEX.replace_all(text, "");
    let numeric = NON_NUMERIC_REGEX.replace_all(&unlabeled, " ");

    let Some(run) = DIGIT_RUN_REGEX.find(&numeric) else {
        return String::new();
    };
    let run = run.as_str().replace(',', "");

    // A single dot is a decimal point; several dots are thousands separators.
    let integer_part = match run.split_once('.') {
        Some((integer, fraction)) if !fraction.contains('.') => integer.to_string(),
        Some(_) => run.replace('.', ""),
        None => run,
    };

    integer_part
        .parse::<u64>()
        .map(|n| n.to_string())
        .unwrap_or(integer_part)
}
