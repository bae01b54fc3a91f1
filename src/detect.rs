use std::collections::HashSet;

use crate::models::{Fingerprint, NoticeRecord};

/// Fingerprints present in `current` but not in `previous`.
pub fn detect(
    current: &HashSet<Fingerprint>,
    previous: &HashSet<Fingerprint>,
) -> HashSet<Fingerprint> {
    current.difference(previous).cloned().collect()
}

/// The records whose fingerprint is new, in extraction order.
pub fn new_records(records: &[NoticeRecord], previous: &HashSet<Fingerprint>) -> Vec<NoticeRecord> {
    let current: HashSet<Fingerprint> = records.iter().map(|r| r.fingerprint.clone()).collect();
    let fresh = detect(&current, previous);

    records
        .iter()
        .filter(|r| fresh.contains(&r.fingerprint))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> HashSet<Fingerprint> {
        items.iter().map(|s| Fingerprint(s.to_string())).collect()
    }

    #[test]
    fn set_difference_laws() {
        let s = set(&["a", "b", "c"]);
        assert!(detect(&s, &s).is_empty());
        assert_eq!(detect(&s, &HashSet::new()), s);
        assert_eq!(detect(&s, &set(&["b", "z"])), set(&["a", "c"]));
    }

    #[test]
    fn deterministic() {
        let current = set(&["a", "b", "c", "d"]);
        let previous = set(&["b", "d"]);
        assert_eq!(detect(&current, &previous), detect(&current, &previous));
    }

    #[test]
    fn new_records_keep_page_order() {
        let records: Vec<NoticeRecord> = ["c", "a", "b"]
            .iter()
            .map(|t| NoticeRecord::new(*t, format!("https://example.com/{t}"), "", "", "", false))
            .collect();
        let previous: HashSet<Fingerprint> = [records[1].fingerprint.clone()].into_iter().collect();

        let fresh = new_records(&records, &previous);
        let titles: Vec<_> = fresh.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }
}
