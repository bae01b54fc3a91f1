use std::collections::HashMap;

use crate::models::NoticeRecord;

/// Collapse records sharing a (normalized title, normalized link) key.
///
/// The first occurrence keeps its position and fields; a later pinned
/// duplicate only upgrades the kept record's pinned flag.
pub fn dedupe(records: Vec<NoticeRecord>) -> Vec<NoticeRecord> {
    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    let mut kept: Vec<NoticeRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = record.dedupe_key();
        match positions.get(&key) {
            Some(&index) => {
                if record.is_pinned {
                    kept[index].is_pinned = true;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(title: &str, link: &str, date: &str, pinned: bool) -> NoticeRecord {
        NoticeRecord::new(title, link, date, "", "", pinned)
    }

    #[test]
    fn later_pinned_duplicate_upgrades_first() {
        let a = record("Exam schedule", "https://example.com/n?id=1", "2025-09-01", false);
        let b = record("Exam  schedule ", "https://example.com/n/?id=1", "2025-09-02", true);

        let out = dedupe(vec![a.clone(), b]);

        assert_eq!(out.len(), 1);
        assert!(out[0].is_pinned);
        assert_eq!(out[0].title, a.title);
        assert_eq!(out[0].date, "2025-09-01");
        assert_eq!(out[0].link, a.link);
    }

    #[test]
    fn unpinned_duplicate_does_not_downgrade() {
        let a = record("A", "https://example.com/a", "", true);
        let b = record("A", "https://example.com/a", "", false);

        let out = dedupe(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_pinned);
    }

    #[test]
    fn keeps_first_occurrence_order() {
        let out = dedupe(vec![
            record("B", "https://example.com/b", "", false),
            record("A", "https://example.com/a", "", false),
            record("B", "https://example.com/b", "", true),
            record("C", "https://example.com/c", "", false),
        ]);

        let titles: Vec<_> = out.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
        assert!(out[0].is_pinned);
    }

    #[test]
    fn same_title_different_link_is_kept() {
        let out = dedupe(vec![
            record("Notice", "https://example.com/1", "", false),
            record("Notice", "https://example.com/2", "", false),
        ]);
        assert_eq!(out.len(), 2);
    }
}
