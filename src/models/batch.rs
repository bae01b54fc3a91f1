use super::NoticeRecord;

/// How new records are bucketed into message sections.
#[derive(Debug, Clone, Default)]
pub struct CategoryGrouping {
    /// Categories listed here come first, in this order.
    pub priority: Vec<String>,
    /// When set, records without a category join this named group instead of
    /// forming their own unlabeled one.
    pub empty_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    /// Empty for the unlabeled group.
    pub label: String,
    pub records: Vec<NoticeRecord>,
}

/// New records of one site for one check, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationBatch {
    pub site_name: String,
    pub groups: Vec<CategoryGroup>,
}

impl NotificationBatch {
    pub fn new(site_name: &str, records: Vec<NoticeRecord>, grouping: &CategoryGrouping) -> Self {
        // Encounter order first; records keep page order inside a group.
        let mut encountered: Vec<CategoryGroup> = Vec::new();
        for record in records {
            let mut key = record.category.trim().to_string();
            if key.is_empty() {
                if let Some(label) = &grouping.empty_label {
                    key = label.clone();
                }
            }

            match encountered.iter_mut().find(|g| g.label == key) {
                Some(group) => group.records.push(record),
                None => encountered.push(CategoryGroup {
                    label: key,
                    records: vec![record],
                }),
            }
        }

        let mut groups = Vec::with_capacity(encountered.len());
        for name in &grouping.priority {
            if let Some(pos) = encountered.iter().position(|g| &g.label == name) {
                groups.push(encountered.remove(pos));
            }
        }
        groups.extend(encountered);

        Self {
            site_name: site_name.to_string(),
            groups,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.records.is_empty())
    }
}
