use serde::{Deserialize, Serialize};

/// One crawled page as it appears in the snapshot file.
/// Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageRecord {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Append-only list of page records in completion order
#[derive(Debug, Default, Clone)]
pub struct PageStore {
    records: Vec<PageRecord>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PageRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a PageStore {
    type Item = &'a PageRecord;
    type IntoIter = std::slice::Iter<'a, PageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
