use std::collections::BTreeMap;

use crate::error::{Result, ScrapeError};

/// Raw text captured during a multi-shot browser session, keyed by a
/// caller-chosen label (e.g. `"listing"`, `"details"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    fields: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(label, text);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.fields.insert(label.into(), text.into());
    }

    /// Text captured under `label`.
    ///
    /// Fails with [`ScrapeError::MissingSnapshotField`] listing the labels
    /// that are present.
    pub fn get(&self, label: &str) -> Result<&str> {
        self.fields
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| ScrapeError::MissingSnapshotField {
                label: label.to_string(),
                valid: self.labels().map(str::to_string).collect(),
            })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
