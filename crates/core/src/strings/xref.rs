//! Text → offsets index used to resolve signatures and operand addresses.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::model::StringRecord;

/// Groups string records by exact text. Keys keep first-occurrence order and
/// each key's offsets keep scan order.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceIndex {
    by_text: IndexMap<String, Vec<u64>>,
    lowered: Vec<String>,
    offsets: BTreeSet<u64>,
}

impl CrossReferenceIndex {
    pub fn build(records: &[StringRecord]) -> Self {
        let mut by_text: IndexMap<String, Vec<u64>> = IndexMap::new();
        let mut offsets = BTreeSet::new();
        for record in records {
            by_text.entry(record.text.clone()).or_default().push(record.start_offset);
            offsets.insert(record.start_offset);
        }
        let lowered = by_text.keys().map(|k| k.to_lowercase()).collect();
        tracing::debug!(keys = by_text.len(), offsets = offsets.len(), "built cross-reference index");
        Self { by_text, lowered, offsets }
    }

    /// Number of distinct texts.
    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }

    /// Offsets for an exact text.
    pub fn offsets(&self, text: &str) -> &[u64] {
        self.by_text.get(text).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every key containing `needle`, case-insensitively, with its offsets.
    pub fn search<'a>(&'a self, needle: &str) -> Vec<(&'a str, &'a [u64])> {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.by_text
            .iter()
            .zip(&self.lowered)
            .filter(|(_, lowered)| lowered.contains(&needle))
            .map(|((key, offs), _)| (key.as_str(), offs.as_slice()))
            .collect()
    }

    /// Whether a string record starts exactly at `offset`.
    pub fn contains_offset(&self, offset: u64) -> bool {
        self.offsets.contains(&offset)
    }

    /// Text of the record starting at `offset`.
    pub fn text_at(&self, offset: u64) -> Option<&str> {
        if !self.contains_offset(offset) {
            return None;
        }
        self.by_text
            .iter()
            .find(|(_, offs)| offs.contains(&offset))
            .map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u64])> {
        self.by_text.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
