//! Printable-run extraction over the raw image.

pub mod xref;

use serde::{Deserialize, Serialize};

use crate::model::StringRecord;

pub use xref::CrossReferenceIndex;

/// Knobs for one extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Shortest run (in bytes) that is kept.
    pub min_length: usize,
    /// Treat tab, line feed and carriage return as printable.
    pub include_whitespace: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { min_length: 4, include_whitespace: false }
    }
}

impl ExtractOptions {
    pub fn new(min_length: usize, include_whitespace: bool) -> Self {
        Self { min_length, include_whitespace }
    }

    fn is_printable(&self, b: u8) -> bool {
        (32..=126).contains(&b) || (self.include_whitespace && matches!(b, 9 | 10 | 13))
    }
}

/// Output of one extraction pass, ordered by offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringTable {
    pub records: Vec<StringRecord>,
    /// Runs long enough to keep whose bytes did not decode.
    pub decode_failures: usize,
}

impl StringTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StringRecord> {
        self.records.iter()
    }

    /// Record starting exactly at `offset`.
    pub fn get(&self, offset: u64) -> Option<&StringRecord> {
        self.records
            .binary_search_by_key(&offset, |r| r.start_offset)
            .ok()
            .map(|idx| &self.records[idx])
    }
}

/// Scan `bytes` once, left to right, and collect every qualifying run.
pub fn extract(bytes: &[u8], options: &ExtractOptions) -> StringTable {
    let mut table = StringTable::default();
    let mut run_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if options.is_printable(b) {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            flush(&mut table, bytes, start, i, options.min_length);
        }
    }
    if let Some(start) = run_start {
        flush(&mut table, bytes, start, bytes.len(), options.min_length);
    }

    tracing::debug!(
        min_length = options.min_length,
        include_whitespace = options.include_whitespace,
        strings = table.records.len(),
        decode_failures = table.decode_failures,
        "string extraction finished"
    );
    table
}

fn flush(table: &mut StringTable, bytes: &[u8], start: usize, end: usize, min_length: usize) {
    if end - start < min_length {
        return;
    }
    // Runs are ASCII-only, so this never fails today; the counter feeds
    // `Diagnostics::failed_decodes` and stays correct if the predicate widens.
    match std::str::from_utf8(&bytes[start..end]) {
        Ok(text) => table.records.push(StringRecord::new(start as u64, text)),
        Err(_) => table.decode_failures += 1,
    }
}
