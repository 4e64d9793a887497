//! Identification of known functions by clustering their characteristic strings.
//!
//! Strings a function uses tend to sit together in read-only data near the
//! function or its literal pool, so a tight group of offsets that contain a
//! signature's substrings is treated as evidence of where that function lives.
//! Results are ranked hypotheses, never ground truth.

pub mod catalog;
pub mod symbols;

use serde::{Deserialize, Serialize};

use crate::model::{FunctionSignature, SignatureMatch};
use crate::strings::CrossReferenceIndex;

pub use catalog::{CatalogError, SignatureCatalog};
pub use symbols::scan_symbol_references;

/// Tuning for clustering and acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Largest gap (bytes) between neighbouring offsets of one cluster.
    pub proximity_window: u64,
    /// `match_all` keeps matches strictly above this confidence.
    pub threshold: f64,
    /// Ranked candidates returned per signature.
    pub max_candidates: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { proximity_window: 4096, threshold: 0.3, max_candidates: 5 }
    }
}

/// Split ascending `offsets` into groups whose neighbours are at most
/// `window` bytes apart.
pub fn cluster_offsets(offsets: &[u64], window: u64) -> Vec<Vec<u64>> {
    let mut sorted = offsets.to_vec();
    sorted.sort_unstable();

    let mut clusters: Vec<Vec<u64>> = Vec::new();
    for offset in sorted {
        match clusters.last_mut() {
            Some(current) if offset - current[current.len() - 1] <= window => current.push(offset),
            _ => clusters.push(vec![offset]),
        }
    }
    clusters
}

/// Middle element; the lower one when the cluster has even length.
fn representative(cluster: &[u64]) -> u64 {
    cluster[(cluster.len() - 1) / 2]
}

/// Ranked candidate locations for one signature, best first.
pub fn match_signature(
    signature: &FunctionSignature,
    index: &CrossReferenceIndex,
    options: &MatchOptions,
) -> Vec<SignatureMatch> {
    if signature.strings.is_empty() {
        return Vec::new();
    }

    let hits: Vec<u64> = signature
        .strings
        .iter()
        .flat_map(|needle| index.search(needle))
        .flat_map(|(_, offsets)| offsets.iter().copied())
        .collect();
    if hits.is_empty() {
        return Vec::new();
    }

    let wanted = signature.strings.len() as f64;
    let mut matches: Vec<SignatureMatch> = cluster_offsets(&hits, options.proximity_window)
        .iter()
        .map(|cluster| SignatureMatch {
            signature_name: signature.name.clone(),
            candidate_offset: representative(cluster),
            confidence: (cluster.len() as f64 / wanted).min(1.0),
            source_hint: signature.source_hint.clone(),
        })
        .collect();

    // Stable: equal confidences stay in ascending offset order.
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matches.truncate(options.max_candidates);
    matches
}

/// Best match per signature, if it clears the threshold.
pub fn match_all(
    signatures: &[FunctionSignature],
    index: &CrossReferenceIndex,
    options: &MatchOptions,
) -> Vec<SignatureMatch> {
    let matched: Vec<SignatureMatch> = signatures
        .iter()
        .filter_map(|sig| {
            match_signature(sig, index, options)
                .into_iter()
                .find(|m| m.confidence > options.threshold)
        })
        .collect();
    tracing::info!(signatures = signatures.len(), matched = matched.len(), "signature matching done");
    matched
}
