//! Core data model shared by every analysis stage.
//!
//! All records here are plain values: they are produced by one stage, read by
//! the next, and serialized as-is into the persisted report.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A contiguous run of printable bytes found in the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRecord {
    /// Offset of the first byte of the run.
    pub start_offset: u64,
    pub text: String,
}

impl StringRecord {
    pub fn new(start_offset: u64, text: impl Into<String>) -> Self {
        Self { start_offset, text: text.into() }
    }

    /// Offset one past the last byte of the run.
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.text.len() as u64
    }
}

/// Identification rule for a known function: its name plus substrings that
/// characteristically appear in the strings it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(alias = "characteristic_substrings")]
    pub strings: Vec<String>,
    #[serde(default, alias = "source_file")]
    pub source_hint: String,
}

impl FunctionSignature {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        strings: impl IntoIterator<Item = S>,
        source_hint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            strings: strings.into_iter().map(Into::into).collect(),
            source_hint: source_hint.into(),
        }
    }
}

/// A ranked hypothesis that a signature's function lives near `candidate_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureMatch {
    pub signature_name: String,
    #[serde(rename = "offset", alias = "candidate_offset")]
    pub candidate_offset: u64,
    /// Heuristic score in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_hint: String,
}

/// Byte range `[start_offset, end_offset)` that may hold one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateRange {
    pub start_offset: u64,
    pub end_offset: u64,
}

impl CandidateRange {
    pub fn new(start_offset: u64, end_offset: u64) -> Self {
        Self { start_offset, end_offset }
    }

    pub fn len(&self) -> u64 {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start_offset && offset < self.end_offset
    }
}

/// One line of backend output, parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub address: u64,
    /// Encoding bytes in the order the backend printed them.
    #[serde(with = "hex_bytes")]
    pub raw_bytes: Vec<u8>,
    pub mnemonic: String,
    pub operands: String,
}

/// Per-function view assembled from a disassembled candidate range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    /// Image offset of the first byte.
    pub start: u64,
    /// Image offset one past the last byte.
    pub end: u64,
    /// Load address of `start`.
    pub address: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<InstructionRecord>,
    pub call_targets: BTreeSet<u64>,
    /// Image offsets of indexed strings the function materializes.
    pub data_references: BTreeSet<u64>,
}

impl FunctionSummary {
    /// Conventional name for a function nobody has identified yet. Takes the
    /// load address (`base_address + start`), not the image offset, so names
    /// line up with addresses in disassembler listings.
    pub fn default_name(address: u64) -> String {
        format!("sub_{address:08X}")
    }

    pub fn range(&self) -> CandidateRange {
        CandidateRange::new(self.start, self.end)
    }
}

/// Family-prefixed identifier found verbatim in the image, e.g. `uart_send`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolReference {
    pub offset: u64,
    pub name: String,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
