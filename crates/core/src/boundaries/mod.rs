//! Prologue/epilogue scanning for candidate function ranges.
//!
//! This is a syntactic heuristic over RV64GC encodings, not a decoder: stack
//! adjustments that happen to appear inside data produce false positives, and
//! functions with unusual entry sequences are missed. Ranges may overlap.

use serde::{Deserialize, Serialize};

use crate::model::CandidateRange;

/// Masked little-endian instruction word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsnPattern {
    pub name: String,
    pub value: u32,
    pub mask: u32,
    /// Encoding width in bytes, 2 or 4.
    pub width: u8,
}

impl InsnPattern {
    pub fn compressed(name: &str, value: u16) -> Self {
        Self { name: name.to_string(), value: u32::from(value), mask: 0xFFFF, width: 2 }
    }

    pub fn full(name: &str, value: u32, mask: u32) -> Self {
        Self { name: name.to_string(), value, mask, width: 4 }
    }

    /// Does the word at `at` match? Reads never cross `bytes.len()`.
    pub fn matches_at(&self, bytes: &[u8], at: usize) -> bool {
        let word = match self.width {
            2 => bytes.get(at..at + 2).map(|b| u32::from(u16::from_le_bytes([b[0], b[1]]))),
            4 => bytes.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            _ => None,
        };
        word.is_some_and(|w| w & self.mask == self.value & self.mask)
    }
}

pub fn default_prologues() -> Vec<InsnPattern> {
    vec![
        InsnPattern::compressed("c.addi sp,-32", 0x1101),
        InsnPattern::compressed("c.addi sp,-16", 0x1141),
        InsnPattern::compressed("c.addi16sp sp,-64", 0x7139),
        InsnPattern::compressed("c.addi16sp sp,-48", 0x7179),
        // addi sp,sp,<negative imm>: sign bit, rs1, funct3, rd and opcode fixed.
        InsnPattern::full("addi sp,sp,-imm", 0x8001_0113, 0x800F_FFFF),
    ]
}

pub fn default_epilogues() -> Vec<InsnPattern> {
    vec![
        InsnPattern::compressed("c.ret", 0x8082),
        InsnPattern::full("ret", 0x0000_8067, 0xFFFF_FFFF),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryOptions {
    /// Only prologues below this offset are considered.
    pub search_limit: u64,
    /// Bytes after a prologue searched for an epilogue.
    pub epilogue_window: u64,
    pub max_candidates: usize,
    pub prologues: Vec<InsnPattern>,
    pub epilogues: Vec<InsnPattern>,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            search_limit: 0x10_0000,
            epilogue_window: 0x2000,
            max_candidates: 200,
            prologues: default_prologues(),
            epilogues: default_epilogues(),
        }
    }
}

/// Scan at 2-byte alignment for prologue → epilogue pairs.
pub fn find_candidates(bytes: &[u8], options: &BoundaryOptions) -> Vec<CandidateRange> {
    let limit = bytes.len().min(usize::try_from(options.search_limit).unwrap_or(usize::MAX));
    let window = usize::try_from(options.epilogue_window).unwrap_or(usize::MAX);
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos + 2 <= limit && out.len() < options.max_candidates {
        let Some(prologue) = options.prologues.iter().find(|p| p.matches_at(bytes, pos)) else {
            pos += 2;
            continue;
        };

        let search_end = pos.saturating_add(window).min(bytes.len());
        let epilogue_end = (pos + usize::from(prologue.width)..search_end)
            .step_by(2)
            .find_map(|at| {
                options
                    .epilogues
                    .iter()
                    .find(|e| at + usize::from(e.width) <= search_end && e.matches_at(bytes, at))
                    .map(|e| at + usize::from(e.width))
            });

        match epilogue_end {
            Some(end) => {
                out.push(CandidateRange::new(pos as u64, end as u64));
                pos = end;
            }
            None => pos += 2,
        }
    }

    tracing::info!(candidates = out.len(), scanned = limit, "function boundary scan done");
    out
}
