//! Parsing of disassembler listings into per-function summaries.
//!
//! The parser is deliberately loose about layout: objdump separates fields
//! with tabs, other tools pad with spaces. Anything that doesn't look like
//! `address: raw mnemonic operands` is counted and skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::image::FirmwareImage;
use crate::model::{CandidateRange, FunctionSummary, InstructionRecord};
use crate::services::backends::DisassemblyBackend;
use crate::strings::CrossReferenceIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasmOptions {
    /// Load address of image offset 0.
    pub base_address: u64,
    /// Combine `lui`/`auipc` with a following `addi` on the same register.
    pub merge_address_pairs: bool,
}

impl Default for DisasmOptions {
    fn default() -> Self {
        Self { base_address: 0x8000_0000, merge_address_pairs: true }
    }
}

/// A candidate range that produced no summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFailure {
    pub start: u64,
    pub end: u64,
    pub reason: String,
}

/// Summary of one range plus what the parser could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeAnalysis {
    pub summary: FunctionSummary,
    pub unparsed_lines: usize,
}

static FIELD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").expect("static regex"));
static ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static HEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0[xX]([0-9a-fA-F]+)").expect("static regex"));

/// Parse one listing line.
pub fn parse_line(line: &str) -> Option<InstructionRecord> {
    let (addr, rest) = line.trim().split_once(':')?;
    let address = u64::from_str_radix(addr.trim(), 16).ok()?;

    let fields: Vec<&str> =
        FIELD_SPLIT.split(rest.trim()).map(str::trim).filter(|f| !f.is_empty()).collect();
    let (raw, text) = fields.split_first()?;
    let raw_bytes = hex::decode(raw.replace(' ', "")).ok()?;
    if raw_bytes.is_empty() {
        return None;
    }

    let text = text.join(" ");
    let mut parts = text.splitn(2, char::is_whitespace);
    let mnemonic = parts.next().filter(|m| !m.is_empty())?.to_string();
    let operands = parts.next().unwrap_or_default();
    // binutils appends `# <resolved address>` to the low half of an address pair.
    let operands = operands.split_once('#').map_or(operands, |(ops, _)| ops);
    let operands = ANNOTATION.replace_all(operands, "").trim().to_string();

    Some(InstructionRecord { address, raw_bytes, mnemonic, operands })
}

fn base_mnemonic(mnemonic: &str) -> &str {
    mnemonic.strip_prefix("c.").unwrap_or(mnemonic)
}

pub fn is_call_or_jump(mnemonic: &str) -> bool {
    matches!(base_mnemonic(mnemonic), "jal" | "jalr" | "j" | "jr" | "call" | "tail")
}

fn is_address_upper(mnemonic: &str) -> bool {
    matches!(mnemonic, "lui" | "c.lui" | "auipc")
}

/// First `0x…` operand, else the first bare hex operand of at least four
/// digits (objdump prints branch targets without a prefix). Memory operands
/// such as `12(a5)` carry decimal displacements and are skipped.
pub fn first_hex_literal(operands: &str) -> Option<u64> {
    let fields: Vec<&str> =
        operands.split(',').map(str::trim).filter(|f| !f.contains('(')).collect();
    if let Some(caps) = fields.iter().find_map(|f| HEX_LITERAL.captures(*f)) {
        return u64::from_str_radix(&caps[1], 16).ok();
    }
    fields
        .iter()
        .filter(|t| t.len() >= 4 && t.chars().all(|c| c.is_ascii_hexdigit()))
        .find_map(|t| u64::from_str_radix(t, 16).ok())
}

/// Signed immediate in decimal or `0x` hex.
fn parse_imm(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn operand_list(operands: &str) -> Vec<&str> {
    operands.split(',').map(str::trim).collect()
}

/// Value an upper-immediate instruction leaves in its destination register.
fn upper_value(insn: &InstructionRecord) -> Option<(String, i64)> {
    let ops = operand_list(&insn.operands);
    let [rd, imm] = ops.as_slice() else { return None };
    let imm = parse_imm(imm)?;
    // RV64 sign-extends the 32-bit result.
    let upper = i64::from(((imm as u32) << 12) as i32);
    let value = if insn.mnemonic == "auipc" { upper.wrapping_add(insn.address as i64) } else { upper };
    Some((rd.to_string(), value))
}

/// Low part from `addi rd,rd,lo`, `addiw rd,rd,lo` or `c.addi rd,lo`.
fn low_part(insn: &InstructionRecord, reg: &str) -> Option<i64> {
    let ops = operand_list(&insn.operands);
    match (insn.mnemonic.as_str(), ops.as_slice()) {
        ("addi" | "addiw", [rd, rs, lo]) if *rd == reg && *rs == reg => parse_imm(lo),
        ("c.addi", [rd, lo]) if *rd == reg => parse_imm(lo),
        _ => None,
    }
}

fn to_offset(value: i64, options: &DisasmOptions) -> Option<u64> {
    let mut address = value as u64;
    if options.base_address <= u64::from(u32::MAX) {
        // Sign-extended 32-bit addresses still name the low 4 GiB.
        address &= 0xFFFF_FFFF;
    }
    address.checked_sub(options.base_address)
}

/// Assemble a summary from parsed instructions.
pub fn summarize(
    range: &CandidateRange,
    instructions: Vec<InstructionRecord>,
    index: &CrossReferenceIndex,
    options: &DisasmOptions,
) -> FunctionSummary {
    let address = options.base_address.wrapping_add(range.start_offset);
    let mut summary = FunctionSummary {
        name: FunctionSummary::default_name(address),
        start: range.start_offset,
        end: range.end_offset,
        address,
        instructions: Vec::new(),
        call_targets: Default::default(),
        data_references: Default::default(),
    };

    for (pos, insn) in instructions.iter().enumerate() {
        if is_call_or_jump(&insn.mnemonic) {
            if let Some(target) = first_hex_literal(&insn.operands) {
                summary.call_targets.insert(target);
            }
        } else if is_address_upper(&insn.mnemonic) {
            let offset = if options.merge_address_pairs {
                upper_value(insn).and_then(|(reg, value)| {
                    let low = instructions.get(pos + 1).and_then(|next| low_part(next, &reg));
                    to_offset(value.wrapping_add(low.unwrap_or(0)), options)
                })
            } else {
                first_hex_literal(&insn.operands)
            };
            if let Some(offset) = offset.filter(|o| index.contains_offset(*o)) {
                summary.data_references.insert(offset);
            }
        }
    }

    summary.instructions = instructions;
    summary
}

/// Section banners, labels and objdump's elision marker.
fn is_listing_noise(line: &str) -> bool {
    line.ends_with(':') || line.contains("file format") || line == "..."
}

/// Disassemble one candidate range and summarize it.
pub fn analyze_range(
    range: &CandidateRange,
    image: &FirmwareImage,
    backend: &dyn DisassemblyBackend,
    index: &CrossReferenceIndex,
    options: &DisasmOptions,
) -> Result<RangeAnalysis, RangeFailure> {
    let fail = |reason: String| RangeFailure {
        start: range.start_offset,
        end: range.end_offset,
        reason,
    };

    let bytes = image
        .slice(range.start_offset, range.end_offset)
        .ok_or_else(|| fail("range outside image".into()))?;
    let address = options.base_address.wrapping_add(range.start_offset);
    let lines = backend.disassemble(bytes, address).map_err(|e| fail(e.to_string()))?;
    if lines.is_empty() {
        return Err(fail(format!("{} produced no output", backend.name())));
    }

    let mut instructions = Vec::with_capacity(lines.len());
    let mut unparsed_lines = 0usize;
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        match parse_line(line) {
            Some(insn) => instructions.push(insn),
            None if is_listing_noise(line) => {}
            None => unparsed_lines += 1,
        }
    }
    if instructions.is_empty() {
        return Err(fail(format!("no instructions parsed from {} lines", lines.len())));
    }

    tracing::debug!(
        start = range.start_offset,
        end = range.end_offset,
        instructions = instructions.len(),
        unparsed_lines,
        "range analyzed"
    );
    Ok(RangeAnalysis { summary: summarize(range, instructions, index, options), unparsed_lines })
}
