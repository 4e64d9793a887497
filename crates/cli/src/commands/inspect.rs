//! Single-stage commands. Each runs one analysis step over an image and
//! prints its result, without writing files or touching the run store.

use anyhow::Result;
use serde::Serialize;

use fwmap_core::boundaries::{find_candidates, BoundaryOptions};
use fwmap_core::params;
use fwmap_core::signatures::{match_all, match_signature, MatchOptions};
use fwmap_core::strings::{extract, CrossReferenceIndex, ExtractOptions};

use crate::canonicalize_or_current;
use crate::commands::{load_catalog, load_config, open_image, print_json};

/// Print printable runs with their offsets.
pub fn strings_command(firmware: &str, min_length: usize, whitespace: bool, json: bool) -> Result<()> {
    let image = open_image(&canonicalize_or_current(firmware)?)?;
    let table = extract(image.bytes(), &ExtractOptions::new(min_length.max(1), whitespace));

    if json {
        return print_json(&table.records);
    }
    for record in table.iter() {
        println!("0x{:08x}  {}", record.start_offset, record.text.escape_debug());
    }
    if table.decode_failures > 0 {
        eprintln!("{} runs dropped (not valid UTF-8)", table.decode_failures);
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct SignatureQuery {
    pub firmware: String,
    pub catalog: Option<String>,
    pub config: Option<String>,
    pub window: Option<u64>,
    pub threshold: Option<f64>,
    /// Show every ranked candidate instead of the accepted match only.
    pub all_candidates: bool,
    pub json: bool,
}

/// Match the catalog against the image's index strings.
pub fn signatures_command(query: &SignatureQuery) -> Result<()> {
    let config = load_config(query.config.as_deref())?;
    let catalog = load_catalog(query.catalog.as_deref())?;
    let image = open_image(&canonicalize_or_current(&query.firmware)?)?;

    let mut options: MatchOptions = config.matching;
    if let Some(window) = query.window {
        options.proximity_window = window;
    }
    if let Some(threshold) = query.threshold {
        options.threshold = threshold;
    }

    let table = extract(image.bytes(), &config.index_strings);
    let index = CrossReferenceIndex::build(&table.records);
    let matches = if query.all_candidates {
        catalog.signatures.iter().flat_map(|sig| match_signature(sig, &index, &options)).collect()
    } else {
        match_all(&catalog.signatures, &index, &options)
    };

    if query.json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("Signature matches: (none)");
        return Ok(());
    }
    println!("Signature matches:");
    for m in matches {
        println!(
            "- {} @ 0x{:08x} (confidence {:.2}){}",
            m.signature_name,
            m.candidate_offset,
            m.confidence,
            if m.source_hint.is_empty() { String::new() } else { format!(" [{}]", m.source_hint) }
        );
    }
    Ok(())
}

/// Print candidate function ranges.
pub fn boundaries_command(firmware: &str, limit: Option<u64>, json: bool) -> Result<()> {
    let image = open_image(&canonicalize_or_current(firmware)?)?;
    let mut options = BoundaryOptions::default();
    if let Some(limit) = limit {
        options.search_limit = limit;
    }
    let ranges = find_candidates(image.bytes(), &options);

    if json {
        return print_json(&ranges);
    }
    println!("Candidate ranges: {}", ranges.len());
    for r in ranges {
        println!("- 0x{:08x}..0x{:08x} ({} bytes)", r.start_offset, r.end_offset, r.len());
    }
    Ok(())
}

/// Print extracted configuration parameters grouped by category.
pub fn params_command(firmware: &str, config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let image = open_image(&canonicalize_or_current(firmware)?)?;
    let found = params::extract(image.bytes(), &config.params);

    if json {
        return print_json(&found);
    }
    if found.is_empty() {
        println!("Parameters: (none)");
        return Ok(());
    }
    for (category, values) in &found {
        println!("{category}:");
        for p in values {
            println!("  - {} @ 0x{:08x}", p.value, p.source_offset);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct HeaderInfo {
    size: usize,
    header: Option<fwmap_core::image::KflashHeader>,
    landmarks: std::collections::BTreeMap<String, u64>,
}

/// Print the kflash header and landmark offsets.
pub fn header_command(firmware: &str, json: bool) -> Result<()> {
    let config = fwmap_core::config::AnalysisConfig::default();
    let image = open_image(&canonicalize_or_current(firmware)?)?;
    let info = HeaderInfo {
        size: image.len(),
        header: image.header(),
        landmarks: image.landmarks(&config.landmarks),
    };

    if json {
        return print_json(&info);
    }
    println!("Size: {} bytes", info.size);
    match info.header {
        Some(h) => println!(
            "kflash header: magic=0x{:08x} flags=0x{:08x} checksum=0x{:08x} ({})",
            h.magic,
            h.flags,
            h.checksum,
            if h.valid { "valid" } else { "magic mismatch" }
        ),
        None => println!("kflash header: (image too short)"),
    }
    for (name, offset) in &info.landmarks {
        println!("  {name}: 0x{offset:08x}");
    }
    Ok(())
}
