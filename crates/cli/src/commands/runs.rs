use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use fwmap_core::db::RunStore;
use fwmap_core::model::{FunctionSummary, SignatureMatch};

use crate::commands::print_json;

fn open_store(db: &str) -> Result<RunStore> {
    let path = Path::new(db);
    if !path.is_file() {
        return Err(anyhow!("Run store not found at {}", path.display()));
    }
    RunStore::open(path).with_context(|| format!("Failed to open run store at {}", path.display()))
}

/// List recorded runs, optionally for one firmware name.
pub fn list_runs_command(db: &str, firmware: Option<&str>, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let runs = store.list_runs(firmware).context("Failed to list runs")?;

    if json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("Runs: (none)");
        return Ok(());
    }
    println!("Runs:");
    for run in runs {
        println!(
            "- #{} {} [{}] backend={} matches={} functions={} skipped={} at {}",
            run.id,
            run.firmware,
            run.status.as_str(),
            run.backend,
            run.match_count,
            run.function_count,
            run.skipped_ranges,
            run.finished_at
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunDetail {
    id: i64,
    matches: Vec<SignatureMatch>,
    functions: Vec<FunctionSummary>,
}

/// Show stored matches and functions for one run (or the latest for a firmware).
pub fn show_run_command(db: &str, id: Option<i64>, firmware: Option<&str>, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let id = match (id, firmware) {
        (Some(id), _) => id,
        (None, Some(name)) => store
            .latest_run_id(name)?
            .ok_or_else(|| anyhow!("No runs recorded for firmware '{name}'"))?,
        (None, None) => return Err(anyhow!("Pass a run id or --firmware")),
    };

    let detail = RunDetail {
        id,
        matches: store.load_matches(id).context("Failed to load matches")?,
        functions: store.load_functions(id).context("Failed to load functions")?,
    };
    if json {
        return print_json(&detail);
    }

    println!("Run #{}", detail.id);
    println!("Matches:");
    for m in &detail.matches {
        println!("  - {} @ 0x{:08x} ({:.2})", m.signature_name, m.candidate_offset, m.confidence);
    }
    println!("Functions:");
    for f in &detail.functions {
        println!(
            "  - {} 0x{:08x}..0x{:08x} calls={} data_refs={}",
            f.name,
            f.start,
            f.end,
            f.call_targets.len(),
            f.data_references.len()
        );
    }
    Ok(())
}
