use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::{OutputLayout, RunStore};
use crate::services::analysis::AnalysisReport;

/// Pretty-print `value` as JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the full report and its per-section files under `layout.root`.
pub fn write_report(layout: &OutputLayout, report: &AnalysisReport) -> Result<()> {
    fs::create_dir_all(&layout.root)
        .with_context(|| format!("Failed to create output directory {}", layout.root.display()))?;
    write_json(&layout.report_path, report)?;
    write_json(&layout.strings_path, &report.strings)?;
    write_json(&layout.matches_path, &report.matches)?;
    write_json(&layout.functions_path, &report.functions)?;
    write_json(&layout.parameters_path, &report.parameters)?;
    Ok(())
}

/// Open the run store belonging to `layout`.
pub fn open_run_store(layout: &OutputLayout) -> Result<RunStore> {
    RunStore::open(&layout.db_path)
        .with_context(|| format!("Failed to open run store at {}", layout.db_path.display()))
}
