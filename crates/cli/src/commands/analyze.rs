use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use fwmap_core::db::util::{open_run_store, write_report};
use fwmap_core::db::{OutputLayout, RunMetadata, RunStatus};
use fwmap_core::services::analysis::{AnalysisReport, AnalysisSession};
use fwmap_core::services::backends::default_backend_registry;

use crate::commands::{load_catalog, load_config, open_image, print_json};
use crate::{canonicalize_or_current, firmware_label, sha256_file};

pub const DEFAULT_OUTPUT_DIR: &str = "fwmap-out";

/// Command-line inputs for a full run.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub firmware: String,
    pub config: Option<String>,
    pub catalog: Option<String>,
    pub out: Option<String>,
    pub backend: Option<String>,
    pub objdump: Option<String>,
    pub workers: Option<usize>,
    pub with_instructions: bool,
    pub no_store: bool,
    pub json: bool,
}

fn run_status(report: &AnalysisReport) -> RunStatus {
    if report.diagnostics.skipped_ranges == 0 {
        RunStatus::Succeeded
    } else {
        RunStatus::Partial
    }
}

/// Run the whole pipeline, write the report files and record the run.
pub fn analyze_command(opts: &AnalyzeOptions) -> Result<()> {
    let firmware_path = canonicalize_or_current(&opts.firmware)?;

    let mut config = load_config(opts.config.as_deref())?;
    if let Some(name) = &opts.backend {
        config.backend.name = name.clone();
    }
    if let Some(tool) = &opts.objdump {
        config.backend.tool = Some(PathBuf::from(tool));
    }
    if let Some(workers) = opts.workers {
        config.workers = workers;
    }
    config.validate().context("Invalid configuration after command-line overrides")?;

    let catalog = load_catalog(opts.catalog.as_deref())?;
    let image = open_image(&firmware_path)?;

    let registry = default_backend_registry(&config.backend);
    let backend = registry.get(&config.backend.name).ok_or_else(|| {
        anyhow!("Backend '{}' not found (available: {:?})", config.backend.name, registry.names())
    })?;

    let mut meta = RunMetadata::start(
        firmware_label(&firmware_path),
        Some(sha256_file(&firmware_path)?),
        catalog.version.clone(),
    );

    let mut session = AnalysisSession::new(&image, &config, &catalog, backend);
    session.keep_instructions = opts.with_instructions;
    let report = session.run().context("Analysis failed")?;
    meta.finish(run_status(&report));

    let out_dir = canonicalize_or_current(opts.out.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))?;
    let layout = OutputLayout::new(&out_dir);
    write_report(&layout, &report)?;

    let run_id = if opts.no_store {
        None
    } else {
        let store = open_run_store(&layout)?;
        Some(store.record_run(&meta, &report).context("Failed to record run")?)
    };
    tracing::info!(out = %layout.root.display(), run_id = ?run_id, status = meta.status.as_str(), "report written");

    if opts.json {
        return print_json(&report);
    }

    println!("Analyzed: {} ({} bytes)", meta.firmware, report.image.size);
    if let Some(header) = &report.image.header {
        println!("  kflash header: {}", if header.valid { "valid" } else { "magic mismatch" });
    }
    println!("  Backend: {}", report.backend.name);
    println!("  Strings: {}", report.strings.len());
    println!("  Signature matches: {}", report.matches.len());
    println!("  Functions: {}", report.functions.len());
    println!("  Symbol references: {}", report.symbol_references.len());
    println!(
        "  Parameters: {}",
        report.parameters.values().map(Vec::len).sum::<usize>()
    );
    if report.diagnostics.skipped_ranges > 0 {
        println!("  Skipped ranges: {}", report.diagnostics.skipped_ranges);
    }
    println!("  Status: {}", meta.status.as_str());
    println!("  Report: {}", layout.report_path.display());
    if let Some(id) = run_id {
        println!("  Run id: {id} ({})", layout.relative(&layout.db_path));
    }
    Ok(())
}
