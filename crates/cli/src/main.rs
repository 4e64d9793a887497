use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use fwmap::commands::*;
use fwmap::init_tracing;

/// Firmware layout reconstruction.
///
/// A thin wrapper around `fwmap-core`; every command is a library function so
/// it can be tested without spawning this binary.
#[derive(Parser, Debug)]
#[command(name = "fwmap", version, about = "Reconstruct strings, functions and parameters from raw firmware", long_about = None)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline, write JSON reports and record the run.
    Analyze {
        /// Firmware image to analyze.
        firmware: String,
        /// YAML or JSON analysis config.
        #[arg(long)]
        config: Option<String>,
        /// YAML or JSON signature catalog; defaults to the built-in catalog.
        #[arg(long)]
        catalog: Option<String>,
        /// Output directory for report files and the run store.
        #[arg(long)]
        out: Option<String>,
        /// Disassembly backend name (see `fwmap backends`).
        #[arg(long)]
        backend: Option<String>,
        /// Path to the objdump executable.
        #[arg(long)]
        objdump: Option<String>,
        /// Range-analysis worker threads.
        #[arg(long)]
        workers: Option<usize>,
        /// Keep per-instruction records in the report.
        #[arg(long, default_value_t = false)]
        with_instructions: bool,
        /// Do not record the run in the SQLite store.
        #[arg(long, default_value_t = false)]
        no_store: bool,
        /// Print the full report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print printable strings with their offsets.
    Strings {
        firmware: String,
        #[arg(long, default_value_t = 4)]
        min_length: usize,
        /// Treat tab, CR and LF as printable.
        #[arg(long, default_value_t = false)]
        whitespace: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Locate known functions by clustering their characteristic strings.
    Signatures {
        firmware: String,
        #[arg(long)]
        catalog: Option<String>,
        #[arg(long)]
        config: Option<String>,
        /// Largest gap in bytes between offsets of one cluster.
        #[arg(long)]
        window: Option<u64>,
        /// Minimum confidence for an accepted match.
        #[arg(long)]
        threshold: Option<f64>,
        /// List every ranked candidate per signature.
        #[arg(long, default_value_t = false)]
        all: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Scan for candidate function ranges from prologue/epilogue encodings.
    Boundaries {
        firmware: String,
        /// Only consider prologues below this offset.
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Extract configuration parameters embedded as text.
    Params {
        firmware: String,
        #[arg(long)]
        config: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the kflash header and landmark string offsets.
    Header {
        firmware: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List runs recorded in a run store.
    Runs {
        /// Path to fwmap.db.
        #[arg(long)]
        db: String,
        /// Only runs for this firmware name.
        #[arg(long)]
        firmware: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show stored matches and functions for one run.
    ShowRun {
        #[arg(long)]
        db: String,
        /// Run id; defaults to the latest run of --firmware.
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        firmware: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List available disassembly backends.
    Backends {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Validate and print a signature catalog.
    Catalog {
        #[arg(long)]
        catalog: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze {
            firmware,
            config,
            catalog,
            out,
            backend,
            objdump,
            workers,
            with_instructions,
            no_store,
            json,
        } => analyze_command(&AnalyzeOptions {
            firmware,
            config,
            catalog,
            out,
            backend,
            objdump,
            workers,
            with_instructions,
            no_store,
            json,
        })?,
        Command::Strings { firmware, min_length, whitespace, json } => {
            strings_command(&firmware, min_length, whitespace, json)?
        }
        Command::Signatures { firmware, catalog, config, window, threshold, all, json } => {
            signatures_command(&SignatureQuery {
                firmware,
                catalog,
                config,
                window,
                threshold,
                all_candidates: all,
                json,
            })?
        }
        Command::Boundaries { firmware, limit, json } => boundaries_command(&firmware, limit, json)?,
        Command::Params { firmware, config, json } => {
            params_command(&firmware, config.as_deref(), json)?
        }
        Command::Header { firmware, json } => header_command(&firmware, json)?,
        Command::Runs { db, firmware, json } => list_runs_command(&db, firmware.as_deref(), json)?,
        Command::ShowRun { db, id, firmware, json } => {
            show_run_command(&db, id, firmware.as_deref(), json)?
        }
        Command::Backends { json } => list_backends_command(json)?,
        Command::Catalog { catalog, json } => catalog_command(catalog.as_deref(), json)?,
    }

    Ok(())
}
