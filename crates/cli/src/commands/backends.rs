use anyhow::Result;
use serde::Serialize;

use fwmap_core::config::BackendSettings;
use fwmap_core::services::backends::default_backend_registry;

use crate::commands::print_json;

#[derive(Debug, Serialize)]
pub struct BackendEntry {
    pub name: String,
    pub description: String,
}

/// List disassembly backends compiled into this binary.
pub fn list_backends_command(json: bool) -> Result<()> {
    let registry = default_backend_registry(&BackendSettings::default());
    let entries: Vec<BackendEntry> = registry
        .names()
        .into_iter()
        .map(|name| {
            let description = match name.as_str() {
                "none" => "No disassembler; every range is reported as skipped".to_string(),
                "objdump" => {
                    "GNU objdump in raw-binary mode (FWMAP_OBJDUMP or riscv64-unknown-elf-objdump)"
                        .to_string()
                }
                other => format!("Backend '{other}'"),
            };
            BackendEntry { name, description }
        })
        .collect();

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Backends: (none)");
        return Ok(());
    }

    println!("Backends:");
    for entry in entries {
        println!("- {}: {}", entry.name, entry.description);
    }
    Ok(())
}
