use anyhow::Result;

use crate::commands::{load_catalog, print_json};

/// Validate and print a signature catalog (the built-in one by default).
pub fn catalog_command(path: Option<&str>, json: bool) -> Result<()> {
    let catalog = load_catalog(path)?;

    if json {
        return print_json(&catalog);
    }
    println!("Catalog {} ({} signatures):", catalog.version, catalog.len());
    for sig in &catalog.signatures {
        let hint = if sig.source_hint.is_empty() { "-" } else { sig.source_hint.as_str() };
        println!("- {} [{}]: {}", sig.name, hint, sig.strings.join(", "));
    }
    Ok(())
}
