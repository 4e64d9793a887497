use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use fwmap_core::config::AnalysisConfig;
use fwmap_core::image::FirmwareImage;
use fwmap_core::signatures::SignatureCatalog;

/// Config from `path`, or the defaults.
pub fn load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::load(Path::new(p))
            .with_context(|| format!("Failed to load config at {p}")),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Catalog from `path`, or the built-in one.
pub fn load_catalog(path: Option<&str>) -> Result<SignatureCatalog> {
    match path {
        Some(p) => SignatureCatalog::load(Path::new(p))
            .with_context(|| format!("Failed to load signature catalog at {p}")),
        None => Ok(SignatureCatalog::builtin()),
    }
}

pub fn open_image(path: &Path) -> Result<FirmwareImage> {
    FirmwareImage::open(path)
        .with_context(|| format!("Failed to open firmware image {}", path.display()))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
