use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::FunctionSignature;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read signature catalog at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse signature catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse signature catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Signature #{0} has an empty name")]
    MissingName(usize),
    #[error("Signature '{0}' lists no characteristic strings")]
    NoStrings(String),
}

/// Versioned list of signatures handed to the matcher at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCatalog {
    #[serde(default = "default_catalog_version")]
    pub version: String,
    pub signatures: Vec<FunctionSignature>,
}

fn default_catalog_version() -> String {
    "1".to_string()
}

impl SignatureCatalog {
    /// Load a catalog (YAML or JSON, chosen by extension) and validate it.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let body = fs::read(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        let catalog: SignatureCatalog = if path.extension().and_then(|e| e.to_str()) == Some("json")
        {
            serde_json::from_slice(&body)?
        } else {
            serde_yaml::from_slice(&body)?
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        for (idx, sig) in self.signatures.iter().enumerate() {
            if sig.name.trim().is_empty() {
                return Err(CatalogError::MissingName(idx));
            }
            if sig.strings.iter().all(|s| s.is_empty()) {
                return Err(CatalogError::NoStrings(sig.name.clone()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Catalog for the CGMiner/K210 controller firmware family.
    pub fn builtin() -> Self {
        fn sig(name: &str, strings: &[&str], source: &str) -> FunctionSignature {
            FunctionSignature::new(name, strings.iter().copied(), source)
        }
        Self {
            version: "cgminer-4.11-k210".to_string(),
            signatures: vec![
                sig("avalon10_init", &["avalon10", "init", "device"], "driver-avalon10.c"),
                sig("avalon10_scanhash", &["avalon10_scanhash", "hash"], "driver-avalon10.c"),
                sig("avalon10_statline_before", &["avalon10_statline_before"], "driver-avalon10.c"),
                sig("avalon10_prepare", &["avalon10_prepare"], "driver-avalon10.c"),
                sig("pool_active", &["Pool", "active", "stratum"], "cgminer.c"),
                sig("submit_nonce", &["submit", "nonce", "share"], "cgminer.c"),
                sig("sha256_transform", &["sha256"], "sha2.c"),
                sig("lwip_init", &["lwIP", "init", "netif"], "lwip/init.c"),
                sig("vTaskCreate", &["Task", "Create", "FreeRTOS"], "tasks.c"),
                sig("spi_send_data", &["spi", "send", "data"], "spi.c"),
                sig("gpio_set_pin", &["gpio", "pin"], "gpio.c"),
                sig("uart_send", &["uart", "send"], "uart.c"),
            ],
        }
    }
}

impl Default for SignatureCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = SignatureCatalog::builtin();
        catalog.validate().unwrap();
        assert_eq!(catalog.len(), 12);
    }

    #[test]
    fn validate_rejects_signature_without_strings() {
        let catalog = SignatureCatalog {
            version: "t".into(),
            signatures: vec![FunctionSignature::new("empty", Vec::<String>::new(), "")],
        };
        assert!(matches!(catalog.validate(), Err(CatalogError::NoStrings(name)) if name == "empty"));
    }
}
