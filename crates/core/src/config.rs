//! Run configuration.
//!
//! Every field has a default so a config file only needs the keys it changes.
//! Nothing here refers to a fixed filesystem location; callers pass paths in.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boundaries::BoundaryOptions;
use crate::params::ParamOptions;
use crate::services::disasm::DisasmOptions;
use crate::signatures::MatchOptions;
use crate::strings::ExtractOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which disassembler to use and how to invoke it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Registry name: `objdump` or `none`.
    pub name: String,
    /// Explicit tool path; otherwise resolved from the environment.
    pub tool: Option<PathBuf>,
    /// objdump `-m` machine.
    pub machine: String,
    /// Per-range timeout.
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            name: "objdump".to_string(),
            tool: None,
            machine: "riscv:rv64".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Strings reported to consumers: longer runs, whitespace allowed.
    pub report_strings: ExtractOptions,
    /// Strings indexed for signature matching and operand resolution.
    pub index_strings: ExtractOptions,
    pub matching: MatchOptions,
    pub boundaries: BoundaryOptions,
    pub disasm: DisasmOptions,
    pub params: ParamOptions,
    pub backend: BackendSettings,
    /// Range-analysis threads; `0` picks the available parallelism.
    pub workers: usize,
    /// Key strings whose first offset is reported.
    pub landmarks: Vec<String>,
    /// Identifier families to look for; empty uses the built-in set.
    pub symbol_patterns: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            report_strings: ExtractOptions::new(6, true),
            index_strings: ExtractOptions::new(4, false),
            matching: MatchOptions::default(),
            boundaries: BoundaryOptions::default(),
            disasm: DisasmOptions::default(),
            params: ParamOptions::default(),
            backend: BackendSettings::default(),
            workers: 0,
            landmarks: ["CGMiner", "avalon10", "FreeRTOS", "lwIP", "K210"]
                .into_iter()
                .map(String::from)
                .collect(),
            symbol_patterns: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML or JSON (by extension) and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: AnalysisConfig = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_slice(&body)?
        } else {
            serde_yaml::from_slice(&body)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_strings.min_length == 0 || self.index_strings.min_length == 0 {
            return Err(ConfigError::Invalid("string min_length must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.matching.threshold) {
            return Err(ConfigError::Invalid("matching.threshold must be within [0, 1]".into()));
        }
        if self.boundaries.prologues.is_empty() || self.boundaries.epilogues.is_empty() {
            return Err(ConfigError::Invalid("boundaries need prologue and epilogue patterns".into()));
        }
        if self
            .boundaries
            .prologues
            .iter()
            .chain(&self.boundaries.epilogues)
            .any(|p| p.width != 2 && p.width != 4)
        {
            return Err(ConfigError::Invalid("pattern width must be 2 or 4".into()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid("backend.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Worker count with `0` resolved against the host.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwmap.yaml");
        fs::write(&path, "workers: 2\nmatching:\n  proximity_window: 1024\n").unwrap();
        let cfg = AnalysisConfig::load(&path).unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.matching.proximity_window, 1024);
        assert_eq!(cfg.matching.threshold, 0.3);
        assert_eq!(cfg.index_strings.min_length, 4);
        assert_eq!(cfg.backend.timeout_secs, 30);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut cfg = AnalysisConfig::default();
        cfg.matching.threshold = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
