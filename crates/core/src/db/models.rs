use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Outcome of a run as recorded in the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every candidate range was analyzed.
    Succeeded,
    /// Some ranges were skipped; see the report diagnostics.
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "succeeded" => Ok(RunStatus::Succeeded),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Caller-supplied facts about a run that the report itself doesn't carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunMetadata {
    /// Display name, usually the firmware file name.
    pub firmware: String,
    pub firmware_hash: Option<String>,
    pub catalog_version: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: String,
}

impl RunMetadata {
    /// Metadata for a run starting now.
    pub fn start(
        firmware: impl Into<String>,
        firmware_hash: Option<String>,
        catalog_version: impl Into<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            firmware: firmware.into(),
            firmware_hash,
            catalog_version: catalog_version.into(),
            status: RunStatus::Succeeded,
            started_at: now.clone(),
            finished_at: now,
        }
    }

    /// Stamp the finish time and set the final status.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Utc::now().to_rfc3339();
    }
}

/// One row of the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub firmware: String,
    pub firmware_hash: Option<String>,
    pub backend: String,
    pub backend_version: Option<String>,
    pub catalog_version: String,
    pub status: RunStatus,
    pub match_count: i64,
    pub function_count: i64,
    pub skipped_ranges: i64,
    pub started_at: String,
    pub finished_at: String,
}
