use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::Runtime;

use crate::config::BackendSettings;
use crate::services::backends::{BackendError, DisassemblyBackend};

pub const DEFAULT_OBJDUMP: &str = "riscv64-unknown-elf-objdump";

/// GNU objdump in raw-binary mode. Each call writes the range to a temp file
/// and runs the tool under a hard timeout; the child is killed on expiry.
pub struct ObjdumpBackend {
    tool: PathBuf,
    machine: String,
    timeout: Duration,
}

impl ObjdumpBackend {
    pub fn new(tool: impl Into<PathBuf>, machine: impl Into<String>, timeout: Duration) -> Self {
        Self { tool: tool.into(), machine: machine.into(), timeout }
    }

    /// Tool path precedence: settings, `FWMAP_OBJDUMP`, then [`DEFAULT_OBJDUMP`] on `PATH`.
    pub fn from_settings(settings: &BackendSettings) -> Self {
        let tool = settings.tool.clone().unwrap_or_else(resolve_objdump_path);
        Self::new(tool, settings.machine.clone(), Duration::from_secs(settings.timeout_secs))
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn runtime(&self) -> Result<Runtime, BackendError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::Failed(format!("failed to start runtime: {e}")))
    }

    fn run(&self, args: Vec<String>) -> Result<Vec<u8>, BackendError> {
        let runtime = self.runtime()?;
        let timeout = self.timeout;
        runtime.block_on(async {
            let child = Command::new(&self.tool)
                .args(&args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output();
            match tokio::time::timeout(timeout, child).await {
                Err(_) => Err(BackendError::Timeout(timeout.as_secs())),
                Ok(Err(e)) => Err(BackendError::Unavailable(format!(
                    "failed to spawn {}: {e}",
                    self.tool.display()
                ))),
                Ok(Ok(output)) if !output.status.success() => Err(BackendError::Failed(format!(
                    "{} exited with {}",
                    self.tool.display(),
                    output.status
                ))),
                Ok(Ok(output)) => Ok(output.stdout),
            }
        })
    }
}

impl DisassemblyBackend for ObjdumpBackend {
    fn name(&self) -> &'static str {
        "objdump"
    }

    fn version(&self) -> Option<String> {
        let stdout = self.run(vec!["--version".into()]).ok()?;
        let text = String::from_utf8_lossy(&stdout);
        text.lines().next().map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
    }

    fn disassemble(&self, bytes: &[u8], base_address: u64) -> Result<Vec<String>, BackendError> {
        let mut scratch = tempfile::NamedTempFile::new()
            .map_err(|e| BackendError::Failed(format!("failed to create temp file: {e}")))?;
        scratch
            .write_all(bytes)
            .and_then(|_| scratch.flush())
            .map_err(|e| BackendError::Failed(format!("failed to write temp file: {e}")))?;

        let args = vec![
            "-D".to_string(),
            "-b".to_string(),
            "binary".to_string(),
            "-m".to_string(),
            self.machine.clone(),
            format!("--adjust-vma=0x{base_address:x}"),
            scratch.path().display().to_string(),
        ];
        let stdout = self.run(args)?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn resolve_objdump_path() -> PathBuf {
    std::env::var_os("FWMAP_OBJDUMP").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_OBJDUMP))
}
