use std::path::{Path, PathBuf};

/// Files a run writes under its output directory.
///
/// Derived from the chosen directory only; it does *not* perform any IO. The
/// CLI creates the directory and writes the files.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    /// Full [`AnalysisReport`](crate::services::analysis::AnalysisReport).
    pub report_path: PathBuf,
    pub strings_path: PathBuf,
    pub matches_path: PathBuf,
    pub functions_path: PathBuf,
    pub parameters_path: PathBuf,
    /// SQLite run store.
    pub db_path: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            report_path: root.join("report.json"),
            strings_path: root.join("strings.json"),
            matches_path: root.join("matches.json"),
            functions_path: root.join("functions.json"),
            parameters_path: root.join("parameters.json"),
            db_path: root.join("fwmap.db"),
            root,
        }
    }

    /// Path relative to `root` when possible, for display.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        }
    }
}
