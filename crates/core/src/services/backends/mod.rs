//! Adapters for external disassemblers.
//!
//! A backend turns a byte range plus its load address into listing lines of
//! the form `address: raw_bytes  mnemonic  operands`. Everything after that
//! (parsing, classification, resolution) happens in [`crate::services::disasm`].

#[cfg(feature = "objdump-backend")]
pub mod objdump;

use std::collections::HashMap;

use thiserror::Error;

#[cfg(feature = "objdump-backend")]
pub use objdump::ObjdumpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Disassembler not available: {0}")]
    Unavailable(String),
    #[error("Disassembler timed out after {0}s")]
    Timeout(u64),
    #[error("Disassembler failed: {0}")]
    Failed(String),
}

/// External disassembly service. Implementations must be stateless per call so
/// ranges can be disassembled from several worker threads at once.
pub trait DisassemblyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tool version string, if the tool can report one.
    fn version(&self) -> Option<String> {
        None
    }

    /// Listing lines for `bytes` loaded at `base_address`, in address order.
    fn disassemble(&self, bytes: &[u8], base_address: u64) -> Result<Vec<String>, BackendError>;
}

/// Backend used when no disassembler is configured. Every range fails, so a
/// run still yields strings, matches and parameters.
pub struct NullBackend;

impl DisassemblyBackend for NullBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn disassemble(&self, _bytes: &[u8], _base_address: u64) -> Result<Vec<String>, BackendError> {
        Err(BackendError::Unavailable("no disassembly backend configured".into()))
    }
}

/// Backends selectable by name.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DisassemblyBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self { backends: HashMap::new() }
    }

    pub fn register<B: DisassemblyBackend + 'static>(&mut self, backend: B) -> &mut Self {
        self.backends.insert(backend.name().to_string(), Box::new(backend));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn DisassemblyBackend> {
        self.backends.get(name).map(|b| &**b)
    }

    /// Sorted backend names for help and error messages.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.backends.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Registry with every compiled-in backend, configured from `settings`.
pub fn default_backend_registry(settings: &crate::config::BackendSettings) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(NullBackend);
    #[cfg(feature = "objdump-backend")]
    {
        registry.register(ObjdumpBackend::from_settings(settings));
    }
    #[cfg(not(feature = "objdump-backend"))]
    let _ = settings;
    registry
}
