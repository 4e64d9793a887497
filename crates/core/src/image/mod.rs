//! Read-only firmware image shared by every analysis stage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use memchr::memmem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic word at offset 0 of a kflash-packaged image.
pub const KFLASH_MAGIC: u32 = 0x00B9_DB00;

/// Reasons the image itself cannot be used. These are the only fatal errors
/// of a run.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Firmware image not found at {0}")]
    Missing(PathBuf),
    #[error("Failed to read firmware image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Firmware image {0} is empty")]
    Empty(PathBuf),
}

/// Fields of the 12-byte kflash header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KflashHeader {
    pub magic: u32,
    pub flags: u32,
    pub checksum: u32,
    pub valid: bool,
}

/// Immutable in-memory copy of the firmware.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
    path: Option<PathBuf>,
}

impl FirmwareImage {
    /// Load the whole file into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ImageError::Missing(path.to_path_buf()));
        }
        let bytes = fs::read(path)
            .map_err(|source| ImageError::Read { path: path.to_path_buf(), source })?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), size = bytes.len(), "loaded firmware image");
        Ok(Self { bytes, path: Some(path.to_path_buf()) })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into(), path: None }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bytes in `[start, end)`, or `None` when the range leaves the image.
    pub fn slice(&self, start: u64, end: u64) -> Option<&[u8]> {
        let start = usize::try_from(start).ok()?;
        let end = usize::try_from(end).ok()?;
        if start > end || end > self.bytes.len() {
            return None;
        }
        Some(&self.bytes[start..end])
    }

    /// First offset of `needle`.
    pub fn find(&self, needle: &[u8]) -> Option<u64> {
        if needle.is_empty() {
            return None;
        }
        memmem::find(&self.bytes, needle).map(|pos| pos as u64)
    }

    /// Parse the kflash header. `None` when the image is shorter than 12 bytes.
    pub fn header(&self) -> Option<KflashHeader> {
        let word = |at: usize| -> Option<u32> {
            let raw: [u8; 4] = self.bytes.get(at..at + 4)?.try_into().ok()?;
            Some(u32::from_le_bytes(raw))
        };
        let magic = word(0)?;
        Some(KflashHeader { magic, flags: word(4)?, checksum: word(8)?, valid: magic == KFLASH_MAGIC })
    }

    /// First offset of each key string that occurs in the image.
    pub fn landmarks<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, u64> {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.find(name.as_bytes()).map(|offset| (name.to_string(), offset))
            })
            .collect()
    }
}
