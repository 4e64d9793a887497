use std::fs;
use std::path::{Path, PathBuf};

/// A small image with two candidate functions, one recognizable signature,
/// an option string, a frequency range and a version banner.
pub fn firmware_bytes() -> Vec<u8> {
    let mut bytes = vec![0x01, 0x11];
    bytes.extend_from_slice(b"avalon10_init\0device\0\0");
    bytes.extend_from_slice(&[0x82, 0x80]);
    bytes.extend_from_slice(&[0x41, 0x11, 0x01, 0x00, 0x82, 0x80]);
    bytes.extend_from_slice(b"\0--avalon10-freq\0");
    bytes.extend_from_slice(b"\0Set frequency range [25, 800] MHz\0");
    bytes.extend_from_slice(b"\0cgminer 4.11.1\0");
    bytes
}

pub fn write_firmware(dir: &Path) -> PathBuf {
    let path = dir.join("fw.bin");
    fs::write(&path, firmware_bytes()).unwrap();
    path
}
