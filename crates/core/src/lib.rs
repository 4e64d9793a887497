//! fwmap-core
//!
//! Layout reconstruction for raw firmware images that carry no symbols or
//! debug metadata. Given the bytes, this crate recovers printable strings and
//! their offsets, ranks where known functions probably live, guesses function
//! boundaries from RISC-V prologue/epilogue encodings, turns an external
//! disassembler's listing into per-function call and data references, and
//! pulls configuration parameters out of embedded text.
//!
//! All substantive logic lives here so it is testable without the CLI.

pub mod boundaries;
pub mod config;
pub mod db;
pub mod image;
pub mod model;
pub mod params;
pub mod services;
pub mod signatures;
pub mod strings;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
