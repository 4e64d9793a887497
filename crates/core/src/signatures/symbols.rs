//! Identifier families (`uart_*`, `avalon10_*`, ...) found verbatim in the image.

use once_cell::sync::Lazy;
use regex::bytes::{Regex, RegexBuilder};

use crate::model::SymbolReference;

/// Families seen in CGMiner builds on the Kendryte SDK.
pub const DEFAULT_SYMBOL_PATTERNS: &[&str] = &[
    r"avalon\d+_\w+",
    r"cgminer_\w+",
    r"miner_\w+",
    r"pool_\w+",
    r"sha\d*_\w+",
    r"lwip_\w+",
    r"freertos_\w+",
    r"k210_\w+",
    r"spi_\w+",
    r"gpio_\w+",
    r"uart_\w+",
    r"i2c_\w+",
    r"timer_\w+",
    r"plic_\w+",
    r"sysctl_\w+",
];

static DEFAULT_REGEXES: Lazy<Vec<Regex>> =
    Lazy::new(|| DEFAULT_SYMBOL_PATTERNS.iter().filter_map(|p| compile(p).ok()).collect());

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).unicode(false).build()
}

/// Run every pattern over `bytes`. Invalid patterns are skipped with a warning.
/// An empty pattern list selects [`DEFAULT_SYMBOL_PATTERNS`].
pub fn scan_symbol_references<S: AsRef<str>>(bytes: &[u8], patterns: &[S]) -> Vec<SymbolReference> {
    let custom: Vec<Regex>;
    let regexes: &[Regex] = if patterns.is_empty() {
        DEFAULT_REGEXES.as_slice()
    } else {
        custom = patterns
            .iter()
            .filter_map(|p| match compile(p.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = p.as_ref(), error = %e, "skipping invalid symbol pattern");
                    None
                }
            })
            .collect();
        &custom
    };

    let mut refs: Vec<SymbolReference> = regexes
        .iter()
        .flat_map(|re| re.find_iter(bytes))
        .map(|m| SymbolReference {
            offset: m.start() as u64,
            name: String::from_utf8_lossy(m.as_bytes()).into_owned(),
        })
        .collect();
    refs.sort();
    refs.dedup();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_find_family_names() {
        let refs = scan_symbol_references::<&str>(b"\0uart_send\0Avalon10_init\0", &[]);
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["uart_send", "Avalon10_init"]);
        assert_eq!(refs[0].offset, 1);
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let refs = scan_symbol_references(b"pool_active", &["pool_\\w+", "pool_active"]);
        assert_eq!(refs.len(), 1);
    }
}
