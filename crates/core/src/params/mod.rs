//! Configuration parameters embedded as text in the image.
//!
//! Each rule is an independent byte regex over the whole image. Nothing here
//! assumes the text is valid UTF-8; captured values are ASCII by construction.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamCategory {
    FrequencyRange,
    CommandOption,
    DefaultFrequency,
    DefaultVoltage,
    DefaultTemperature,
    DefaultFan,
    VoltageLevel,
    SoftwareVersion,
}

impl ParamCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamCategory::FrequencyRange => "frequency_range",
            ParamCategory::CommandOption => "command_option",
            ParamCategory::DefaultFrequency => "default_frequency",
            ParamCategory::DefaultVoltage => "default_voltage",
            ParamCategory::DefaultTemperature => "default_temperature",
            ParamCategory::DefaultFan => "default_fan",
            ParamCategory::VoltageLevel => "voltage_level",
            ParamCategory::SoftwareVersion => "software_version",
        }
    }
}

impl std::fmt::Display for ParamCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParamCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frequency_range" => Ok(ParamCategory::FrequencyRange),
            "command_option" => Ok(ParamCategory::CommandOption),
            "default_frequency" => Ok(ParamCategory::DefaultFrequency),
            "default_voltage" => Ok(ParamCategory::DefaultVoltage),
            "default_temperature" => Ok(ParamCategory::DefaultTemperature),
            "default_fan" => Ok(ParamCategory::DefaultFan),
            "voltage_level" => Ok(ParamCategory::VoltageLevel),
            "software_version" => Ok(ParamCategory::SoftwareVersion),
            other => Err(format!("unknown parameter category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(i64),
    Range { min: i64, max: i64 },
    Text(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Range { min, max } => write!(f, "[{min}, {max}]"),
            ParamValue::Text(t) => f.write_str(t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParameter {
    pub category: ParamCategory,
    pub value: ParamValue,
    /// Offset of the first byte of the matched text.
    pub source_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamOptions {
    /// Accepted bounds for the low end of `range [lo, hi]`.
    pub range_low: (i64, i64),
    /// Accepted bounds for the high end.
    pub range_high: (i64, i64),
    pub option_prefix: String,
    /// Bytes before a `default` keyword searched for its subject.
    pub keyword_lookback: usize,
    pub voltage_level_max: i64,
}

impl Default for ParamOptions {
    fn default() -> Self {
        Self {
            range_low: (25, 100),
            range_high: (500, 1500),
            option_prefix: "--avalon10-".to_string(),
            keyword_lookback: 50,
            voltage_level_max: 100,
        }
    }
}

pub type ParamMap = BTreeMap<ParamCategory, Vec<ConfigParameter>>;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)range\s*\[\s*(\d+)\s*,\s*(\d+)\s*\]").expect("static regex")
});
static DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)default[:\s]+(\d+)").expect("static regex")
});
static VOLTAGE_LEVEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)voltage.level[^0-9\n\x00]*?(\d+)").expect("static regex")
});
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)cgminer (\d+\.\d+\.\d+)").expect("static regex")
});

/// Subject keywords for `default N`, checked in this order.
const DEFAULT_SUBJECTS: [(&str, ParamCategory); 4] = [
    ("freq", ParamCategory::DefaultFrequency),
    ("volt", ParamCategory::DefaultVoltage),
    ("temp", ParamCategory::DefaultTemperature),
    ("fan", ParamCategory::DefaultFan),
];

fn ascii(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap_or_default()
}

fn number(bytes: &[u8]) -> Option<i64> {
    ascii(bytes).parse().ok()
}

#[derive(Default)]
struct Collector {
    out: ParamMap,
}

impl Collector {
    /// Keep the first offset of each distinct value per category.
    fn push(&mut self, category: ParamCategory, value: ParamValue, offset: usize) {
        let bucket = self.out.entry(category).or_default();
        if bucket.iter().any(|p| p.value == value) {
            return;
        }
        bucket.push(ConfigParameter { category, value, source_offset: offset as u64 });
    }
}

/// Run every rule over `bytes`.
pub fn extract(bytes: &[u8], options: &ParamOptions) -> ParamMap {
    let mut found = Collector::default();

    for caps in RANGE_RE.captures_iter(bytes) {
        let (Some(lo), Some(hi)) = (number(&caps[1]), number(&caps[2])) else { continue };
        let (lo_min, lo_max) = options.range_low;
        let (hi_min, hi_max) = options.range_high;
        if (lo_min..=lo_max).contains(&lo) && (hi_min..=hi_max).contains(&hi) {
            let at = caps.get(0).map_or(0, |m| m.start());
            found.push(ParamCategory::FrequencyRange, ParamValue::Range { min: lo, max: hi }, at);
        }
    }

    if !options.option_prefix.is_empty() {
        let pattern = format!(r"(?-u){}([a-z0-9-]+)", regex::escape(&options.option_prefix));
        match Regex::new(&pattern) {
            Ok(option_re) => {
                for caps in option_re.captures_iter(bytes) {
                    let at = caps.get(0).map_or(0, |m| m.start());
                    let name = ascii(&caps[1]).to_string();
                    found.push(ParamCategory::CommandOption, ParamValue::Text(name), at);
                }
            }
            Err(err) => tracing::warn!(prefix = %options.option_prefix, %err, "bad option prefix"),
        }
    }

    for caps in DEFAULT_RE.captures_iter(bytes) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(value) = number(&caps[1]) else { continue };
        let context = bytes[whole.start().saturating_sub(options.keyword_lookback)..whole.start()]
            .to_ascii_lowercase();
        let subject = DEFAULT_SUBJECTS
            .iter()
            .find(|(kw, _)| memchr::memmem::find(&context, kw.as_bytes()).is_some());
        if let Some((_, category)) = subject {
            found.push(*category, ParamValue::Number(value), whole.start());
        }
    }

    for caps in VOLTAGE_LEVEL_RE.captures_iter(bytes) {
        let Some(value) = number(&caps[1]) else { continue };
        if (0..=options.voltage_level_max).contains(&value) {
            let at = caps.get(0).map_or(0, |m| m.start());
            found.push(ParamCategory::VoltageLevel, ParamValue::Number(value), at);
        }
    }

    for caps in VERSION_RE.captures_iter(bytes) {
        let at = caps.get(0).map_or(0, |m| m.start());
        found.push(ParamCategory::SoftwareVersion, ParamValue::Text(ascii(&caps[1]).into()), at);
    }

    let total: usize = found.out.values().map(Vec::len).sum();
    tracing::info!(parameters = total, categories = found.out.len(), "parameter extraction done");
    found.out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(map: &ParamMap, category: ParamCategory) -> Vec<ParamValue> {
        map.get(&category).map(|v| v.iter().map(|p| p.value.clone()).collect()).unwrap_or_default()
    }

    #[test]
    fn default_is_classified_by_preceding_subject() {
        let text = b"fan speed percent, default: 80\0target temp (default 90)";
        let map = extract(text, &ParamOptions::default());
        assert_eq!(values(&map, ParamCategory::DefaultFan), vec![ParamValue::Number(80)]);
        // "fan" is still within the lookback, but "temp" is checked first.
        assert_eq!(values(&map, ParamCategory::DefaultTemperature), vec![ParamValue::Number(90)]);
        assert!(!map.contains_key(&ParamCategory::DefaultFrequency));
    }

    #[test]
    fn default_without_subject_is_dropped() {
        let mut text = vec![b'.'; 64];
        text.extend_from_slice(b"default 5");
        assert!(extract(&text, &ParamOptions::default()).is_empty());
    }

    #[test]
    fn voltage_level_outside_bounds_is_dropped() {
        let map = extract(b"voltage_level 40\0voltage-level 400", &ParamOptions::default());
        assert_eq!(values(&map, ParamCategory::VoltageLevel), vec![ParamValue::Number(40)]);
    }

    #[test]
    fn version_string_is_captured() {
        let map = extract(b"xx cgminer 4.11.1 yy", &ParamOptions::default());
        let params = &map[&ParamCategory::SoftwareVersion];
        assert_eq!(params[0].value, ParamValue::Text("4.11.1".into()));
        assert_eq!(params[0].source_offset, 3);
    }

    #[test]
    fn category_round_trips_through_its_name() {
        for cat in [ParamCategory::FrequencyRange, ParamCategory::DefaultFan] {
            assert_eq!(cat.as_str().parse::<ParamCategory>().unwrap(), cat);
        }
    }
}
