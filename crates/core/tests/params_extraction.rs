use fwmap_core::params::{extract, ParamCategory, ParamOptions, ParamValue};

fn firmware_text() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\0Set frequency range [25, 800] MHz\0");
    bytes.extend_from_slice(b"\0bogus range [3,9000]\0");
    bytes.extend_from_slice(b"\0--avalon10-freq\0--avalon10-voltage-level\0--avalon10-freq\0");
    bytes.extend_from_slice(b"\0frequency in MHz, default: 600\0");
    bytes.extend_from_slice(&[0xff; 64]);
    bytes.extend_from_slice(b"\0cgminer 4.11.1\0");
    bytes
}

#[test]
fn frequency_ranges_respect_bounds() {
    let found = extract(&firmware_text(), &ParamOptions::default());
    let ranges = &found[&ParamCategory::FrequencyRange];
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].value, ParamValue::Range { min: 25, max: 800 });
    assert_eq!(ranges[0].source_offset, 15);
}

#[test]
fn duplicate_options_collapse_to_first_offset() {
    let bytes = firmware_text();
    let found = extract(&bytes, &ParamOptions::default());
    let options: Vec<String> =
        found[&ParamCategory::CommandOption].iter().map(|p| p.value.to_string()).collect();
    assert_eq!(options, vec!["freq", "voltage-level"]);

    let first = found[&ParamCategory::CommandOption][0].source_offset as usize;
    assert_eq!(&bytes[first..first + 15], b"--avalon10-freq");
}

#[test]
fn keyword_default_and_version_are_extracted() {
    let found = extract(&firmware_text(), &ParamOptions::default());
    assert_eq!(found[&ParamCategory::DefaultFrequency][0].value, ParamValue::Number(600));
    assert_eq!(
        found[&ParamCategory::SoftwareVersion][0].value,
        ParamValue::Text("4.11.1".into())
    );
}

#[test]
fn custom_option_prefix_and_bounds() {
    let options = ParamOptions {
        option_prefix: "--bitmain-".into(),
        range_low: (1, 10),
        range_high: (5000, 10000),
        ..ParamOptions::default()
    };
    let found = extract(b"--bitmain-fan range [3,9000]", &options);
    assert_eq!(found[&ParamCategory::CommandOption][0].value, ParamValue::Text("fan".into()));
    assert_eq!(found[&ParamCategory::FrequencyRange][0].value, ParamValue::Range { min: 3, max: 9000 });
}

#[test]
fn nothing_found_in_noise() {
    assert!(extract(&[0xa5u8; 512], &ParamOptions::default()).is_empty());
}
