use fwmap_core::image::FirmwareImage;
use fwmap_core::strings::{extract, CrossReferenceIndex, ExtractOptions};

fn sample() -> Vec<u8> {
    let mut bytes = vec![0xffu8; 16];
    bytes.extend_from_slice(b"CGMiner 4.11.1\0");
    bytes.extend_from_slice(&[0x01, 0x11, 0x82, 0x80]);
    bytes.extend_from_slice(b"uart_send\0abc\0");
    bytes.extend_from_slice(b"uart_send\0");
    bytes.extend_from_slice(&[0xc3, 0x00]);
    bytes.extend_from_slice(b"--avalon10-freq");
    bytes
}

#[test]
fn records_are_ordered_and_point_at_their_bytes() {
    let bytes = sample();
    let options = ExtractOptions::default();
    let table = extract(&bytes, &options);

    assert!(!table.is_empty());
    let offsets: Vec<u64> = table.iter().map(|r| r.start_offset).collect();
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    for record in table.iter() {
        assert!(record.text.len() >= options.min_length);
        let start = record.start_offset as usize;
        assert_eq!(&bytes[start..start + record.text.len()], record.text.as_bytes());
        assert!(record.end_offset() as usize <= bytes.len());
    }
    assert!(table.iter().all(|r| r.text != "abc"));
    // Trailing run without a terminator is still reported.
    assert_eq!(table.records.last().map(|r| r.text.as_str()), Some("--avalon10-freq"));
}

#[test]
fn index_groups_repeats_and_resolves_offsets() {
    let bytes = sample();
    let table = extract(&bytes, &ExtractOptions::default());
    let index = CrossReferenceIndex::build(&table.records);

    let uart = index.offsets("uart_send");
    assert_eq!(uart.len(), 2);
    for &offset in uart {
        assert!(index.contains_offset(offset));
        assert_eq!(index.text_at(offset), Some("uart_send"));
    }
    assert_eq!(index.search("cgminer").len(), 1);
    let total: usize = index.iter().map(|(_, offs)| offs.len()).sum();
    assert_eq!(total, table.len());
}

#[test]
fn landmarks_report_first_occurrence() {
    let image = FirmwareImage::from_bytes(sample());
    let found = image.landmarks(&["CGMiner", "uart_send", "FreeRTOS"]);
    assert_eq!(found.get("CGMiner"), Some(&16));
    assert_eq!(found.get("uart_send"), Some(&35));
    assert!(!found.contains_key("FreeRTOS"));
}
