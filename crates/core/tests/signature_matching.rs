use fwmap_core::image::FirmwareImage;
use fwmap_core::model::{FunctionSignature, StringRecord};
use fwmap_core::signatures::{cluster_offsets, match_all, match_signature, MatchOptions};
use fwmap_core::strings::{extract, CrossReferenceIndex, ExtractOptions};

fn three_part_signature() -> FunctionSignature {
    FunctionSignature::new("spread", ["alpha", "beta", "gamma"], "spread.c")
}

fn spread_index() -> CrossReferenceIndex {
    CrossReferenceIndex::build(&[
        StringRecord::new(100, "alpha"),
        StringRecord::new(200, "beta"),
        StringRecord::new(5000, "gamma"),
    ])
}

#[test]
fn clusters_split_on_gaps_wider_than_window() {
    let clusters = cluster_offsets(&[100, 200, 5000], 4096);
    assert_eq!(clusters, vec![vec![100, 200], vec![5000]]);
}

#[test]
fn confidence_is_cluster_share_of_substrings() {
    let matches = match_signature(&three_part_signature(), &spread_index(), &MatchOptions::default());
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].candidate_offset, 100);
    assert!((matches[0].confidence - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(matches[1].candidate_offset, 5000);
    assert!((matches[1].confidence - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(matches[0].source_hint, "spread.c");
}

#[test]
fn ranking_is_capped_by_max_candidates() {
    let options = MatchOptions { max_candidates: 1, ..MatchOptions::default() };
    let matches = match_signature(&three_part_signature(), &spread_index(), &options);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].candidate_offset, 100);
}

#[test]
fn absent_substrings_give_no_match() {
    let sig = FunctionSignature::new("nothing", ["zeta", "omega"], "");
    assert!(match_signature(&sig, &spread_index(), &MatchOptions::default()).is_empty());
    assert!(match_all(&[sig], &spread_index(), &MatchOptions::default()).is_empty());
}

#[test]
fn match_all_requires_confidence_above_threshold() {
    let strict = MatchOptions { threshold: 2.0 / 3.0, ..MatchOptions::default() };
    assert!(match_all(&[three_part_signature()], &spread_index(), &strict).is_empty());

    let lenient = MatchOptions { threshold: 0.5, ..MatchOptions::default() };
    let matched = match_all(&[three_part_signature()], &spread_index(), &lenient);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].candidate_offset, 100);
}

#[test]
fn duplicate_hits_count_toward_cluster_size() {
    // Both substrings hit the same key, so the cluster holds the offset twice.
    let index = CrossReferenceIndex::build(&[StringRecord::new(64, "avalon10_init")]);
    let sig = FunctionSignature::new("avalon10_init", ["avalon10", "init"], "");
    let matches = match_signature(&sig, &index, &MatchOptions::default());
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].confidence, 1.0);
}

#[test]
fn finds_function_in_synthetic_image() {
    let mut bytes = vec![0u8; 64 * 1024];
    bytes[0x1000..0x1000 + 13].copy_from_slice(b"avalon10_init");
    bytes[0x1050..0x1050 + 6].copy_from_slice(b"device");
    let image = FirmwareImage::from_bytes(bytes);

    let table = extract(image.bytes(), &ExtractOptions::default());
    let index = CrossReferenceIndex::build(&table.records);
    let sig = FunctionSignature::new("avalon10_init", ["avalon10", "init", "device"], "driver-avalon10.c");

    let matched = match_all(&[sig], &index, &MatchOptions::default());
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].signature_name, "avalon10_init");
    assert_eq!(matched[0].confidence, 1.0);
    // Cluster is [0x1000, 0x1000, 0x1050]; its middle element is 0x1000.
    assert_eq!(matched[0].candidate_offset, 0x1000);
}
