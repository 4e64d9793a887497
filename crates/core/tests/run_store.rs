use std::collections::BTreeSet;

use fwmap_core::db::{RunMetadata, RunStatus, RunStore, StoreError, CURRENT_SCHEMA_VERSION};
use fwmap_core::model::{FunctionSummary, SignatureMatch};
use fwmap_core::params::{ConfigParameter, ParamCategory, ParamValue};
use fwmap_core::services::analysis::{AnalysisReport, BackendInfo};
use rusqlite::Connection;
use tempfile::tempdir;

fn report() -> AnalysisReport {
    let mut report = AnalysisReport {
        backend: BackendInfo { name: "objdump".into(), version: Some("2.42".into()) },
        ..AnalysisReport::default()
    };
    report.matches = vec![
        SignatureMatch {
            signature_name: "avalon10_init".into(),
            candidate_offset: 0x1000,
            confidence: 1.0,
            source_hint: "driver-avalon10.c".into(),
        },
        SignatureMatch {
            signature_name: "uart_send".into(),
            candidate_offset: 0x40,
            confidence: 0.5,
            source_hint: String::new(),
        },
    ];
    report.functions = vec![FunctionSummary {
        name: "avalon10_init".into(),
        start: 0x0ff0,
        end: 0x1020,
        address: 0x8000_0ff0,
        instructions: Vec::new(),
        call_targets: BTreeSet::from([0x8000_2000]),
        data_references: BTreeSet::from([0x1000, 0x1050]),
    }];
    report.parameters.insert(
        ParamCategory::FrequencyRange,
        vec![ConfigParameter {
            category: ParamCategory::FrequencyRange,
            value: ParamValue::Range { min: 25, max: 800 },
            source_offset: 0x2000,
        }],
    );
    report.parameters.insert(
        ParamCategory::CommandOption,
        vec![ConfigParameter {
            category: ParamCategory::CommandOption,
            value: ParamValue::Text("freq".into()),
            source_offset: 0x2100,
        }],
    );
    report.diagnostics.skipped_ranges = 3;
    report
}

fn metadata(firmware: &str, status: RunStatus) -> RunMetadata {
    let mut meta = RunMetadata::start(firmware, Some("abc123".into()), "cgminer-4.11-k210");
    meta.finish(status);
    meta
}

#[test]
fn fresh_store_is_at_current_schema() {
    let store = RunStore::open_in_memory().unwrap();
    let version: i32 =
        store.connection().query_row("PRAGMA user_version;", [], |row| row.get(0)).unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
    assert!(store.list_runs(None).unwrap().is_empty());
}

#[test]
fn recorded_run_round_trips_headline_and_details() {
    let store = RunStore::open_in_memory().unwrap();
    let id = store.record_run(&metadata("fw.bin", RunStatus::Partial), &report()).unwrap();

    let runs = store.list_runs(None).unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.id, id);
    assert_eq!(run.firmware, "fw.bin");
    assert_eq!(run.backend, "objdump");
    assert_eq!(run.backend_version.as_deref(), Some("2.42"));
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!((run.match_count, run.function_count, run.skipped_ranges), (2, 1, 3));

    let matches = store.load_matches(id).unwrap();
    assert_eq!(matches, report().matches);

    let functions = store.load_functions(id).unwrap();
    assert_eq!(functions, report().functions);

    let params = store.load_parameters(id).unwrap();
    assert_eq!(params.len(), 2);
    assert!(params
        .iter()
        .any(|p| p.category == ParamCategory::FrequencyRange
            && p.value == ParamValue::Range { min: 25, max: 800 }));
}

#[test]
fn runs_filter_by_firmware_and_latest_wins() {
    let store = RunStore::open_in_memory().unwrap();
    let first = store.record_run(&metadata("a.bin", RunStatus::Succeeded), &report()).unwrap();
    store.record_run(&metadata("b.bin", RunStatus::Succeeded), &report()).unwrap();
    let third = store.record_run(&metadata("a.bin", RunStatus::Partial), &report()).unwrap();

    let a_runs = store.list_runs(Some("a.bin")).unwrap();
    assert_eq!(a_runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first, third]);
    assert_eq!(store.latest_run_id("a.bin").unwrap(), Some(third));
    assert_eq!(store.latest_run_id("missing.bin").unwrap(), None);
    assert!(store.load_matches(9999).unwrap().is_empty());
}

#[test]
fn store_on_disk_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fwmap.db");
    let id = {
        let store = RunStore::open(&path).unwrap();
        store.record_run(&metadata("fw.bin", RunStatus::Succeeded), &report()).unwrap()
    };
    let store = RunStore::open(&path).unwrap();
    assert_eq!(store.latest_run_id("fw.bin").unwrap(), Some(id));
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fwmap.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    }
    let err = RunStore::open(&path).unwrap_err();
    match err {
        StoreError::UnsupportedSchemaVersion { found, max_supported, .. } => {
            assert_eq!(found, 99);
            assert_eq!(max_supported, CURRENT_SCHEMA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}
