use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::tempdir;

mod common;

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

#[test]
fn backends_lists_null_backend() {
    let output = cargo_bin_cmd!("fwmap").arg("backends").arg("--json").assert().success();
    let body = stdout_json(output.get_output());
    let names: Vec<&str> =
        body.as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"none"));
}

#[test]
fn catalog_prints_builtin_signatures() {
    cargo_bin_cmd!("fwmap")
        .arg("catalog")
        .assert()
        .success()
        .stdout(contains("cgminer-4.11-k210"))
        .stdout(contains("avalon10_init"));
}

#[test]
fn strings_json_reports_offsets() {
    let temp = tempdir().unwrap();
    let fw = common::write_firmware(temp.path());
    let output = cargo_bin_cmd!("fwmap").arg("strings").arg(&fw).arg("--json").assert().success();
    let body = stdout_json(output.get_output());
    let first = &body.as_array().unwrap()[0];
    assert_eq!(first["start_offset"], 2);
    assert_eq!(first["text"], "avalon10_init");
}

#[test]
fn params_prints_categories() {
    let temp = tempdir().unwrap();
    let fw = common::write_firmware(temp.path());
    cargo_bin_cmd!("fwmap")
        .arg("params")
        .arg(&fw)
        .assert()
        .success()
        .stdout(contains("frequency_range:"))
        .stdout(contains("[25, 800]"))
        .stdout(contains("software_version:"));
}

#[test]
fn analyze_without_disassembler_writes_partial_run() {
    let temp = tempdir().unwrap();
    let fw = common::write_firmware(temp.path());
    let out = temp.path().join("out");

    let output = cargo_bin_cmd!("fwmap")
        .arg("analyze")
        .arg(&fw)
        .arg("--backend")
        .arg("none")
        .arg("--out")
        .arg(&out)
        .arg("--json")
        .assert()
        .success();
    let report = stdout_json(output.get_output());
    assert!(report["diagnostics"]["skipped_ranges"].as_u64().unwrap() > 0);
    assert_eq!(report["functions"].as_array().unwrap().len(), 0);
    assert_eq!(report["matches"][0]["signature_name"], "avalon10_init");

    for name in ["report.json", "strings.json", "matches.json", "functions.json", "parameters.json"]
    {
        assert!(out.join(name).is_file(), "missing {name}");
    }

    let db = out.join("fwmap.db");
    let output =
        cargo_bin_cmd!("fwmap").arg("runs").arg("--db").arg(&db).arg("--json").assert().success();
    let runs = stdout_json(output.get_output());
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["firmware"], "fw.bin");
    assert_eq!(runs[0]["status"], "partial");
    assert_eq!(runs[0]["backend"], "none");

    cargo_bin_cmd!("fwmap")
        .arg("show-run")
        .arg("--db")
        .arg(&db)
        .arg("--firmware")
        .arg("fw.bin")
        .assert()
        .success()
        .stdout(contains("avalon10_init"));
}

#[test]
fn analyze_no_store_skips_database() {
    let temp = tempdir().unwrap();
    let fw = common::write_firmware(temp.path());
    let out = temp.path().join("out");

    cargo_bin_cmd!("fwmap")
        .arg("analyze")
        .arg(&fw)
        .arg("--backend")
        .arg("none")
        .arg("--out")
        .arg(&out)
        .arg("--no-store")
        .assert()
        .success()
        .stdout(contains("Status: partial"));
    assert!(out.join("report.json").is_file());
    assert!(!out.join("fwmap.db").exists());
}

#[test]
fn missing_firmware_fails_with_context() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("fwmap")
        .arg("strings")
        .arg(temp.path().join("absent.bin"))
        .assert()
        .failure()
        .stderr(contains("Failed to open firmware image"));
}

#[test]
fn unknown_backend_is_rejected() {
    let temp = tempdir().unwrap();
    let fw = common::write_firmware(temp.path());
    cargo_bin_cmd!("fwmap")
        .arg("analyze")
        .arg(&fw)
        .arg("--backend")
        .arg("bogus")
        .arg("--out")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(contains("Backend 'bogus' not found"));
}

#[test]
fn runs_requires_existing_store() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("fwmap")
        .arg("runs")
        .arg("--db")
        .arg(temp.path().join("fwmap.db"))
        .assert()
        .failure()
        .stderr(contains("Run store not found"));
}
