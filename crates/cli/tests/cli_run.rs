// Integration tests for `confdiff run` / `confdiff validate`.
//
// Each test builds a descriptor, a candidate CSV and a SQLite store in a
// temp dir and runs the built binary against them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rusqlite::Connection;
use tempfile::{tempdir, TempDir};

fn confdiff() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_confdiff"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    confdiff().args(args).output().expect("run confdiff")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Candidate area file plus a store whose row for 3201 has `store_name`.
fn esf_fixture(store_name: &str, extra: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("esf1.csv"), "GAFIDENT;NAAM;OPP_H\n3201;Polder;4\n").unwrap();

    let conn = Connection::open(dir.path().join("store.db")).unwrap();
    conn.execute_batch("CREATE TABLE esf1 (GAFIDENT INTEGER, NAAM TEXT, OPP_H INTEGER, data_set TEXT);")
        .unwrap();
    conn.execute(
        "INSERT INTO esf1 VALUES (3201, ?1, 4, 'v1')",
        [store_name],
    )
    .unwrap();

    let descriptor = dir.path().join("descriptor.toml");
    fs::write(
        &descriptor,
        format!(
            r#"
area = "3201"
area_name = "Polder"
config_type = "esf1"
data_set = "v1"

[files]
area = "esf1.csv"

[store]
path = "store.db"

[labels.value]
NAAM = "Name"
{extra}
"#
        ),
    )
    .unwrap();
    (dir, descriptor)
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn identical_configuration_exits_zero() {
    let (_dir, descriptor) = esf_fixture("Polder", "");
    let output = run(&["run", path_str(&descriptor)]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.starts_with("area 3201 (Polder), configuration esf1, data set v1\n"), "{out}");
    assert!(out.contains("area: no differences"), "{out}");
}

#[test]
fn differences_exit_one_with_translated_labels() {
    let (_dir, descriptor) = esf_fixture("Polder Oost", "");
    let output = run(&["run", path_str(&descriptor)]);

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("area: 1 difference\n"), "{out}");
    assert!(out.contains("  Name: \"Polder\" -> \"Polder Oost\"\n"), "{out}");
    // Differences are not an error message
    assert!(!stderr(&output).contains("error:"));
}

#[test]
fn json_output_is_single_document() {
    let (_dir, descriptor) = esf_fixture("Polder Oost", "");
    let output = run(&["run", path_str(&descriptor), "--json"]);

    assert_eq!(output.status.code(), Some(1));
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {e}\n{}", stdout(&output)));

    assert_eq!(val["has_differences"], true);
    assert_eq!(val["meta"]["area"], "3201");
    assert_eq!(val["meta"]["config_type"], "esf1");
    assert!(val["meta"]["run_at"].is_string());

    let first = &val["comparisons"][0];
    assert_eq!(first["kind"], "esf_area");
    assert_eq!(first["diff"]["shape"], "flat");
    assert_eq!(first["diff"]["entries"]["NAAM"]["candidate"], "Polder");
    assert_eq!(first["diff"]["entries"]["NAAM"]["current"], "Polder Oost");
    assert_eq!(first["summary"]["changed"], 1);
    assert_eq!(val["warnings"].as_array().map(Vec::len), Some(0));
}

#[test]
fn output_file_written_and_quiet_silences_stderr() {
    let (dir, descriptor) = esf_fixture("Polder", "");
    let out_path = dir.path().join("result.json");
    let output = run(&["run", path_str(&descriptor), "--output", path_str(&out_path), "--quiet"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).is_empty(), "stderr: {}", stderr(&output));
    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written["has_differences"], false);
}

#[test]
fn missing_candidate_file_warns_and_reports_current_only() {
    let (dir, descriptor) = esf_fixture("Polder", "");
    fs::remove_file(dir.path().join("esf1.csv")).unwrap();

    let output = run(&["run", path_str(&descriptor)]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("warning: configuration resource"), "{err}");
    assert!(err.contains("esf1.csv"), "{err}");
    assert!(stdout(&output).contains("Name: not present -> \"Polder\""));

    let quiet = run(&["run", path_str(&descriptor), "--quiet"]);
    assert_eq!(quiet.status.code(), Some(1));
    assert!(stderr(&quiet).is_empty());
}

#[test]
fn manual_labels_get_suffix() {
    let (_dir, descriptor) = esf_fixture("Polder", "\n[labels.manual]\nOPP_H = \"Surface\"\n");
    let dir = descriptor.parent().unwrap();
    fs::write(dir.join("esf1.csv"), "GAFIDENT;NAAM;OPP_H\n3201;Polder;5\n").unwrap();

    let output = run(&["run", path_str(&descriptor)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("  Surface (manual): 5 -> 4\n"), "{}", stdout(&output));
}

#[test]
fn verbose_logs_debug_lines_to_stderr() {
    let (_dir, descriptor) = esf_fixture("Polder", "");

    let plain = run(&["run", path_str(&descriptor)]);
    assert!(!stderr(&plain).contains("DEBUG"), "{}", stderr(&plain));

    let verbose = run(&["run", path_str(&descriptor), "-v"]);
    assert_eq!(verbose.status.code(), Some(0));
    let err = stderr(&verbose);
    assert!(err.contains("DEBUG"), "{err}");
    assert!(err.contains("loaded descriptor"), "{err}");
    assert!(err.contains("esf1.csv"), "{err}");
    // Logging never touches stdout
    assert!(!stdout(&verbose).contains("DEBUG"));
}

#[test]
fn rust_log_filter_enables_logging_without_flag() {
    let (_dir, descriptor) = esf_fixture("Polder", "");
    let output = confdiff()
        .env("RUST_LOG", "confdiff_io=debug")
        .args(["run", path_str(&descriptor)])
        .output()
        .expect("run confdiff");

    assert_eq!(output.status.code(), Some(0));
    let err = stderr(&output);
    assert!(err.contains("rows for data set 'v1'"), "{err}");
    assert!(!err.contains("loaded descriptor"), "{err}");
}

// ===========================================================================
// validate / error codes
// ===========================================================================

#[test]
fn validate_accepts_good_descriptor() {
    let (_dir, descriptor) = esf_fixture("Polder", "");
    let output = run(&["validate", path_str(&descriptor)]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("ok: area 3201 (esf1), comparisons: esf_area"));
}

#[test]
fn validate_lists_water_balance_comparisons() {
    let dir = tempdir().unwrap();
    let descriptor = dir.path().join("wb.toml");
    fs::write(&descriptor, "area = \"3201\"\nconfig_type = \"waterbalans\"\n").unwrap();

    let output = run(&["validate", path_str(&descriptor)]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("comparisons: wb_area, wb_bucket, wb_structure"));
    assert!(stderr(&output).contains("note: no buckets file configured"));
}

#[test]
fn invalid_descriptor_exits_three() {
    let dir = tempdir().unwrap();
    let descriptor = dir.path().join("bad.toml");
    fs::write(&descriptor, "area = \"3201\"\nconfig_type = \"esf 1; drop\"\n").unwrap();

    for cmd in ["run", "validate"] {
        let output = run(&[cmd, path_str(&descriptor)]);
        assert_eq!(output.status.code(), Some(3), "{cmd}: {}", stderr(&output));
        assert!(stderr(&output).contains("not a valid table name"));
    }
}

#[test]
fn unparseable_descriptor_exits_three() {
    let dir = tempdir().unwrap();
    let descriptor = dir.path().join("bad.toml");
    fs::write(&descriptor, "area = [\n").unwrap();
    let output = run(&["run", path_str(&descriptor)]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn missing_descriptor_is_usage_error() {
    let dir = tempdir().unwrap();
    let output = run(&["run", path_str(&dir.path().join("absent.toml"))]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn unknown_flag_is_usage_error() {
    let output = run(&["run", "--bogus"]);
    assert_eq!(output.status.code(), Some(2));
}
