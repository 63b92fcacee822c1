use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const HEADER: &str = "EMPLOYEE,NAME,AMOUNT,VOTE,MINISTRY,DEDUCTION,VENDOR NAME\n";

fn payrecon(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("payrecon").unwrap();
    cmd.env("HOME", home).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("{HEADER}{body}")).unwrap();
    path.to_string_lossy().to_string()
}

fn only_subdir(dir: &Path) -> std::path::PathBuf {
    let mut entries: Vec<_> = std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(entries.len(), 1);
    entries.remove(0)
}

#[test]
fn test_reconcile_prints_counts_and_saves_dated_files() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write(tmp.path(), "file_463.csv", "1,Jane,\"1,000.00\",V1,Health,D463,Acme\n2,Joe,200,V1,Health,D463,Acme\n");
    let b = write(tmp.path(), "file_322.csv", "1,Jane,500,V9,Works,D322,Beta\n3,Ann,75,V9,Works,D322,Beta\n");
    let out = tmp.path().join("exports");

    payrecon(tmp.path())
        .args(["reconcile", &a, &b, "--out-dir", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Number of records in File 463: 2"))
        .stdout(predicate::str::contains("Number of records in File 322: 2"))
        .stdout(predicate::str::contains("Reconciliation complete!"))
        .stdout(predicate::str::contains("1,500.00"))
        .stdout(predicate::str::contains("2 unmatched records found!"));

    let day = only_subdir(&out);
    let mut names: Vec<String> = std::fs::read_dir(&day)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("matched_") && names[0].ends_with(".csv"));
    assert!(names[1].starts_with("unmatched_") && names[1].ends_with(".csv"));

    let matched = std::fs::read_to_string(day.join(&names[0])).unwrap();
    assert_eq!(
        matched,
        "EMPLOYEE,NAME,FINAL AMOUNT,DEDUCTION CODE 463,VENDOR NAME (463),Amount (463),DEDUCTION CODE 322,VENDOR NAME (322),Amount (322)\n\
         1,Jane,1500.00,D463,Acme,1000.00,D322,Beta,500.00\n"
    );
    let unmatched = std::fs::read_to_string(day.join(&names[1])).unwrap();
    assert_eq!(
        unmatched,
        "EMPLOYEE,NAME,AMOUNT,VOTE,MINISTRY,DEDUCTION,VENDOR NAME\n\
         2,Joe,200.00,V1,Health,D463,Acme\n\
         3,Ann,75.00,V9,Works,D322,Beta\n"
    );
}

#[test]
fn test_reconcile_writes_downloads_without_saving() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write(tmp.path(), "a.csv", "1,Jane,10,V,M,D,X\n");
    let b = write(tmp.path(), "b.csv", "1,Jane,5,V,M,D,Y\n");
    let downloads = tmp.path().join("downloads");

    payrecon(tmp.path())
        .args(["reconcile", &a, &b, "--no-save", "--download-dir", downloads.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("reconciled_data.xlsx"));

    assert!(downloads.join("reconciled_data.xlsx").exists());
    // nothing unmatched, so no unmatched download
    assert!(!downloads.join("unmatched_records.csv").exists());
    assert!(!tmp.path().join("Documents").join("payrecon").exists());
}

#[test]
fn test_duplicate_employee_is_rejected_until_policy_given() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write(tmp.path(), "a.csv", "1,Jane,10,V,M,D,X\n1,Jane,15,V,M,D,X\n");
    let b = write(tmp.path(), "b.csv", "1,Jane,5,V,M,D,Y\n");

    payrecon(tmp.path())
        .args(["reconcile", &a, &b, "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EMPLOYEE '1' appears 2 times"))
        .stderr(predicate::str::contains("Fix the file"));

    payrecon(tmp.path())
        .args(["reconcile", &a, &b, "--no-save", "--duplicates", "sum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("30.00"));
}

#[test]
fn test_missing_column_fails_with_schema_error() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a.csv");
    std::fs::write(&a, "EMPLOYEE,NAME\n1,Jane\n").unwrap();
    let b = write(tmp.path(), "b.csv", "1,Jane,5,V,M,D,Y\n");

    payrecon(tmp.path())
        .args(["reconcile", a.to_str().unwrap(), &b, "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a.csv: missing required column 'AMOUNT'"));
}

#[test]
fn test_unsupported_file_type() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a.json");
    std::fs::write(&a, "{}").unwrap();
    let b = write(tmp.path(), "b.csv", "1,Jane,5,V,M,D,Y\n");

    payrecon(tmp.path())
        .args(["reconcile", a.to_str().unwrap(), &b, "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type '.json'"));
}

#[test]
fn test_init_then_status() {
    let tmp = tempfile::tempdir().unwrap();
    let exports = tmp.path().join("exports");

    payrecon(tmp.path())
        .args(["init", "--export-dir", exports.to_str().unwrap(), "--left-label", "HR", "--duplicates", "first"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings saved"));
    assert!(tmp.path().join(".config").join("payrecon").join("settings.json").exists());

    payrecon(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("HR / 322"))
        .stdout(predicate::str::contains("Duplicates:  first"))
        .stdout(predicate::str::contains("No saved reconciliations yet."));
}

#[test]
fn test_completions() {
    let tmp = tempfile::tempdir().unwrap();
    payrecon(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("payrecon"));
}
