use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DOC: &str = "# Math\n\nIntro.\n\n## Adding\n\nUse `add` to sum numbers.\n";

fn docdrift(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docdrift").unwrap();
    cmd.arg("--path").arg(dir).env_remove("RUST_LOG");
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("docs")).unwrap();
    fs::write(
        dir.path().join("src/math.ts"),
        "export function add(a: number, b: number): number {\n  return a + b;\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("docs/math.md"), DOC).unwrap();
    dir
}

fn detect_json(dir: &Path) -> serde_json::Value {
    let output = docdrift(dir)
        .args(["-o", "json", "detect"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("docdrift")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("callgraph"))
        .stdout(predicate::str::contains("snapshot"));
}

#[test]
fn test_detect_requires_init() {
    let dir = project();
    docdrift(dir.path())
        .arg("detect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_init_twice_requires_force() {
    let dir = project();
    docdrift(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized DocDrift"));

    assert!(dir.path().join(".docdrift/config.toml").is_file());
    assert!(dir.path().join(".docdrift/docdrift.db").is_file());

    docdrift(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_unchanged_project_has_no_drift() {
    let dir = project();
    docdrift(dir.path()).arg("init").assert().success();

    docdrift(dir.path())
        .arg("detect")
        .assert()
        .success()
        .stdout(predicate::str::contains("No documentation drift detected"));
}

#[test]
fn test_detect_without_snapshot_creates_baseline() {
    let dir = project();
    docdrift(dir.path()).arg("init").assert().success();
    fs::remove_dir_all(dir.path().join(".docdrift/snapshots")).unwrap();

    let json = detect_json(dir.path());
    assert_eq!(json["outcome"], "baseline");

    let snapshots = fs::read_dir(dir.path().join(".docdrift/snapshots")).unwrap().count();
    assert_eq!(snapshots, 1);
}

#[test]
fn test_signature_change_is_reported_and_applied() {
    let dir = project();
    docdrift(dir.path()).arg("init").assert().success();

    fs::write(
        dir.path().join("src/math.ts"),
        "export function add(a: number, b: number, c: number): number {\n  return a + b + c;\n}\n",
    )
    .unwrap();

    let json = detect_json(dir.path());
    assert_eq!(json["outcome"], "compared");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["severity"], "critical");
    assert_eq!(results[0]["drifts"][0]["diff"]["symbolName"], "add");

    let id = results[0]["suggestions"][0]["id"].as_str().unwrap().to_string();

    docdrift(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(&id[..8]));

    docdrift(dir.path())
        .args(["apply", &id[..8], "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+> **Updated:**"));
    assert_eq!(fs::read_to_string(dir.path().join("docs/math.md")).unwrap(), DOC);

    docdrift(dir.path()).args(["apply", &id]).assert().success();
    let updated = fs::read_to_string(dir.path().join("docs/math.md")).unwrap();
    assert!(updated.contains("> **Updated:** `add` changed"));
    assert!(updated.starts_with("# Math\n\nIntro.\n"));

    docdrift(dir.path())
        .args(["apply", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already Applied"));
}

#[test]
fn test_ignore_unknown_suggestion_fails() {
    let dir = project();
    docdrift(dir.path()).arg("init").assert().success();

    docdrift(dir.path())
        .args(["ignore", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Suggestion not found"));
}

#[test]
fn test_extract_json() {
    let dir = project();
    let output = docdrift(dir.path())
        .args(["-o", "json", "extract", "src/math.ts"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["language"], "typescript");
    assert_eq!(json["functions"][0]["name"], "add");
    assert_eq!(json["functions"][0]["isExported"], true);
    assert_eq!(json["functions"][0]["parameters"].as_array().unwrap().len(), 2);
}

#[test]
fn test_callgraph_across_files() {
    let dir = project();
    fs::write(
        dir.path().join("src/app.ts"),
        "import { add } from './math';\n\nexport function total(xs: number[]): number {\n  return add(xs[0], xs[1]);\n}\n",
    )
    .unwrap();

    docdrift(dir.path())
        .args(["callgraph", "total"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total(xs"))
        .stdout(predicate::str::contains("  add("))
        .stdout(predicate::str::contains("2 file(s) analyzed"));
}

#[test]
fn test_callgraph_missing_symbol_is_unresolved() {
    let dir = project();
    docdrift(dir.path())
        .args(["-o", "json", "callgraph", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unresolvedCalls\""))
        .stdout(predicate::str::contains("\"missing\""));
}
