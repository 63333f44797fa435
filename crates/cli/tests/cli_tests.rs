// End-to-end tests for the assignrec binary.
//
// Each test builds a scratch directory with a config and CSV inputs, runs
// the binary, and checks exit code, stderr summary and written files.
//
// Run with: cargo test -p assignrec-cli --test cli_tests -- --nocapture

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn assignrec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_assignrec"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run assignrec")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

/// Assert stdout is a single, parseable JSON value.
fn single_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be valid JSON: {e}\nstdout:\n{stdout}"))
}

const BEFORE: &str = "\
task_id,rsrc_id,target_qty,act_qty,remain_qty
T1,R1,10,2,8
T1,R3,5,0,5
";

const AFTER: &str = "\
task_id,rsrc_id,target_qty,act_qty,remain_qty
 T1 ,R1,10,4,6
T1,R2,1,0,1
";

fn compare_config(dir: &Path) -> String {
    write(dir, "before.csv", BEFORE);
    write(dir, "after.csv", AFTER);
    write(
        dir,
        "weekly.toml",
        r#"
name = "weekly"

[compare]
before = "before.csv"
after = "after.csv"

[compare.output]
only_before = "only_before.csv"
only_after = "only_after.csv"
both = "both.csv"
changed = "changed.csv"
"#,
    )
}

// ===========================================================================
// compare
// ===========================================================================

#[test]
fn compare_writes_three_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let config = compare_config(dir.path());

    let output = assignrec(&["compare", &config]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let only_before = fs::read_to_string(dir.path().join("only_before.csv")).unwrap();
    assert_eq!(only_before, "task_id,rsrc_id,target_qty,act_qty,remain_qty\nT1,R3,5,0,5\n");
    let only_after = fs::read_to_string(dir.path().join("only_after.csv")).unwrap();
    assert!(only_after.contains("T1,R2,1,0,1"));
    let both = fs::read_to_string(dir.path().join("both.csv")).unwrap();
    assert!(both.starts_with("task_id,rsrc_id,target_qty_before,act_qty_before,remain_qty_before,target_qty_after"));
    assert!(both.contains("T1,R1,10,2,8,10,4,6"));

    let err = stderr(&output);
    assert!(err.contains("only in before: 1"), "stderr: {err}");
    assert!(err.contains("in both:        1"), "stderr: {err}");
    assert!(!dir.path().join("changed.csv").exists());
}

#[test]
fn compare_missing_output_dir_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "before.csv", BEFORE);
    write(dir.path(), "after.csv", AFTER);
    let config = write(
        dir.path(),
        "weekly.toml",
        r#"
[compare]
before = "before.csv"
after = "after.csv"

[compare.output]
only_before = "only_before.csv"
only_after = "nodir/only_after.csv"
both = "both.csv"
"#,
    );

    let output = assignrec(&["compare", &config]);
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("nodir"), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("only_before.csv").exists());
    assert!(!dir.path().join("both.csv").exists());
}

#[test]
fn compare_json_is_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let config = compare_config(dir.path());

    let output = assignrec(&["compare", &config, "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = single_json(&output);
    assert_eq!(val["meta"]["workflow"], "compare");
    assert_eq!(val["summary"]["only_in_a"], 1);
    assert_eq!(val["summary"]["only_in_b"], 1);
    assert_eq!(val["summary"]["in_both"], 1);
}

// ===========================================================================
// changes
// ===========================================================================

#[test]
fn changes_writes_changed_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let config = compare_config(dir.path());

    let output = assignrec(&["changes", &config, "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = single_json(&output);
    assert_eq!(val["summary"]["changed"], 1);
    assert_eq!(val["changed"][0]["key"], serde_json::json!(["T1", "R1"]));

    let changed = fs::read_to_string(dir.path().join("changed.csv")).unwrap();
    assert_eq!(changed.lines().count(), 2);
    assert!(changed.contains("\"act_qty, remain_qty\""), "changed: {changed}");
}

// ===========================================================================
// derive
// ===========================================================================

const ACTIVITY: &str = "\
Activity ID,Resource ID,Resource Type,Budgeted Units,Actual Units,Remaining Units,BOQ Item
T1,M1,Material,10,4,6,I1
T1,M2,Material,5,1,4,I1
T1,R2,Nonlabor,1,1,1,I1
T1,R9,Nonlabor,7,7,0,I9
T1,L1,Labor,8,8,0,
";

const NORMS: &str = "\
BOQ Item No.,Resource ID,Qty/Unit (Norms)
I1,R2,2
";

fn derive_config(dir: &Path, extra: &str) -> String {
    write(dir, "activity.csv", ACTIVITY);
    write(dir, "norms.csv", NORMS);
    write(
        dir,
        "plan.toml",
        &format!(
            r#"
name = "plan"

[derive]
activity = "activity.csv"
norms = "norms.csv"
output = "derived.csv"
{extra}

[columns.activity]
task_id = "Activity ID"
rsrc_id = "Resource ID"
rsrc_type = "Resource Type"
target_qty = "Budgeted Units"
act_qty = "Actual Units"
remain_qty = "Remaining Units"
item_id = "BOQ Item"
"#
        ),
    )
}

#[test]
fn derive_overwrites_equipment_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = derive_config(dir.path(), "");

    let output = assignrec(&["derive", &config]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let derived = fs::read_to_string(dir.path().join("derived.csv")).unwrap();
    let lines: Vec<&str> = derived.lines().collect();
    assert_eq!(
        lines[0],
        "Activity ID,Resource ID,Resource Type,Budgeted Units,Actual Units,Remaining Units,BOQ Item"
    );
    assert_eq!(lines[1], "T1,M1,Material,10,4,6,I1");
    assert_eq!(lines[3], "T1,R2,Nonlabor,30,10,20,I1");
    assert_eq!(lines[4], "T1,R9,Nonlabor,7,7,0,I9");
    assert_eq!(lines[5], "T1,L1,Labor,8,8,0,");

    let err = stderr(&output);
    assert!(err.contains("1 valid, 1 invalid"), "stderr: {err}");
    assert!(err.contains("no_norm: 1"), "stderr: {err}");
    // Input untouched when an output path is configured
    assert_eq!(fs::read_to_string(dir.path().join("activity.csv")).unwrap(), ACTIVITY);
}

#[test]
fn derive_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = derive_config(dir.path(), "synthesize = true");

    let output = assignrec(&["derive", &config, "--dry-run", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("derived.csv").exists());

    let val = single_json(&output);
    assert_eq!(val["summary"]["synthesized"], 0);
    assert_eq!(val["summary"]["derived_valid"], 1);
    assert_eq!(val["invalid"][0]["reason"], "no_norm");
}

#[test]
fn derive_missing_column_exits_schema_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = derive_config(dir.path(), "");
    write(dir.path(), "norms.csv", "BOQ Item No.,Resource ID\nI1,R2\n");

    let output = assignrec(&["derive", &config]);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr(&output);
    assert!(err.contains("missing column 'factor' in norms input"), "stderr: {err}");
    assert!(err.contains("[columns.norms]"), "stderr: {err}");
    assert!(!dir.path().join("derived.csv").exists());
}

#[test]
fn derive_missing_input_exits_io() {
    let dir = tempfile::tempdir().unwrap();
    let config = derive_config(dir.path(), "");
    fs::remove_file(dir.path().join("norms.csv")).unwrap();

    let output = assignrec(&["derive", &config]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("norms.csv"));
}

// ===========================================================================
// validate + config errors
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = derive_config(dir.path(), "mode = \"annotate\"");

    let output = assignrec(&["validate", &config]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("config OK"));
}

#[test]
fn invalid_config_exits_usage() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "bad.toml", "[compare]\nbefore = \"a.csv\"\nafter = \"b.csv\"\nkeys = []\n");

    let output = assignrec(&["validate", &config]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("compare.keys must not be empty"));
}

#[test]
fn unknown_config_field_exits_usage() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "typo.toml", "[derive]\nactivity = \"a.csv\"\nnorm = \"n.csv\"\n");

    let output = assignrec(&["validate", &config]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_config_exits_io() {
    let output = assignrec(&["validate", "/nonexistent/plan.toml"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("cannot read config"));
}
