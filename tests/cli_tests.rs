//! Exercises the `run_tests` and `run_benchmarks` binaries end to end.
//! Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

use common::{read, write, write_script, Workspace};

fn run_tests(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("run_tests").unwrap();
    cmd.arg("--builtin-tools")
        .arg("--no-color")
        .arg("--scratch-root")
        .arg(ws.scratch_root())
        .env_remove("HARNESS_SCRATCH_ROOT")
        .env_remove("HARNESS_TIMEOUT_SECS");
    cmd
}

#[test]
fn passing_run_exits_zero() {
    let ws = Workspace::new();
    let case = ws.case("hello", "echo hello");
    write(&case.join("expected_output.txt"), "hello\n");

    run_tests(&ws)
        .arg(&case)
        .assert()
        .success()
        .stdout(contains("hello....").and(contains("OK")))
        .stdout(contains("1 passed, 0 failed, 0 errors, 0 not run"));
}

#[test]
fn failing_run_exits_one_and_explains() {
    let ws = Workspace::new();
    let case = ws.case("greeting", "echo hello");
    write(&case.join("expected_output.txt"), "goodbye\n");

    run_tests(&ws)
        .arg(&case)
        .assert()
        .code(1)
        .stdout(contains("FAIL"))
        .stdout(contains("-STDOUT-\nhello"))
        .stdout(contains("-goodbye").and(contains("+hello")));
}

#[test]
fn suite_prints_hierarchy() {
    let ws = Workspace::new();
    ws.case("suite/first", "exit 0");
    ws.case("suite/second", "exit 0");

    run_tests(&ws)
        .arg(ws.tests_root().join("suite"))
        .assert()
        .success()
        .stdout(contains("suite\n  first...").and(contains("  second...")));
}

#[test]
fn pin_flag_updates_expectations() {
    let ws = Workspace::new();
    let case = ws.case("versioned", "echo v2");
    write(&case.join("expected_output.txt"), "v1\n");

    run_tests(&ws)
        .arg("--pin")
        .arg(&case)
        .assert()
        .success()
        .stdout(contains("1 pinned"));
    assert_eq!(read(&case.join("expected_output.txt")), "v2\n");

    run_tests(&ws).arg(&case).assert().success();
}

#[test]
fn non_test_directory_prints_err() {
    let ws = Workspace::new();
    let stray = ws.tests_root().join("stray");
    std::fs::create_dir_all(&stray).unwrap();

    run_tests(&ws)
        .arg(&stray)
        .assert()
        .code(1)
        .stdout(contains("ERR"))
        .stdout(contains("0 passed, 0 failed, 1 errors"));
}

#[test]
fn dot_selection_from_inside_a_case_runs_that_case() {
    let ws = Workspace::new();
    let case = ws.case("hello", "echo hello");
    write(&case.join("expected_output.txt"), "hello\n");
    write(&ws.scratch_root().join("other/keep.txt"), "keep\n");

    run_tests(&ws)
        .current_dir(&case)
        .arg(".")
        .assert()
        .success()
        .stdout(contains("hello....").and(contains("OK")));
    assert_eq!(read(&ws.scratch_root().join("hello/actual_output.txt")), "hello\n");
    assert_eq!(read(&ws.scratch_root().join("other/keep.txt")), "keep\n");
}

#[test]
fn parent_selection_from_a_data_directory_stays_in_scratch() {
    let ws = Workspace::new();
    let case = ws.case("seeded", "cat data/in.txt");
    write(&case.join("data/in.txt"), "seed\n");
    write(&ws.path().join("beside_scratch.txt"), "keep\n");

    run_tests(&ws)
        .current_dir(case.join("data"))
        .arg("..")
        .assert()
        .success()
        .stdout(contains("seeded...."));
    assert_eq!(read(&ws.scratch_root().join("seeded/actual_output.txt")), "seed\n");
    assert!(ws.path().join("beside_scratch.txt").is_file());
}

#[test]
fn bad_config_is_fatal_with_diagnostic() {
    let ws = Workspace::new();
    let config = ws.path().join("harness.yaml");
    write(&config, "no_such_key: 1\n");

    run_tests(&ws)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("harness::config"));
}

#[test]
fn config_file_supplies_timeout() {
    let ws = Workspace::new();
    let case = ws.case("slow", "sleep 30");
    let config = ws.path().join("harness.yaml");
    write(&config, "timeout_secs: 1\n");

    run_tests(&ws)
        .arg("--config")
        .arg(&config)
        .arg(&case)
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(1)
        .stdout(contains("timed out"));
}

#[test]
fn benchmarks_report_elapsed_time() {
    let ws = Workspace::new();
    let bench = ws.path().join("benchmarks/startup");
    write(&bench.join("data/input.txt"), "x\n");
    write_script(&bench.join("run_cat"), "cat data/input.txt > /dev/null");
    write_script(&bench.join("run_true"), "true");

    Command::cargo_bin("run_benchmarks")
        .unwrap()
        .arg("--scratch-root")
        .arg(ws.scratch_root())
        .arg(&bench)
        .assert()
        .success()
        .stdout(contains("run_cat").and(contains("run_true")))
        .stdout(contains("Elapsed time:").count(2));
}
