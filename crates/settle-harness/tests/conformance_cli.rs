//! Drives the runner the way the binary does, minus process exit.

use clap::Parser;
use proptest::prelude::*;
use settle_harness::cli::{Cli, run_with_output};
use settle_harness::{CATALOG, HarnessError};
use settle_runtime::RunLoopConfig;

fn run(args: &[&str]) -> (Result<(), HarnessError>, String) {
    let cli = Cli::try_parse_from(std::iter::once("settle-conformance").chain(args.iter().copied()))
        .expect("valid args");
    let mut out = Vec::new();
    let result = run_with_output(cli, &mut out, RunLoopConfig::default());
    (result, String::from_utf8(out).expect("utf8"))
}

#[test]
fn run_all_passes_in_text_mode() {
    let (result, text) = run(&["run"]);
    assert!(result.is_ok(), "{text}");
    assert!(text.contains(&format!("{} passed, 0 failed", CATALOG.len())));
}

#[test]
fn run_selected_as_json() {
    let (result, text) = run(&[
        "run",
        "--scenario",
        "adopt-pending",
        "--scenario",
        "thenable-latch",
        "--json",
        "--max-tasks",
        "64",
    ]);
    assert!(result.is_ok());
    let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(json["total"], 2);
    assert_eq!(json["max_tasks_per_drain"], 64);
    assert_eq!(json["scenarios"][0]["name"], "adopt-pending");
    assert_eq!(json["scenarios"][1]["name"], "thenable-latch");
}

#[test]
fn unknown_scenario_exits_with_usage_code() {
    let (result, text) = run(&["run", "--scenario", "missing"]);
    let err = result.expect_err("unknown");
    assert_eq!(err.exit_code(), 2);
    assert!(text.is_empty());
}

#[test]
fn tiny_budget_fails_scenarios() {
    let (result, text) = run(&["run", "--scenario", "nested-flattening", "--max-tasks", "1"]);
    assert!(matches!(
        result,
        Err(HarnessError::ScenariosFailed {
            failed: 1,
            total: 1
        })
    ));
    assert!(text.contains("task budget of 1 exceeded"));
}

proptest! {
    #[test]
    fn any_selection_runs_exactly_that_selection(
        picks in proptest::collection::vec(0..CATALOG.len(), 1..=6),
    ) {
        let mut args = vec!["run", "--json"];
        for &i in &picks {
            args.push("--scenario");
            args.push(CATALOG[i].name);
        }
        let (result, text) = run(&args);
        prop_assert!(result.is_ok());
        let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        let names: Vec<&str> = json["scenarios"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        let expected: Vec<&str> = picks.iter().map(|&i| CATALOG[i].name).collect();
        prop_assert_eq!(names, expected);
    }
}
