//! Integration tests for the experiment steps.
//!
//! Exercises plan -> build -> start -> fetch -> report against a temporary
//! benchmark tree. Runs are "executed" by the recording executor, which
//! writes the files a planner run would leave behind.

use std::path::Path;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use plab_core::environment::HostContext;
use plab_core::executor::StartSummary;
use plab_core::experiment::layout::{RUN_SPEC_FILE, RUNS_PER_BUCKET};
use plab_core::experiment::{self, parse_experiment_toml};
use plab_core::logparse::LogParser;
use plab_test_utils::{BenchmarkTree, RecordingExecutor};

const EXPERIMENT_TOML: &str = r#"
[experiment]
name = "smoke"
benchmarks = "benchmarks"
time_limit = 60
memory_limit = 2048
data_dir = "data"

[[configs]]
name = "blind"
arguments = ["naive", "blind", "join"]

[[configs]]
name = "gc"
arguments = ["gbfs", "goalcount", "join"]

[suite]
local = ["blocks", "gripper:p01.pddl"]
remote = ["blocks:p02.pddl"]
excluded_domains = []

[environment.local]
processes = 2

[environment.slurm]
partition = "infai_2"
memory_per_cpu = "6G"
remote_host_suffixes = [".cluster.bc2.ch"]

[[reports]]
kind = "absolute"
attributes = ["coverage", "cost"]
outfile = "report.html"

[[reports]]
kind = "scatter"
attribute = "search_time"
algorithms = ["blind", "gc"]
category = "domain"
outfile = "search_time-blind-vs-gc.tex"
"#;

fn tree() -> BenchmarkTree {
    BenchmarkTree::new()
        .with_domain("blocks", &["p01.pddl", "p02.pddl"])
        .with_domain("gripper", &["p01.pddl", "p02.pddl"])
}

fn laptop() -> HostContext {
    HostContext::new("laptop")
}

#[test]
fn plan_uses_local_suite_on_local_host() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();

    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();

    assert!(!planned.environment.is_remote());
    // 2 configs x (2 blocks problems + 1 gripper problem)
    assert_eq!(planned.experiment.runs().len(), 6);
    assert_eq!(planned.layout.exp_dir, data.path().join("data").join("smoke"));
}

#[test]
fn plan_uses_remote_suite_on_cluster_host() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();

    let planned = experiment::plan_experiment(
        &def,
        data.path(),
        tree.root(),
        &HostContext::new("login12.cluster.bc2.ch"),
    )
    .unwrap();

    assert!(planned.environment.is_remote());
    assert_eq!(planned.experiment.runs().len(), 2);
}

#[test]
fn excluded_domains_are_skipped_for_every_config() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let toml = EXPERIMENT_TOML.replace("excluded_domains = []", "excluded_domains = [\"blocks\"]");
    let def = parse_experiment_toml(&toml).unwrap();

    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();

    assert_eq!(planned.experiment.runs().len(), 2);
    assert!(
        planned
            .experiment
            .runs()
            .iter()
            .all(|r| r.properties["domain"] == Value::from("gripper"))
    );
}

#[test]
fn missing_domain_fails_planning() {
    let tree = BenchmarkTree::new().with_domain("blocks", &["p01.pddl"]);
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();

    let err = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap_err();
    assert!(format!("{err:#}").contains("gripper"), "{err:#}");
}

#[test]
fn build_writes_run_directories() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();
    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();

    let runs = experiment::build(&planned, false).unwrap();
    assert_eq!(runs.len(), 6);
    assert!(runs.len() <= RUNS_PER_BUCKET);

    let first = &runs[0].dir;
    assert!(first.ends_with("runs-00001-00100/00001"));
    assert!(first.join(RUN_SPEC_FILE).is_file());
    let domain_link = first.join("domain.pddl");
    assert!(
        std::fs::symlink_metadata(&domain_link)
            .unwrap()
            .file_type()
            .is_symlink()
    );
    assert!(first.join("p01.pddl").exists());

    let info = experiment::steps::load_info(&planned.layout).unwrap();
    assert_eq!(info.name, "smoke");
    assert_eq!(info.runs, 6);

    let reloaded = experiment::load_runs(&planned.layout).unwrap();
    assert_eq!(reloaded.len(), 6);
    assert_eq!(reloaded[3].run, runs[3].run);
}

#[test]
fn build_refuses_to_overwrite_without_force() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();
    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();

    experiment::build(&planned, false).unwrap();
    let err = experiment::build(&planned, false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    experiment::build(&planned, true).unwrap();
}

#[tokio::test]
async fn full_pipeline_produces_properties_and_reports() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();
    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();
    let layout = planned.layout.clone();
    experiment::build(&planned, false).unwrap();

    let executor = RecordingExecutor::new().solving("blind-");
    let summary = experiment::start(&layout, &executor, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        summary,
        StartSummary::Completed {
            succeeded: 6,
            failed: 0
        }
    );
    assert_eq!(executor.executed(), vec![1, 2, 3, 4, 5, 6]);

    let props = experiment::fetch(&layout, &LogParser::planner()).unwrap();
    assert_eq!(props.len(), 6);

    let solved = &props["blind-blocks-p01.pddl"];
    assert_eq!(solved["coverage"], Value::from(1));
    assert_eq!(solved["cost"], Value::from(6));
    assert_eq!(solved["error"], Value::from("success"));
    assert_eq!(solved["node"], Value::from("test-node"));
    assert_eq!(solved["algorithm"], Value::from("blind"));

    let unsolved = &props["gc-gripper-p01.pddl"];
    assert_eq!(unsolved["coverage"], Value::from(0));
    assert_eq!(unsolved["error"], Value::from("incomplete"));
    assert_eq!(unsolved["unexplained_errors"], Value::from(vec!["incomplete"]));

    assert!(layout.eval_properties_file().is_file());

    let written = experiment::report(&def, &layout).unwrap();
    assert_eq!(written.len(), 2);
    let html = std::fs::read_to_string(layout.eval_dir.join("report.html")).unwrap();
    assert!(html.contains("<h2>coverage</h2>"));
    assert!(html.contains("<td>Sum (3)</td><td><b>3</b></td><td>0</td>"), "{html}");
    assert!(html.contains("<h2>Unexplained errors</h2>"));
    let tex = std::fs::read_to_string(layout.eval_dir.join("search_time-blind-vs-gc.tex")).unwrap();
    assert!(tex.contains("\\addlegendentry{blocks}"));
}

#[tokio::test]
async fn fetch_marks_unstarted_runs_as_not_run() {
    let tree = tree();
    let data = tempfile::TempDir::new().unwrap();
    let def = parse_experiment_toml(EXPERIMENT_TOML).unwrap();
    let planned = experiment::plan_experiment(&def, data.path(), tree.root(), &laptop()).unwrap();
    experiment::build(&planned, false).unwrap();

    let props = experiment::fetch(&planned.layout, &LogParser::planner()).unwrap();
    assert!(props.values().all(|p| p["error"] == Value::from("not-run")));
}

#[test]
fn steps_on_unbuilt_experiment_fail() {
    let layout = experiment::ExperimentLayout::new(Path::new("/nonexistent-plab"), "nothing");
    let err = experiment::load_runs(&layout).unwrap_err();
    assert!(format!("{err:#}").contains("experiment.json"));
}
