//! End-to-end tests for the `plab` binary.
//!
//! Each test runs the built executable with an isolated config directory so
//! that no user config or `POWER_LIFTED_SRC` setting leaks in.

use std::path::Path;
use std::process::{Command, Output};

use plab_test_utils::BenchmarkTree;

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn plab(config_home: &Path, args: &[&str]) -> Output {
    plab_with_log(config_home, "warn", args)
}

fn plab_with_log(config_home: &Path, filter: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_plab"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("POWER_LIFTED_SRC")
        .env("RUST_LOG", filter)
        .output()
        .expect("failed to spawn plab")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

const EXPERIMENT_TOML: &str = r#"
[experiment]
name = "cli-smoke"
benchmarks = "benchmarks"
time_limit = 10
memory_limit = 512

[[configs]]
name = "blind"
arguments = ["naive", "blind", "join"]

[suite]
local = ["blocks"]

[[reports]]
kind = "absolute"
attributes = ["coverage"]
outfile = "report.html"
"#;

// -----------------------------------------------------------------------
// atoms diff
// -----------------------------------------------------------------------

#[test]
fn atoms_diff_reports_identical_sets() {
    let tmp = tempfile::TempDir::new().unwrap();
    let left = tmp.path().join("fd.txt");
    let right = tmp.path().join("gen.txt");
    std::fs::write(&left, "['Atom foo(a)', 'Atom bar(b)']\n").unwrap();
    std::fs::write(&right, "foo(a) bar(b)\n").unwrap();

    let out = plab(
        tmp.path(),
        &["atoms", "diff", left.to_str().unwrap(), right.to_str().unwrap()],
    );

    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Atoms in both files: 2"), "{text}");
    assert!(text.contains(&format!("Total atoms in {}: 2", left.display())));
    assert!(!text.contains("  foo(a)"), "{text}");
}

#[test]
fn atoms_diff_lists_one_sided_atoms() {
    let tmp = tempfile::TempDir::new().unwrap();
    let left = tmp.path().join("a.txt");
    let right = tmp.path().join("b.txt");
    std::fs::write(&left, "on(ab),clear(a)").unwrap();
    std::fs::write(&right, "on(ab) handempty()").unwrap();

    let out = plab(
        tmp.path(),
        &[
            "atoms",
            "diff",
            left.to_str().unwrap(),
            right.to_str().unwrap(),
            "--left-format",
            "comma-separated",
        ],
    );

    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("  clear(a)"), "{text}");
    assert!(text.contains("  handempty()"), "{text}");
    assert!(text.contains("Atoms in both files: 1"), "{text}");
}

#[test]
fn atoms_diff_missing_file_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    let missing = tmp.path().join("nope.txt");

    let out = plab(
        tmp.path(),
        &["atoms", "diff", missing.to_str().unwrap(), missing.to_str().unwrap()],
    );

    assert!(!out.status.success());
    assert!(stderr(&out).contains("nope.txt"), "{}", stderr(&out));
}

// -----------------------------------------------------------------------
// translate
// -----------------------------------------------------------------------

#[test]
fn translate_writes_normalized_files() {
    let tree = BenchmarkTree::new().with_domain("blocks", &["p01.pddl"]);
    let dir = tree.benchmarks_dir().join("blocks");
    let out_dir = tempfile::TempDir::new().unwrap();
    let target = out_dir.path().join("normalized");

    let out = plab(
        out_dir.path(),
        &[
            "translate",
            dir.join("domain.pddl").to_str().unwrap(),
            dir.join("p01.pddl").to_str().unwrap(),
            "--output",
            target.to_str().unwrap(),
        ],
    );

    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Domain:  blocks"));
    let domain = std::fs::read_to_string(target.join("domain.pddl")).unwrap();
    assert!(domain.starts_with("(define (domain blocks)"));
    assert_eq!(domain.lines().count(), 1);
    assert!(target.join("problem.pddl").is_file());
}

// -----------------------------------------------------------------------
// init + exp
// -----------------------------------------------------------------------

#[test]
fn exp_without_planner_root_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("exp.toml");
    std::fs::write(&file, EXPERIMENT_TOML).unwrap();

    let out = plab(tmp.path(), &["exp", "build", file.to_str().unwrap()]);

    assert!(!out.status.success());
    assert!(stderr(&out).contains("planner root not found"), "{}", stderr(&out));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let tmp = tempfile::TempDir::new().unwrap();
    let tree = BenchmarkTree::new();
    let root = tree.root().to_str().unwrap();

    let first = plab(tmp.path(), &["init", "--planner-dir", root]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert!(tmp.path().join("plab").join("config.toml").is_file());

    let second = plab(tmp.path(), &["init", "--planner-dir", root]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("already exists"));

    let forced = plab(tmp.path(), &["init", "--planner-dir", root, "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
}

#[test]
fn exp_build_fetch_report_with_configured_planner() {
    let tree = BenchmarkTree::new().with_domain("blocks", &["p01.pddl", "p02.pddl"]);
    let work = tempfile::TempDir::new().unwrap();
    let file = work.path().join("exp.toml");
    std::fs::write(&file, EXPERIMENT_TOML).unwrap();
    let file = file.to_str().unwrap();

    let init = plab(
        work.path(),
        &["init", "--planner-dir", tree.root().to_str().unwrap()],
    );
    assert!(init.status.success(), "stderr: {}", stderr(&init));

    let show = plab(work.path(), &["exp", "show", file, "--host", "laptop"]);
    assert!(show.status.success(), "stderr: {}", stderr(&show));
    assert!(stdout(&show).contains("Runs:        2"), "{}", stdout(&show));

    let build = plab(work.path(), &["exp", "build", file, "--host", "laptop"]);
    assert!(build.status.success(), "stderr: {}", stderr(&build));
    let exp_dir = work.path().join("data").join("cli-smoke");
    assert!(exp_dir.join("experiment.json").is_file());

    let fetch = plab(work.path(), &["exp", "fetch", file]);
    assert!(fetch.status.success(), "stderr: {}", stderr(&fetch));
    assert!(stdout(&fetch).contains("Fetched 2 runs (0 solved)"), "{}", stdout(&fetch));

    let report = plab(work.path(), &["exp", "report", file]);
    assert!(report.status.success(), "stderr: {}", stderr(&report));
    let html =
        std::fs::read_to_string(work.path().join("data").join("cli-smoke-eval").join("report.html"))
            .unwrap();
    assert!(html.contains("<h2>coverage</h2>"), "{html}");
}

#[test]
fn run_dir_logs_the_directory_before_failing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let missing = tmp.path().join("runs-00001-00100").join("00001");
    let out = plab_with_log(
        tmp.path(),
        "info",
        &["exp", "run-dir", missing.to_str().unwrap()],
    );
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("executing run directory"), "{err}");
    assert!(err.contains("error:"), "{err}");
}

#[test]
fn completions_are_generated() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = plab(tmp.path(), &["completions", "bash"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("plab"));
}
