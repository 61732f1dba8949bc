//! Shared test utilities for plab integration tests.
//!
//! Provides a benchmark tree builder backed by a temporary directory and a
//! [`RecordingExecutor`] that stands in for the planner: it records which
//! runs it was given and writes the files a real run would leave behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use plab_core::executor::{JobExecutor, PreparedRun, StartSummary};
use plab_core::experiment::ExperimentLayout;
use plab_core::experiment::toml_format::PlannerPaths;
use plab_core::experiment::layout::{RUN_LOG_FILE, RUN_PROPERTIES_FILE};
use plab_core::experiment::matrix::{SEARCH_COMMAND, TRANSLATE_COMMAND};

/// Minimal STRIPS domain used by every fixture domain.
pub const DOMAIN_PDDL: &str = "\
(define (domain blocks)
  (:requirements :strips)
  (:predicates (on ?x ?y) (clear ?x))
  (:action noop :parameters () :precondition () :effect ()))
";

/// Problem text for `problem` in the fixture domain.
pub fn problem_pddl(problem: &str) -> String {
    format!(
        "(define (problem {problem})\n  (:domain blocks)\n  (:objects a b)\n  (:init (clear a))\n  (:goal (clear a)))\n"
    )
}

/// A temporary planner root with a `benchmarks/` directory.
///
/// The directory is removed when the tree is dropped.
pub struct BenchmarkTree {
    dir: TempDir,
}

impl BenchmarkTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Root of the tree; use it as the planner root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory holding the domains.
    pub fn benchmarks_dir(&self) -> PathBuf {
        self.root().join("benchmarks")
    }

    /// Add `domain` with a `domain.pddl` and one file per problem name.
    pub fn with_domain(self, domain: &str, problems: &[&str]) -> Self {
        let dir = self.benchmarks_dir().join(domain);
        std::fs::create_dir_all(&dir).expect("failed to create domain dir");
        std::fs::write(dir.join("domain.pddl"), DOMAIN_PDDL).expect("failed to write domain");
        for problem in problems {
            std::fs::write(dir.join(problem), problem_pddl(problem))
                .expect("failed to write problem");
        }
        self
    }

    /// Install shell-script stand-ins for the translator and search binaries
    /// at their default locations under the root.
    ///
    /// The translator checks that both task files are linked into its working
    /// directory and writes [`FAKE_TASK_FILE`]. The search requires that file
    /// and solves the task only for the `blind` heuristic (third argument).
    #[cfg(unix)]
    pub fn with_fake_planner(self) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let paths = PlannerPaths::default();
        for (rel, body) in [(&paths.translator, FAKE_TRANSLATOR), (&paths.search, FAKE_SEARCH)] {
            let path = self.root().join(rel);
            let dir = path.parent().expect("planner path has a parent");
            std::fs::create_dir_all(dir).expect("failed to create planner dir");
            std::fs::write(&path, body).expect("failed to write fake planner");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("failed to mark fake planner executable");
        }
        self
    }
}

/// Task file written by the fake translator.
pub const FAKE_TASK_FILE: &str = "output.lifted";

const FAKE_TRANSLATOR: &str = r#"#!/bin/sh
test -f "$(basename "$1")" && test -f "$(basename "$2")" || { echo "task files not linked" >&2; exit 2; }
printf 'task %s %s
' "$(basename "$1")" "$(basename "$2")" > output.lifted
echo "Translated $(basename "$2")"
"#;

const FAKE_SEARCH: &str = r#"#!/bin/sh
test -f "$1" || { echo "missing $1" >&2; exit 3; }
if [ "$3" = "blind" ]; then
  echo "Goal state found!"
  echo "Total plan cost: 4"
  echo "Total time: 0.01s"
else
  echo "Search stopped without a plan."
fi
"#;

impl Default for BenchmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Log written for runs the [`RecordingExecutor`] marks as solved.
pub const SOLVED_LOG: &str = "\
Goal state found!
Total number of states visited:12
Total number of states generated:31
Total plan cost:6
Total time: 0.50s
Peak memory usage: 20480 kB
";

/// Job executor that does not start processes.
///
/// Each run gets a `properties.json` with successful return codes. Runs
/// whose id contains one of `solve` get [`SOLVED_LOG`] as their `run.log`.
#[derive(Default)]
pub struct RecordingExecutor {
    solve: Vec<String>,
    executed: Mutex<Vec<usize>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark runs whose joined id contains `needle` as solved.
    pub fn solving(mut self, needle: impl Into<String>) -> Self {
        self.solve.push(needle.into());
        self
    }

    /// Indices of all runs passed to [`JobExecutor::execute`], in order.
    pub fn executed(&self) -> Vec<usize> {
        self.executed.lock().expect("lock poisoned").clone()
    }

    fn fake_run(&self, run: &PreparedRun) -> Result<()> {
        let props: BTreeMap<String, Value> = [
            (format!("{TRANSLATE_COMMAND}_returncode"), Value::from(0)),
            (format!("{SEARCH_COMMAND}_returncode"), Value::from(0)),
            (format!("{SEARCH_COMMAND}_timed_out"), Value::Bool(false)),
            ("node".to_owned(), Value::from("test-node")),
        ]
        .into_iter()
        .collect();
        let path = run.dir.join(RUN_PROPERTIES_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&props)?)
            .with_context(|| format!("failed to write {}", path.display()))?;

        let id = run.run.id_string();
        if self.solve.iter().any(|needle| id.contains(needle.as_str())) {
            std::fs::write(run.dir.join(RUN_LOG_FILE), SOLVED_LOG)?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(
        &self,
        _layout: &ExperimentLayout,
        runs: &[PreparedRun],
        _cancel: CancellationToken,
    ) -> Result<StartSummary> {
        for run in runs {
            self.fake_run(run)?;
            self.executed.lock().expect("lock poisoned").push(run.index);
        }
        Ok(StartSummary::Completed {
            succeeded: runs.len(),
            failed: 0,
        })
    }
}
