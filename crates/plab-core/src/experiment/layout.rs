//! On-disk layout of a built experiment.
//!
//! ```text
//! <data_dir>/<name>/
//!     experiment.json
//!     runs-00001-00100/
//!         00001/ run.json, domain.pddl -> ..., run.log, run.err, properties.json
//!         00002/
//!     runs-00101-00200/
//! <data_dir>/<name>-eval/
//!     properties.json
//!     report.html ...
//! ```

use std::path::{Path, PathBuf};

/// Runs per `runs-XXXXX-YYYYY` bucket directory.
pub const RUNS_PER_BUCKET: usize = 100;

/// Static description of a run, written by the build step.
pub const RUN_SPEC_FILE: &str = "run.json";
/// Properties recorded by the executor while running.
pub const RUN_PROPERTIES_FILE: &str = "properties.json";
/// Captured standard output of all commands of a run.
pub const RUN_LOG_FILE: &str = "run.log";
/// Captured standard error of all commands of a run.
pub const RUN_ERR_FILE: &str = "run.err";
/// Experiment metadata written by the build step.
pub const EXPERIMENT_FILE: &str = "experiment.json";
/// Combined properties written by the fetch step.
pub const EVAL_PROPERTIES_FILE: &str = "properties.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentLayout {
    pub exp_dir: PathBuf,
    pub eval_dir: PathBuf,
}

impl ExperimentLayout {
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            exp_dir: data_dir.join(name),
            eval_dir: data_dir.join(format!("{name}-eval")),
        }
    }

    /// Directory of the 1-based run `index`.
    pub fn run_dir(&self, index: usize) -> PathBuf {
        let bucket_start = ((index - 1) / RUNS_PER_BUCKET) * RUNS_PER_BUCKET + 1;
        let bucket_end = bucket_start + RUNS_PER_BUCKET - 1;
        self.exp_dir
            .join(format!("runs-{bucket_start:05}-{bucket_end:05}"))
            .join(format!("{index:05}"))
    }

    pub fn experiment_file(&self) -> PathBuf {
        self.exp_dir.join(EXPERIMENT_FILE)
    }

    pub fn eval_properties_file(&self) -> PathBuf {
        self.eval_dir.join(EVAL_PROPERTIES_FILE)
    }
}
