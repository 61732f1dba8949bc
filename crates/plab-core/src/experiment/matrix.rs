//! Run matrix: one run per (configuration, benchmark task) pair.
//!
//! Building the matrix only declares intent (resources, commands, limits,
//! properties). Nothing is executed here; see [`crate::executor`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::Configuration;
use super::planner::PlannerLayout;
use super::suite::BenchmarkTask;

/// Name of the translator command inside every run.
pub const TRANSLATE_COMMAND: &str = "run-translator";

/// Name of the search command inside every run.
pub const SEARCH_COMMAND: &str = "run-search";

/// Per-command resource ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall-clock limit in seconds.
    pub time_limit_secs: u64,
    /// Address-space limit in MiB.
    pub memory_limit_mib: u64,
}

/// An input file made available inside the run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub source: PathBuf,
    /// Name of the link inside the run directory.
    pub dest: String,
}

/// A subprocess invocation with its own limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommand {
    pub name: String,
    pub argv: Vec<String>,
    pub limits: ResourceLimits,
}

/// One experiment run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub resources: Vec<Resource>,
    pub commands: Vec<RunCommand>,
    /// Static properties reported for later tabulation.
    pub properties: BTreeMap<String, Value>,
}

impl Run {
    /// Link `source` into the run directory under its file name.
    pub fn add_resource(&mut self, name: impl Into<String>, source: &Path) -> &mut Self {
        let dest = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.resources.push(Resource {
            name: name.into(),
            source: source.to_path_buf(),
            dest,
        });
        self
    }

    pub fn add_command(
        &mut self,
        name: impl Into<String>,
        argv: Vec<String>,
        limits: ResourceLimits,
    ) -> &mut Self {
        self.commands.push(RunCommand {
            name: name.into(),
            argv,
            limits,
        });
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The run id as a list of components, if set.
    pub fn id(&self) -> Vec<String> {
        match self.properties.get("id") {
            Some(Value::Array(parts)) => parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The run id joined with `-`, used as the key in eval properties.
    pub fn id_string(&self) -> String {
        self.id().join("-")
    }
}

/// An experiment under construction: an ordered list of runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Experiment {
    pub name: String,
    runs: Vec<Run>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Vec::new(),
        }
    }

    /// Append an empty run and return it for configuration.
    pub fn add_run(&mut self) -> &mut Run {
        self.runs.push(Run::default());
        let last = self.runs.len() - 1;
        &mut self.runs[last]
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<Run> {
        self.runs
    }
}

/// Append one run per (configuration, task) pair to `experiment`.
///
/// Tasks whose domain appears in `excluded_domains` get no run under any
/// configuration. Returns the number of runs added.
pub fn build_matrix(
    experiment: &mut Experiment,
    planner: &PlannerLayout,
    configs: &[Configuration],
    tasks: &[BenchmarkTask],
    excluded_domains: &[String],
    limits: ResourceLimits,
) -> usize {
    let excluded: HashSet<&str> = excluded_domains.iter().map(String::as_str).collect();
    let mut added = 0usize;

    for config in configs {
        for task in tasks {
            if excluded.contains(task.domain.as_str()) {
                continue;
            }

            let run = experiment.add_run();
            run.add_resource("domain", &task.domain_file)
                .add_resource("problem", &task.problem_file);

            run.add_command(
                TRANSLATE_COMMAND,
                vec![
                    path_arg(&planner.translator),
                    path_arg(&task.domain_file),
                    path_arg(&task.problem_file),
                ],
                limits,
            );

            let mut search = vec![path_arg(&planner.search), planner.task_file.clone()];
            search.extend(config.arguments().iter().cloned());
            run.add_command(SEARCH_COMMAND, search, limits);

            run.set_property("domain", task.domain.clone())
                .set_property("problem", task.problem.clone())
                .set_property("algorithm", config.name())
                .set_property(
                    "id",
                    vec![
                        config.name().to_owned(),
                        task.domain.clone(),
                        task.problem.clone(),
                    ],
                );
            added += 1;
        }
    }

    let skipped = tasks
        .iter()
        .filter(|t| excluded.contains(t.domain.as_str()))
        .count();
    tracing::info!(
        experiment = %experiment.name,
        runs = added,
        skipped_tasks = skipped,
        "built run matrix"
    );
    added
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
