//! TOML format types for experiment definition files.
//!
//! These types map directly to the `experiment.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate.

use serde::{Deserialize, Serialize};

use crate::environment::SlurmSettings;
use crate::logparse::ValueKind;
use crate::report::{Category, PropertyFilter, ReportFormat};

use super::config::Configuration;

/// Top-level structure of an `experiment.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentToml {
    /// Experiment metadata and per-command limits.
    pub experiment: ExperimentMeta,
    /// Locations of the planner entry points, relative to the planner root.
    #[serde(default)]
    pub planner: PlannerPaths,
    /// Algorithm configurations; every one is run on every task.
    #[serde(default)]
    pub configs: Vec<Configuration>,
    /// Benchmark selection.
    #[serde(default)]
    pub suite: SuiteToml,
    /// Execution environments.
    #[serde(default)]
    pub environment: EnvironmentToml,
    /// Extra log patterns on top of the built-in planner patterns.
    #[serde(default)]
    pub parser: ParserToml,
    /// Reports rendered by the `report` step.
    #[serde(default)]
    pub reports: Vec<ReportToml>,
}

/// `[experiment]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentMeta {
    /// Experiment name; also the name of its directory under `data_dir`.
    pub name: String,
    /// Benchmark root. Relative paths are resolved against the planner root.
    #[serde(default = "default_benchmarks")]
    pub benchmarks: String,
    /// Wall-clock limit per command, in seconds.
    pub time_limit: u64,
    /// Address-space limit per command, in MiB.
    pub memory_limit: u64,
    /// Directory that holds experiment and eval directories.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// `[planner]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerPaths {
    #[serde(default = "default_translator")]
    pub translator: String,
    #[serde(default = "default_search")]
    pub search: String,
    /// File the translator writes and the search reads, inside the run dir.
    #[serde(default = "default_task_file")]
    pub task_file: String,
}

impl Default for PlannerPaths {
    fn default() -> Self {
        Self {
            translator: default_translator(),
            search: default_search(),
            task_file: default_task_file(),
        }
    }
}

/// `[suite]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuiteToml {
    /// Suite used when the experiment runs on a local machine.
    #[serde(default)]
    pub local: Vec<String>,
    /// Suite used when the experiment runs on the cluster.
    #[serde(default)]
    pub remote: Vec<String>,
    /// Domains skipped for every configuration.
    #[serde(default)]
    pub excluded_domains: Vec<String>,
}

impl SuiteToml {
    /// The suite entries for the selected side.
    pub fn entries(&self, remote: bool) -> &[String] {
        if remote { &self.remote } else { &self.local }
    }
}

/// `[environment]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentToml {
    #[serde(default)]
    pub local: LocalToml,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slurm: Option<SlurmSettings>,
}

/// `[environment.local]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalToml {
    /// Maximum number of runs executed concurrently.
    #[serde(default = "default_processes")]
    pub processes: usize,
}

impl Default for LocalToml {
    fn default() -> Self {
        Self {
            processes: default_processes(),
        }
    }
}

/// `[parser]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParserToml {
    #[serde(default)]
    pub patterns: Vec<PatternToml>,
}

/// A single `[[parser.patterns]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternToml {
    /// Property name the first capture group is stored under.
    pub attribute: String,
    /// Regular expression searched in `run.log`.
    pub regex: String,
    #[serde(default)]
    pub kind: ValueKind,
}

/// A single `[[reports]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReportToml {
    /// Domain-by-algorithm tables, one per attribute.
    Absolute {
        #[serde(default)]
        format: ReportFormat,
        attributes: Vec<String>,
        /// Restrict the report to these algorithms (all when empty).
        #[serde(default)]
        algorithms: Vec<String>,
        #[serde(default = "default_error_attributes")]
        error_attributes: Vec<String>,
        outfile: String,
    },
    /// Scatter plot of one attribute for exactly two algorithms.
    Scatter {
        attribute: String,
        algorithms: Vec<String>,
        #[serde(default)]
        category: Category,
        #[serde(default)]
        filters: Vec<PropertyFilter>,
        outfile: String,
    },
}

impl ReportToml {
    pub fn outfile(&self) -> &str {
        match self {
            Self::Absolute { outfile, .. } | Self::Scatter { outfile, .. } => outfile,
        }
    }
}

fn default_benchmarks() -> String {
    "local-tests".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_translator() -> String {
    "builds/release/translator/translate.py".to_string()
}

fn default_search() -> String {
    "builds/release/search/search".to_string()
}

fn default_task_file() -> String {
    "output.lifted".to_string()
}

fn default_processes() -> usize {
    1
}

/// Attributes shown for runs with unexplained errors.
pub fn default_error_attributes() -> Vec<String> {
    [
        "domain",
        "problem",
        "algorithm",
        "unexplained_errors",
        "error",
        "node",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
