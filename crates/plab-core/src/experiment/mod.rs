//! Planner experiments: definition file, benchmark suites, run matrix and
//! the build/start/fetch/report steps.

pub mod config;
pub mod layout;
pub mod matrix;
pub mod parser;
pub mod planner;
pub mod steps;
pub mod suite;
pub mod toml_format;

pub use config::Configuration;
pub use layout::ExperimentLayout;
pub use matrix::{Experiment, ResourceLimits, Run, RunCommand, build_matrix};
pub use parser::{ExperimentParseError, parse_experiment_toml};
pub use planner::PlannerLayout;
pub use steps::{ExperimentInfo, PlannedExperiment, build, fetch, load_runs, plan_experiment, report, start};
pub use suite::{BenchmarkTask, SuiteError, build_suite};
pub use toml_format::{ExperimentToml, ReportToml};
